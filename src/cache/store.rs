//! File Cache Module
//!
//! Public async facade: validates input, moves store work onto the blocking
//! pool, owns the background sweep task and the Open/Closed lifecycle.
//!
//! Every operation is an `async fn`. Callers bound one with
//! `tokio::time::timeout` or cancel it by dropping the future; a transaction
//! already handed to the blocking pool still commits or aborts as a whole.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::cache::engine::{CacheCore, SweepReport};
use crate::cache::{keys, CacheStats, FileMetadata};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::{run_blocking, spawn_cleanup_task, CleanupHandle};

// == File Cache ==
/// TTL-aware file cache over an embedded LMDB store.
pub struct FileCache {
    core: Arc<CacheCore>,
    /// Background sweep task, taken on close
    cleanup: Mutex<Option<CleanupHandle>>,
    closed: AtomicBool,
}

impl FileCache {
    // == Open ==
    /// Validates `config`, opens the store, loads persisted stats and starts
    /// the background sweep task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let cleanup_interval = config.cleanup_interval;
        let data_dir = config.data_dir.clone();

        let core = Arc::new(run_blocking(move || CacheCore::open(config)).await?);
        let cleanup = spawn_cleanup_task(Arc::clone(&core), cleanup_interval);

        let stats = core.stats();
        info!(
            dir = %data_dir.display(),
            total_files = stats.total_files,
            total_size = stats.total_size,
            "File cache opened"
        );

        Ok(Self {
            core,
            cleanup: Mutex::new(Some(cleanup)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        self.core.config()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    async fn with_core<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&CacheCore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_open()?;
        let core = Arc::clone(&self.core);
        run_blocking(move || f(&core)).await
    }

    // == Store ==
    /// Reads `reader` to the end and stores it under `key`.
    ///
    /// A missing or zero `ttl` uses the configured default. At most
    /// `max_cache_size + 1` bytes are read, so an oversized payload is
    /// rejected with `SizeExceeded` without buffering it whole and leaves
    /// nothing behind.
    pub async fn store<R>(
        &self,
        key: &str,
        reader: R,
        mime_type: &str,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.ensure_open()?;
        keys::validate(key)?;

        let max = self.config().max_cache_size;
        let mut data = Vec::new();
        reader.take(max.saturating_add(1)).read_to_end(&mut data).await?;
        if data.len() as u64 > max {
            debug!(key, max, "Rejected oversized payload");
            return Err(CacheError::SizeExceeded { max });
        }

        let key = key.to_string();
        let mime_type = mime_type.to_string();
        self.with_core(move |core| core.store(&key, &data, &mime_type, ttl))
            .await
            .map(|_| ())
    }

    // == Fetch ==
    /// Returns the payload and metadata of a live entry.
    ///
    /// Absent and expired entries both fail with an error for which
    /// [`CacheError::is_not_found`] is true.
    pub async fn fetch(&self, key: &str) -> Result<(Vec<u8>, FileMetadata)> {
        let key = key.to_string();
        self.with_core(move |core| core.fetch(&key)).await
    }

    // == Exists ==
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_core(move |core| core.exists(&key)).await
    }

    // == Delete ==
    /// Removes an entry. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_core(move |core| core.delete(&key)).await
    }

    // == List ==
    /// Returns metadata for every entry, in no particular order.
    pub async fn list(&self) -> Result<Vec<FileMetadata>> {
        self.with_core(|core| core.list()).await
    }

    // == Info ==
    /// Returns an entry's metadata without touching its payload or the stats.
    pub async fn info(&self, key: &str) -> Result<FileMetadata> {
        let key = key.to_string();
        self.with_core(move |core| core.info(&key)).await
    }

    // == Cleanup ==
    /// Runs one expiration sweep now.
    pub async fn cleanup(&self) -> Result<SweepReport> {
        self.with_core(|core| core.sweep_expired()).await
    }

    // == Stats ==
    /// Returns a snapshot of the aggregate statistics.
    pub fn stats(&self) -> Result<CacheStats> {
        self.ensure_open()?;
        Ok(self.core.stats())
    }

    // == Close ==
    /// Stops the sweep task, persists stats and closes the store.
    ///
    /// Waits for in-flight transactions to finish. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("File cache already closed");
            return Ok(());
        }

        let cleanup = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let stopped = match cleanup {
            Some(handle) => handle.shutdown().await,
            None => Ok(()),
        };
        if let Err(e) = &stopped {
            warn!(error = %e, "Sweep task did not stop cleanly");
        }

        let core = Arc::clone(&self.core);
        let saved = run_blocking(move || {
            let saved = core.save_stats();
            core.close_store();
            saved
        })
        .await;

        info!(dir = %self.config().data_dir.display(), "File cache closed");
        stopped.and(saved)
    }
}
