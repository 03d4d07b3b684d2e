//! Cache Engine Module
//!
//! Synchronous cache semantics over the store: every operation here runs its
//! transactions on the calling thread and is driven from the blocking pool by
//! [`FileCache`](crate::cache::FileCache) and the cleanup task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::metadata::{self, FileMetadata};
use crate::cache::stats::StatsTracker;
use crate::cache::{keys, CacheStats};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::storage::{KvRead, KvStore, StoreOptions, WriteView};

// == Sweep Report ==
/// Outcome of one expiration sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries found expired when the sweep started
    pub expired: usize,
    /// Entries this sweep actually removed
    pub removed: usize,
}

// == Cache Core ==
/// Shared state behind a [`FileCache`](crate::cache::FileCache).
pub struct CacheCore {
    store: KvStore,
    stats: StatsTracker,
    config: Config,
}

impl CacheCore {
    /// Opens the store under the configured directory and loads persisted stats.
    pub fn open(config: Config) -> Result<Self> {
        let options = StoreOptions {
            map_size: config.map_size_bytes()?,
            compression: config.compression,
        };
        let store = KvStore::open(&config.data_dir, options)?;
        let stats = StatsTracker::load(&store);
        Ok(Self {
            store,
            stats,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Duration {
        match ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => self.config.default_ttl,
        }
    }

    // == Store ==
    /// Writes payload and metadata for `key` in one transaction.
    ///
    /// Overwriting an existing entry replaces both records wholesale.
    /// The totals are incremented either way.
    pub fn store(
        &self,
        key: &str,
        data: &[u8],
        mime_type: &str,
        ttl: Option<Duration>,
    ) -> Result<FileMetadata> {
        keys::validate(key)?;
        let size = data.len() as u64;
        if size > self.config.max_cache_size {
            return Err(CacheError::SizeExceeded {
                max: self.config.max_cache_size,
            });
        }

        let meta = FileMetadata::new(key, size, mime_type, self.effective_ttl(ttl));
        let encoded = meta.encode()?;

        self.store.write(|view| {
            view.put(&keys::payload_key(key), data)?;
            view.put(&keys::meta_key(key), &encoded)
        })?;

        self.stats.record_store(size);
        debug!(key, size, expires_at = %meta.expires_at, "Entry stored");
        Ok(meta)
    }

    // == Fetch ==
    /// Returns payload and metadata of a live entry, counting a hit or miss.
    pub fn fetch(&self, key: &str) -> Result<(Vec<u8>, FileMetadata)> {
        let found = if keys::is_storable(key) {
            self.store.read(|view| {
                let meta = metadata::read(view, key)?;
                if meta.is_expired() {
                    return Err(CacheError::Expired(key.to_string()));
                }
                let data = view
                    .get(&keys::payload_key(key))?
                    .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
                Ok((data, meta))
            })
        } else {
            Err(CacheError::NotFound(key.to_string()))
        };

        match found {
            Ok((data, mut meta)) => {
                self.stats.record_hit();
                meta.record_access();
                self.persist_access(key);
                Ok((data, meta))
            }
            Err(e) if e.is_not_found() => {
                self.stats.record_miss();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort access bookkeeping after a successful fetch.
    fn persist_access(&self, key: &str) {
        if let Err(e) = self.store.write(|view| metadata::record_access(view, key)) {
            warn!(key, error = %e, "Failed to record access");
        }
    }

    // == Exists ==
    /// Checks for a metadata record; expired entries exist until swept.
    pub fn exists(&self, key: &str) -> Result<bool> {
        if !keys::is_storable(key) {
            return Ok(false);
        }
        self.store.read(|view| view.contains(&keys::meta_key(key)))
    }

    // == Delete ==
    /// Removes an entry; deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        if !keys::is_storable(key) {
            return Ok(());
        }
        let removed = self.store.write(|view| remove_entry(view, key, None))?;
        if let Some(size) = removed {
            self.stats.record_delete(size);
            debug!(key, size, "Entry deleted");
        }
        Ok(())
    }

    // == List ==
    /// Returns metadata of every entry, skipping unreadable records.
    pub fn list(&self) -> Result<Vec<FileMetadata>> {
        let mut entries = Vec::new();
        self.store.read(|view| {
            view.scan_prefix(keys::META_PREFIX.as_bytes(), |storage_key, value| {
                if let Some(meta) = decode_scanned(storage_key, value) {
                    entries.push(meta);
                }
            })
        })?;
        Ok(entries)
    }

    // == Info ==
    pub fn info(&self, key: &str) -> Result<FileMetadata> {
        if !keys::is_storable(key) {
            return Err(CacheError::NotFound(key.to_string()));
        }
        self.store.read(|view| metadata::read(view, key))
    }

    // == Sweep ==
    /// Removes every entry that was expired when the sweep started.
    ///
    /// Only metadata is scanned. Per-key failures are logged and skipped; only
    /// a failure to open the scan itself is returned.
    pub fn sweep_expired(&self) -> Result<SweepReport> {
        let now = Utc::now();
        let mut expired = Vec::new();
        self.store.read(|view| {
            view.scan_prefix(keys::META_PREFIX.as_bytes(), |storage_key, value| {
                if let Some(meta) = decode_scanned(storage_key, value) {
                    if meta.is_expired_at(now) {
                        expired.push(meta.key);
                    }
                }
            })
        })?;

        let mut removed = 0;
        for key in &expired {
            match self.store.write(|view| remove_entry(view, key, Some(now))) {
                Ok(Some(size)) => {
                    self.stats.record_delete(size);
                    removed += 1;
                }
                Ok(None) => debug!(key = %key, "Expired entry already gone or refreshed"),
                Err(e) => warn!(key = %key, error = %e, "Failed to remove expired entry"),
            }
        }

        self.stats.record_cleanup(expired.len() as u64, Utc::now());
        if let Err(e) = self.save_stats() {
            warn!(error = %e, "Failed to persist stats after sweep");
        }

        let report = SweepReport {
            expired: expired.len(),
            removed,
        };
        if report.expired > 0 {
            info!(expired = report.expired, removed = report.removed, "Expired entries swept");
        } else {
            debug!("Sweep found no expired entries");
        }
        Ok(report)
    }

    pub fn save_stats(&self) -> Result<()> {
        self.stats.save(&self.store)
    }

    /// Detaches the store and blocks until in-flight transactions finish.
    pub fn close_store(&self) {
        if let Some(event) = self.store.close() {
            event.wait();
            debug!(dir = %self.config.data_dir.display(), "LMDB environment closed");
        }
    }
}

/// Deletes payload and metadata of `key` together.
///
/// With `expired_before` set, the entry is only removed if it is still expired
/// at that instant, so an entry stored again after a sweep's scan survives.
/// Returns the removed entry's size, or `None` if nothing was removed.
fn remove_entry(
    view: &mut WriteView<'_>,
    key: &str,
    expired_before: Option<DateTime<Utc>>,
) -> Result<Option<u64>> {
    let size = match metadata::read(&*view, key) {
        Ok(meta) => {
            if let Some(now) = expired_before {
                if !meta.is_expired_at(now) {
                    return Ok(None);
                }
            }
            Some(meta.size)
        }
        Err(CacheError::NotFound(_)) => None,
        Err(CacheError::Serialization(e)) if expired_before.is_none() => {
            warn!(key, error = %e, "Deleting entry with unreadable metadata");
            Some(0)
        }
        Err(e) => return Err(e),
    };

    // Clear a payload orphaned by an earlier failure even when metadata is gone.
    view.delete(&keys::payload_key(key))?;
    metadata::remove(view, key)?;
    Ok(size)
}

fn decode_scanned(storage_key: &[u8], value: std::io::Result<Vec<u8>>) -> Option<FileMetadata> {
    let Some(key) = keys::logical_key(storage_key) else {
        warn!(
            storage_key = %String::from_utf8_lossy(storage_key),
            "Skipping metadata record with unreadable key"
        );
        return None;
    };
    let decoded = value
        .map_err(CacheError::from)
        .and_then(|bytes| FileMetadata::decode(&bytes));
    match decoded {
        Ok(mut meta) => {
            meta.key = key.to_string();
            Some(meta)
        }
        Err(e) => {
            warn!(key, error = %e, "Skipping unreadable metadata record");
            None
        }
    }
}
