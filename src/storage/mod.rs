//! Storage Module
//!
//! Thin adapter over an LMDB environment (via heed) exposing closure-scoped
//! read and write transactions over a single ordered `bytes -> bytes` database.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions and serializes writers. Transactions are
//! bound to the thread that opened them, so every view lives entirely inside
//! one closure call and never crosses an `.await`.

mod codec;

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use heed::types::Bytes;
use heed::{Database, Env, EnvClosingEvent, EnvOpenOptions, RoTxn, RwTxn};
use tracing::debug;

use crate::error::{CacheError, Result};

pub use codec::ValueCodec;

/// Options used to open a [`KvStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// LMDB map size in bytes, a multiple of the OS page size
    pub map_size: usize,
    /// Whether values are gzip-compressed on write
    pub compression: bool,
}

// == Read Access ==
/// Keyed lookups shared by read and write views.
pub trait KvRead {
    /// Returns the decoded value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns true if a value is stored under `key`, without decoding it.
    fn contains(&self, key: &[u8]) -> Result<bool>;
}

// == KV Store ==
/// Ordered transactional key-value store rooted at a directory.
pub struct KvStore {
    /// The environment, `None` once closed
    env: RwLock<Option<Env>>,
    /// The main database (single unnamed database)
    db: Database<Bytes, Bytes>,
    codec: ValueCodec,
}

impl KvStore {
    /// Opens (or creates) the store under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - The LMDB environment cannot be opened
    /// - The database cannot be created
    pub fn open(dir: &Path, options: StoreOptions) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        // SAFETY: the environment is opened once per directory by this process
        // and the files are not modified by anything other than LMDB.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .max_dbs(1)
                .open(dir)
        }?;

        let mut wtxn = env.write_txn()?;
        let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None)?;
        wtxn.commit()?;

        debug!(
            dir = %dir.display(),
            map_size = options.map_size,
            compression = options.compression,
            "LMDB environment opened"
        );

        Ok(Self {
            env: RwLock::new(Some(env)),
            db,
            codec: ValueCodec::new(options.compression),
        })
    }

    fn env(&self) -> Result<Env> {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CacheError::Closed)
    }

    /// Runs `f` inside a read-only transaction.
    pub fn read<T>(&self, f: impl FnOnce(&ReadView<'_>) -> Result<T>) -> Result<T> {
        let env = self.env()?;
        let view = ReadView {
            txn: env.read_txn()?,
            db: self.db,
            codec: self.codec,
        };
        f(&view)
    }

    /// Runs `f` inside a read-write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and is aborted otherwise;
    /// nothing `f` wrote is visible before the commit.
    pub fn write<T>(&self, f: impl FnOnce(&mut WriteView<'_>) -> Result<T>) -> Result<T> {
        let env = self.env()?;
        let mut view = WriteView {
            txn: env.write_txn()?,
            db: self.db,
            codec: self.codec,
        };
        let out = f(&mut view)?;
        view.txn.commit()?;
        Ok(out)
    }

    /// Detaches the environment so no new transactions can start.
    ///
    /// The returned event fires once every in-flight transaction has released
    /// the environment. Returns `None` if the store was already closed.
    pub fn close(&self) -> Option<EnvClosingEvent> {
        let env = self
            .env
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(env.prepare_for_closing())
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

// == Read View ==
/// A consistent read-only snapshot of the store.
pub struct ReadView<'e> {
    txn: RoTxn<'e>,
    db: Database<Bytes, Bytes>,
    codec: ValueCodec,
}

impl ReadView<'_> {
    /// Visits every entry whose key starts with `prefix`, in key order.
    ///
    /// Values that fail to decode are handed to `visit` as errors so the
    /// caller can skip them; failures of the iteration itself are returned.
    pub fn scan_prefix<F>(&self, prefix: &[u8], mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], std::io::Result<Vec<u8>>),
    {
        for item in self.db.prefix_iter(&self.txn, prefix)? {
            let (key, stored) = item?;
            visit(key, self.codec.decode(stored));
        }
        Ok(())
    }
}

impl KvRead for ReadView<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.db.get(&self.txn, key)? {
            Some(stored) => Ok(Some(self.codec.decode(stored)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.db.get(&self.txn, key)?.is_some())
    }
}

// == Write View ==
/// An open read-write transaction.
pub struct WriteView<'e> {
    txn: RwTxn<'e>,
    db: Database<Bytes, Bytes>,
    codec: ValueCodec,
}

impl WriteView<'_> {
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let stored = self.codec.encode(value)?;
        self.db.put(&mut self.txn, key, &stored)?;
        Ok(())
    }

    /// Removes `key`, returning whether it was present.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.db.delete(&mut self.txn, key)?)
    }
}

impl KvRead for WriteView<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.db.get(&self.txn, key)? {
            Some(stored) => Ok(Some(self.codec.decode(stored)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.db.get(&self.txn, key)?.is_some())
    }
}
