//! Cache Statistics Module
//!
//! Tracks aggregate counters and the running hit/miss rates, persisted as a
//! single record under the `stats` key.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::keys::STATS_KEY;
use crate::error::Result;
use crate::storage::{KvRead, KvStore};

// == Cache Stats ==
/// Aggregate cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStats {
    /// Number of cached entries
    pub total_files: u64,
    /// Sum of cached payload sizes in bytes
    pub total_size: u64,
    /// Running-average share of fetches that hit
    pub hit_rate: f64,
    /// Running-average share of fetches that missed
    pub miss_rate: f64,
    /// Entries removed by the most recent sweep
    pub expired_files: u64,
    /// Completion time of the most recent sweep
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Store ==
    pub fn record_store(&mut self, size: u64) {
        self.total_files = self.total_files.saturating_add(1);
        self.total_size = self.total_size.saturating_add(size);
    }

    // == Record Delete ==
    /// Counts a removed entry; neither counter goes below zero.
    ///
    /// The size is left untouched when it would underflow.
    pub fn record_delete(&mut self, size: u64) {
        self.total_files = self.total_files.saturating_sub(1);
        if self.total_size >= size {
            self.total_size -= size;
        }
    }

    // == Record Hit ==
    /// Folds a hit into the running rates.
    ///
    /// `hit' = (hit * total + 1) / (total + 1)` with `total = hit + miss`,
    /// then `miss' = 1 - hit'`. The first observation starts at (1, 0).
    pub fn record_hit(&mut self) {
        let total = self.hit_rate + self.miss_rate;
        if total == 0.0 {
            self.hit_rate = 1.0;
            self.miss_rate = 0.0;
        } else {
            self.hit_rate = (self.hit_rate * total + 1.0) / (total + 1.0);
            self.miss_rate = 1.0 - self.hit_rate;
        }
    }

    // == Record Miss ==
    /// Mirror image of [`CacheStats::record_hit`].
    pub fn record_miss(&mut self) {
        let total = self.hit_rate + self.miss_rate;
        if total == 0.0 {
            self.hit_rate = 0.0;
            self.miss_rate = 1.0;
        } else {
            self.miss_rate = (self.miss_rate * total + 1.0) / (total + 1.0);
            self.hit_rate = 1.0 - self.miss_rate;
        }
    }

    // == Record Cleanup ==
    /// Overwrites the sweep counters; `expired_files` is not cumulative.
    pub fn record_cleanup(&mut self, expired: u64, at: DateTime<Utc>) {
        self.expired_files = expired;
        self.last_cleanup = Some(at);
    }
}

// == Stats Tracker ==
/// Lock-guarded [`CacheStats`] shared by every cache operation.
///
/// Mutators hold the write lock only for the in-memory update; persistence
/// works on a snapshot taken beforehand.
#[derive(Debug, Default)]
pub struct StatsTracker {
    inner: RwLock<CacheStats>,
}

impl StatsTracker {
    pub fn new(stats: CacheStats) -> Self {
        Self {
            inner: RwLock::new(stats),
        }
    }

    /// Loads the persisted record, starting from zero if it is missing or corrupt.
    pub fn load(store: &KvStore) -> Self {
        let loaded = store.read(|view| view.get(STATS_KEY.as_bytes()));
        let stats = match loaded {
            Ok(Some(bytes)) => match serde_json::from_slice::<CacheStats>(&bytes) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable stats record");
                    CacheStats::default()
                }
            },
            Ok(None) => CacheStats::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load stats record, starting from zero");
                CacheStats::default()
            }
        };
        debug!(
            total_files = stats.total_files,
            total_size = stats.total_size,
            "Stats loaded"
        );
        Self::new(stats)
    }

    /// Persists a point-in-time copy of the stats in a single transaction.
    pub fn save(&self, store: &KvStore) -> Result<()> {
        let bytes = serde_json::to_vec(&self.snapshot())?;
        store.write(|view| view.put(STATS_KEY.as_bytes(), &bytes))
    }

    /// Returns a copy of the current stats.
    pub fn snapshot(&self) -> CacheStats {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    pub fn record_store(&self, size: u64) {
        self.update(|stats| stats.record_store(size));
    }

    pub fn record_delete(&self, size: u64) {
        self.update(|stats| stats.record_delete(size));
    }

    pub fn record_hit(&self) {
        self.update(CacheStats::record_hit);
    }

    pub fn record_miss(&self) {
        self.update(CacheStats::record_miss);
    }

    pub fn record_cleanup(&self, expired: u64, at: DateTime<Utc>) {
        self.update(|stats| stats.record_cleanup(expired, at));
    }
}
