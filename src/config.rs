//! Configuration Module
//!
//! Handles loading, defaulting and validating cache configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// The configuration is immutable once a cache has been opened with it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the LMDB environment
    pub data_dir: PathBuf,
    /// Largest payload accepted by a single store, in bytes
    pub max_cache_size: u64,
    /// TTL applied when a store does not supply one
    pub default_ttl: Duration,
    /// Interval between background expiration sweeps
    pub cleanup_interval: Duration,
    /// Whether stored values are gzip-compressed
    pub compression: bool,
    /// LMDB map size in megabytes
    pub map_size_mb: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FILECACHE_DATA_DIR` - Data directory (default: ./cache)
    /// - `FILECACHE_MAX_CACHE_SIZE` - Max payload size in bytes (default: 1 GiB)
    /// - `FILECACHE_DEFAULT_TTL` - Default TTL in seconds (default: 86400)
    /// - `FILECACHE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 3600)
    /// - `FILECACHE_COMPRESSION` - Compress stored values (default: true)
    /// - `FILECACHE_MAP_SIZE_MB` - LMDB map size in megabytes (default: 10240)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("FILECACHE_DATA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_cache_size: env::var("FILECACHE_MAX_CACHE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_cache_size),
            default_ttl: env::var("FILECACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_ttl),
            cleanup_interval: env::var("FILECACHE_CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            compression: env::var("FILECACHE_COMPRESSION")
                .ok()
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(defaults.compression),
            map_size_mb: env::var("FILECACHE_MAP_SIZE_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.map_size_mb),
        }
    }

    /// Checks that the configuration can be used to open a cache.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig(
                "data directory cannot be empty".to_string(),
            ));
        }
        if self.max_cache_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max cache size must be positive".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default TTL must be positive".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "cleanup interval must be positive".to_string(),
            ));
        }
        if self.map_size_mb == 0 {
            return Err(CacheError::InvalidConfig(
                "map size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the LMDB map size in bytes.
    pub fn map_size_bytes(&self) -> Result<usize> {
        self.map_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| CacheError::InvalidConfig("map size overflows usize".to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cache"),
            max_cache_size: 1024 * 1024 * 1024, // 1 GiB
            default_ttl: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            compression: true,
            map_size_mb: 10 * 1024,
        }
    }
}
