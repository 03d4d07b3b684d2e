//! filecache - A TTL-aware file cache
//!
//! Stores binary payloads with metadata in an embedded LMDB environment, with
//! running statistics and background expiration.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;
pub mod tasks;

pub use cache::{CacheStats, FileCache, FileMetadata, SweepReport};
pub use config::Config;
pub use error::{CacheError, Result};
