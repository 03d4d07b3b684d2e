//! Cache Module
//!
//! TTL-aware file caching over an embedded transactional key-value store.

mod engine;
pub mod keys;
pub mod metadata;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{CacheCore, SweepReport};
pub use metadata::FileMetadata;
pub use stats::{CacheStats, StatsTracker};
pub use store::FileCache;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
