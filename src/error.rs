//! Error types for the file cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the file cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key has expired
    #[error("Key expired: {0}")]
    Expired(String),

    /// Key cannot be stored under the cache key schema
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Payload larger than the configured max cache size
    #[error("Payload exceeds max cache size of {max} bytes")]
    SizeExceeded { max: u64 },

    /// Metadata or stats record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transaction or environment failure in the underlying store
    #[error("Store error: {0}")]
    Store(#[from] heed::Error),

    /// Payload reader or value codec failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected at construction time
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Operation issued after the cache was closed
    #[error("Cache is closed")]
    Closed,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for errors callers should treat as a cache miss.
    ///
    /// Expired entries are reported the same way as absent ones.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_) | CacheError::Expired(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the file cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_is_not_found() {
        assert!(CacheError::NotFound("a".to_string()).is_not_found());
        assert!(CacheError::Expired("a".to_string()).is_not_found());
        assert!(!CacheError::Closed.is_not_found());
        assert!(!CacheError::SizeExceeded { max: 1 }.is_not_found());
    }

    #[test]
    fn test_size_exceeded_message() {
        let err = CacheError::SizeExceeded { max: 1024 };
        assert_eq!(err.to_string(), "Payload exceeds max cache size of 1024 bytes");
    }
}
