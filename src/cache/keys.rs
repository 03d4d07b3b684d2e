//! Key Schema
//!
//! Maps logical cache keys onto three disjoint namespaces of the store:
//! `payload:<key>` holds raw bytes, `meta:<key>` holds the metadata record,
//! and the fixed key `stats` holds the aggregate statistics record.
//!
//! Logical keys must not begin with either prefix or equal `stats`. Store
//! rejects such keys so no logical key is ever mistaken for another namespace.

use crate::cache::MAX_KEY_LENGTH;
use crate::error::{CacheError, Result};

pub const PAYLOAD_PREFIX: &str = "payload:";
pub const META_PREFIX: &str = "meta:";
pub const STATS_KEY: &str = "stats";

/// Storage key of an entry's payload.
pub fn payload_key(key: &str) -> Vec<u8> {
    prefixed(PAYLOAD_PREFIX, key)
}

/// Storage key of an entry's metadata record.
pub fn meta_key(key: &str) -> Vec<u8> {
    prefixed(META_PREFIX, key)
}

fn prefixed(prefix: &str, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + key.len());
    out.extend_from_slice(prefix.as_bytes());
    out.extend_from_slice(key.as_bytes());
    out
}

/// Recovers the logical key from a metadata storage key.
///
/// Returns `None` for keys outside the metadata namespace or that are not UTF-8.
pub fn logical_key(storage_key: &[u8]) -> Option<&str> {
    let suffix = storage_key.strip_prefix(META_PREFIX.as_bytes())?;
    std::str::from_utf8(suffix).ok()
}

/// Checks that `key` may be stored.
pub fn validate(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if key.starts_with(PAYLOAD_PREFIX) || key.starts_with(META_PREFIX) || key == STATS_KEY {
        return Err(CacheError::InvalidKey(format!(
            "key '{}' collides with a reserved namespace",
            key
        )));
    }
    Ok(())
}

/// Returns true if `key` could have been stored.
///
/// Lookups with any other key are answered as absent without touching the store.
pub fn is_storable(key: &str) -> bool {
    validate(key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_disjoint() {
        assert_eq!(payload_key("a.txt"), b"payload:a.txt".to_vec());
        assert_eq!(meta_key("a.txt"), b"meta:a.txt".to_vec());
        assert_ne!(payload_key("stats"), STATS_KEY.as_bytes());
        assert_ne!(meta_key("stats"), STATS_KEY.as_bytes());
    }

    #[test]
    fn test_logical_key_strips_meta_prefix() {
        assert_eq!(logical_key(b"meta:dir/file:1.bin"), Some("dir/file:1.bin"));
        assert_eq!(logical_key(&meta_key("x")), Some("x"));
    }

    #[test]
    fn test_logical_key_ignores_other_namespaces() {
        assert_eq!(logical_key(b"payload:x"), None);
        assert_eq!(logical_key(b"stats"), None);
        assert_eq!(logical_key(b"meta"), None);
    }

    #[test]
    fn test_logical_key_rejects_non_utf8() {
        assert_eq!(logical_key(b"meta:\xff\xfe"), None);
    }

    #[test]
    fn test_validate_accepts_colons() {
        assert!(validate("images:2024:cat.png").is_ok());
        assert!(validate("metadata.json").is_ok());
        assert!(validate("statistics").is_ok());
    }

    #[test]
    fn test_validate_rejects_reserved_keys() {
        assert!(matches!(validate(""), Err(CacheError::InvalidKey(_))));
        assert!(matches!(validate("payload:x"), Err(CacheError::InvalidKey(_))));
        assert!(matches!(validate("meta:x"), Err(CacheError::InvalidKey(_))));
        assert!(matches!(validate("stats"), Err(CacheError::InvalidKey(_))));
        assert!(!is_storable(&"k".repeat(MAX_KEY_LENGTH + 1)));
        assert!(is_storable(&"k".repeat(MAX_KEY_LENGTH)));
    }
}
