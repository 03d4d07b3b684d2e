//! Metadata Module
//!
//! Per-entry metadata records and their lifecycle inside store transactions.
//! Every function here runs inside a transaction the caller opened; the caller
//! writes or removes the matching payload record in that same transaction.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::keys;
use crate::error::{CacheError, Result};
use crate::storage::{KvRead, WriteView};

// == File Metadata ==
/// Descriptive record stored alongside every cached payload.
///
/// Encoded as JSON; fields added later must carry `#[serde(default)]` so
/// records written by older versions keep decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Logical cache key
    #[serde(default)]
    pub key: String,
    /// Payload size in bytes
    pub size: u64,
    /// MIME type supplied by the caller
    #[serde(default)]
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Number of successful fetches
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub last_accessed_at: DateTime<Utc>,
}

impl FileMetadata {
    // == Constructor ==
    /// Creates a record for a payload stored now with the given TTL.
    pub fn new(key: impl Into<String>, size: u64, mime_type: impl Into<String>, ttl: Duration) -> Self {
        Self::new_at(key, size, mime_type, ttl, Utc::now())
    }

    /// Creates a record as if stored at `now`.
    pub fn new_at(
        key: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let latest = latest_expiry();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .map_or(latest, |at| at.min(latest));

        Self {
            key: key.into(),
            size,
            mime_type: mime_type.into(),
            created_at: now,
            expires_at,
            access_count: 0,
            last_accessed_at: now,
        }
    }

    // == Expiration ==
    /// An entry is expired once `expires_at` lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    // == Access Tracking ==
    /// Counts one more access, stamped now.
    pub fn record_access(&mut self) {
        self.record_access_at(Utc::now());
    }

    pub fn record_access_at(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now;
    }

    // == Encoding ==
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Upper bound for `expires_at`: 9999-12-31T23:59:59Z.
///
/// Later instants need a signed year in RFC 3339, which does not round trip.
pub fn latest_expiry() -> DateTime<Utc> {
    DateTime::from_timestamp(253_402_300_799, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// == Lifecycle ==
/// Reads the metadata record of `key`.
///
/// The returned record carries the logical key it was looked up under.
pub fn read(view: &impl KvRead, key: &str) -> Result<FileMetadata> {
    let bytes = view
        .get(&keys::meta_key(key))?
        .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
    let mut meta = FileMetadata::decode(&bytes)?;
    meta.key = key.to_string();
    Ok(meta)
}

/// Writes `meta` under its own key, replacing any previous record.
pub fn write(view: &mut WriteView<'_>, meta: &FileMetadata) -> Result<()> {
    view.put(&keys::meta_key(&meta.key), &meta.encode()?)
}

/// Removes the metadata record of `key`, returning whether it existed.
pub fn remove(view: &mut WriteView<'_>, key: &str) -> Result<bool> {
    view.delete(&keys::meta_key(key))
}

/// Applies one access to the record currently stored for `key`.
///
/// Returns `None` without writing if the entry disappeared since it was
/// fetched, so a concurrent delete is never undone.
pub fn record_access(view: &mut WriteView<'_>, key: &str) -> Result<Option<FileMetadata>> {
    let mut current = match read(&*view, key) {
        Ok(meta) => meta,
        Err(CacheError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    current.record_access();
    write(view, &current)?;
    Ok(Some(current))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStore, StoreOptions};
    use tempfile::TempDir;

    fn create_test_store() -> (KvStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = KvStore::open(
            temp_dir.path(),
            StoreOptions {
                map_size: 16 * 1024 * 1024,
                compression: false,
            },
        )
        .expect("store open should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_new_sets_lifecycle_fields() {
        let now = Utc::now();
        let meta = FileMetadata::new_at("a.txt", 13, "text/plain", Duration::from_secs(60), now);

        assert_eq!(meta.key, "a.txt");
        assert_eq!(meta.size, 13);
        assert_eq!(meta.mime_type, "text/plain");
        assert_eq!(meta.created_at, now);
        assert_eq!(meta.expires_at, now + TimeDelta::seconds(60));
        assert_eq!(meta.access_count, 0);
        assert_eq!(meta.last_accessed_at, now);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Utc::now();
        let meta = FileMetadata::new_at("k", 1, "", Duration::from_secs(10), now);

        // Expired only once the deadline is strictly in the past
        assert!(!meta.is_expired_at(meta.expires_at));
        assert!(meta.is_expired_at(meta.expires_at + TimeDelta::milliseconds(1)));
        assert!(!meta.is_expired_at(now));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let meta = FileMetadata::new("k", 1, "", Duration::MAX);
        assert_eq!(meta.expires_at, latest_expiry());
        assert!(!meta.is_expired());

        let decoded = FileMetadata::decode(&meta.encode().unwrap()).unwrap();
        assert_eq!(decoded.expires_at, meta.expires_at);
    }

    #[test]
    fn test_record_access() {
        let mut meta = FileMetadata::new("k", 1, "", Duration::from_secs(10));
        let later = meta.created_at + TimeDelta::seconds(5);

        meta.record_access_at(later);
        meta.record_access_at(later);

        assert_eq!(meta.access_count, 2);
        assert_eq!(meta.last_accessed_at, later);
    }

    #[test]
    fn test_decode_tolerates_missing_and_unknown_fields() {
        let json = r#"{
            "size": 5,
            "created_at": "2024-01-01T00:00:00Z",
            "expires_at": "2024-01-02T00:00:00Z",
            "checksum": "ignored"
        }"#;
        let meta = FileMetadata::decode(json.as_bytes()).unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.access_count, 0);
        assert!(meta.mime_type.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            FileMetadata::decode(b"not json"),
            Err(CacheError::Serialization(_))
        ));
    }

    #[test]
    fn test_read_write_remove() {
        let (store, _temp_dir) = create_test_store();
        let meta = FileMetadata::new("doc.pdf", 42, "application/pdf", Duration::from_secs(60));

        store.write(|view| write(view, &meta)).unwrap();
        let loaded = store.read(|view| read(view, "doc.pdf")).unwrap();
        assert_eq!(loaded, meta);

        assert!(store.write(|view| remove(view, "doc.pdf")).unwrap());
        assert!(matches!(
            store.read(|view| read(view, "doc.pdf")),
            Err(CacheError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_sets_logical_key() {
        let (store, _temp_dir) = create_test_store();
        let mut meta = FileMetadata::new("real", 1, "", Duration::from_secs(60));
        meta.key = "stale".to_string();

        store
            .write(|view| view.put(&keys::meta_key("real"), &meta.encode()?))
            .unwrap();

        assert_eq!(store.read(|view| read(view, "real")).unwrap().key, "real");
    }

    #[test]
    fn test_record_access_skips_missing_entries() {
        let (store, _temp_dir) = create_test_store();

        let updated = store.write(|view| record_access(view, "gone")).unwrap();
        assert!(updated.is_none());
        assert!(!store.read(|view| view.contains(&keys::meta_key("gone"))).unwrap());
    }

    #[test]
    fn test_record_access_persists() {
        let (store, _temp_dir) = create_test_store();
        let meta = FileMetadata::new("k", 1, "", Duration::from_secs(60));
        store.write(|view| write(view, &meta)).unwrap();

        store.write(|view| record_access(view, "k")).unwrap();
        let updated = store.write(|view| record_access(view, "k")).unwrap().unwrap();

        assert_eq!(updated.access_count, 2);
        assert_eq!(store.read(|view| read(view, "k")).unwrap().access_count, 2);
    }
}
