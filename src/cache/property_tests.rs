//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the statistics recurrence, the key schema and the
//! store-level round trip against a real LMDB environment.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use tempfile::TempDir;

use crate::cache::{keys, CacheCore, CacheStats};
use crate::config::Config;

// == Test Configuration ==
const TEST_MAX_CACHE_SIZE: u64 = 64 * 1024;

fn create_test_core(compression: bool) -> (CacheCore, TempDir) {
    let temp_dir = TempDir::new().expect("TempDir creation should succeed");
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        max_cache_size: TEST_MAX_CACHE_SIZE,
        default_ttl: Duration::from_secs(300),
        cleanup_interval: Duration::from_secs(60),
        compression,
        map_size_mb: 16,
    };
    let core = CacheCore::open(config).expect("core open should succeed");
    (core, temp_dir)
}

// == Strategies ==
/// Generates storable cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./-]{1,64}".prop_filter("reserved key", |k| keys::is_storable(k))
}

/// Generates payloads within the size limit
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

#[derive(Debug, Clone)]
enum StatsOp {
    Store(u64),
    Delete(u64),
}

fn stats_op_strategy() -> impl Strategy<Value = StatsOp> {
    prop_oneof![
        (0u64..10_000).prop_map(StatsOp::Store),
        (0u64..10_000).prop_map(StatsOp::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // After any sequence of hits and misses the two rates sum to one.
    #[test]
    fn prop_rates_sum_to_one(observations in prop::collection::vec(any::<bool>(), 1..200)) {
        let mut stats = CacheStats::new();
        for hit in observations {
            if hit {
                stats.record_hit();
            } else {
                stats.record_miss();
            }
            prop_assert!((stats.hit_rate + stats.miss_rate - 1.0).abs() < 1e-9);
            prop_assert!((0.0..=1.0).contains(&stats.hit_rate));
            prop_assert!((0.0..=1.0).contains(&stats.miss_rate));
        }
    }

    // Counters follow a floor-at-zero model and the size never underflows.
    #[test]
    fn prop_counters_never_underflow(ops in prop::collection::vec(stats_op_strategy(), 1..100)) {
        let mut stats = CacheStats::new();
        let mut files: u64 = 0;
        let mut size: u64 = 0;

        for op in ops {
            match op {
                StatsOp::Store(s) => {
                    stats.record_store(s);
                    files += 1;
                    size += s;
                }
                StatsOp::Delete(s) => {
                    stats.record_delete(s);
                    files = files.saturating_sub(1);
                    if size >= s {
                        size -= s;
                    }
                }
            }
            prop_assert_eq!(stats.total_files, files);
            prop_assert_eq!(stats.total_size, size);
        }
    }

    // Metadata keys map back to their logical key; payload keys never do.
    #[test]
    fn prop_key_schema_roundtrip(key in valid_key_strategy()) {
        let meta_key = keys::meta_key(&key);
        let payload_key = keys::payload_key(&key);

        prop_assert_eq!(keys::logical_key(&meta_key), Some(key.as_str()));
        prop_assert_eq!(keys::logical_key(&payload_key), None);
        prop_assert_ne!(meta_key, payload_key);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Storing then fetching returns the same bytes and matching metadata.
    #[test]
    fn prop_roundtrip_storage(
        key in valid_key_strategy(),
        payload in payload_strategy(),
        compression in any::<bool>(),
    ) {
        let (core, _temp_dir) = create_test_core(compression);

        core.store(&key, &payload, "application/octet-stream", None).unwrap();
        let (data, meta) = core.fetch(&key).unwrap();

        prop_assert_eq!(data, payload.clone());
        prop_assert_eq!(meta.key, key);
        prop_assert_eq!(meta.size, payload.len() as u64);
        prop_assert_eq!(meta.mime_type, "application/octet-stream");
    }

    // After N distinct stores and M deletes, total_files == N - M and list agrees.
    #[test]
    fn prop_stats_track_distinct_entries(
        keys_set in prop::collection::hash_set(valid_key_strategy(), 1..20),
        delete_ratio in 0.0f64..=1.0,
    ) {
        let (core, _temp_dir) = create_test_core(false);
        let all: Vec<String> = keys_set.into_iter().collect();
        let delete_count = (all.len() as f64 * delete_ratio) as usize;

        for key in &all {
            core.store(key, key.as_bytes(), "text/plain", None).unwrap();
        }
        for key in &all[..delete_count] {
            core.delete(key).unwrap();
        }

        let stats = core.stats();
        prop_assert_eq!(stats.total_files, (all.len() - delete_count) as u64);

        let listed: HashSet<String> = core.list().unwrap().into_iter().map(|m| m.key).collect();
        let expected: HashSet<String> = all[delete_count..].iter().cloned().collect();
        prop_assert_eq!(listed, expected);
    }
}
