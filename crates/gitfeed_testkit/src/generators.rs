//! Property-based test generators using proptest.
//!
//! Provides strategies for records, category directories and store diffs
//! whose paths classify cleanly.

use gitfeed_codec::Record;
use gitfeed_store::DiffEntry;
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for generating category directory names, e.g. `blog_post`.
pub fn category_dir_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{2,8}(_[a-z]{2,8}){0,2}").expect("Invalid regex")
}

/// Strategy for generating record ids.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex")
}

/// Strategy for generating flat records with scalar values.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z]{1,10}").expect("Invalid regex"),
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            prop::string::string_regex("[ -~]{0,20}")
                .expect("Invalid regex")
                .prop_map(Value::from),
            Just(Value::Null),
        ],
        0..6,
    )
    .prop_map(|map| map.into_iter().collect())
}

/// Strategy for generating one JSON diff entry under a category directory.
pub fn diff_entry_strategy() -> impl Strategy<Value = DiffEntry> {
    (
        category_dir_strategy(),
        record_id_strategy(),
        record_strategy(),
        0u8..3,
    )
        .prop_map(|(dir, id, record, kind)| {
            let path = format!("{dir}/{id}.json");
            let bytes = serde_json::to_vec(&record).expect("records always encode");
            match kind {
                0 => DiffEntry::added(path, bytes),
                1 => DiffEntry::modified(path, bytes),
                _ => DiffEntry::deleted(path),
            }
        })
}

/// Strategy for generating a diff of `min..max` entries.
pub fn diff_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<DiffEntry>> {
    prop::collection::vec(diff_entry_strategy(), min..max)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
