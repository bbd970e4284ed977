//! Classification properties over generated working-tree diffs.

use gitfeed_core::{naming, ChangeKind, Config};
use gitfeed_store::MockStore;
use gitfeed_sync::Producer;
use gitfeed_testkit::{diff_strategy, PropTestConfig};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn producer_with(entries: Vec<gitfeed_store::DiffEntry>) -> (TempDir, Producer) {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(Config::builder(dir.path().join("repo")).build().unwrap());
    let store = Arc::new(MockStore::new("v0").with_workdir(dir.path().join("repo")));
    store.script_working_diff(entries);
    (dir, Producer::with_store(config, store))
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn every_entry_lands_in_its_own_category(entries in diff_strategy(0, 24)) {
        let (_dir, producer) = producer_with(entries.clone());
        let changes = producer.latest_changes().unwrap();

        prop_assert_eq!(changes.total_changes(), entries.len());
        for (category, list) in changes.iter() {
            let expected: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.path())
                .filter(|path| {
                    naming::category_and_id(path)
                        .is_some_and(|(found, _)| &found == category)
                })
                .collect();
            let actual: Vec<&str> = list.iter().map(|change| change.path.as_str()).collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn deletions_carry_empty_payloads(entries in diff_strategy(1, 24)) {
        let (_dir, producer) = producer_with(entries);
        let changes = producer.latest_changes().unwrap();

        for (_, list) in changes.iter() {
            for change in list {
                if change.kind == ChangeKind::Deleted {
                    prop_assert!(change.payload.is_empty());
                }
            }
        }
    }

    #[test]
    fn classification_is_deterministic(entries in diff_strategy(0, 24)) {
        let (_dir, producer) = producer_with(entries);
        let first = serde_json::to_value(producer.latest_changes().unwrap()).unwrap();
        let second = serde_json::to_value(producer.latest_changes().unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}
