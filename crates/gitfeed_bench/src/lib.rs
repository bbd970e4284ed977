//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use gitfeed_store::DiffEntry;
use serde_json::json;

/// Builds a deterministic diff of `count` entries spread over
/// `categories` directories. Every fifth entry is a deletion and every
/// third a modification.
pub fn synthetic_diff(count: usize, categories: usize) -> Vec<DiffEntry> {
    (0..count)
        .map(|i| {
            let path = format!("category_{}/{i}.json", i % categories.max(1));
            if i % 5 == 4 {
                return DiffEntry::deleted(path);
            }
            let body = json!({
                "id": i,
                "title": format!("record {i}"),
                "published": i % 2 == 0,
                "score": i as f64 / 3.0,
            });
            let bytes = serde_json::to_vec(&body).unwrap_or_default();
            if i % 3 == 0 {
                DiffEntry::modified(path, bytes)
            } else {
                DiffEntry::added(path, bytes)
            }
        })
        .collect()
}

/// Category names produced by [`synthetic_diff`].
pub fn synthetic_categories(categories: usize) -> Vec<String> {
    (0..categories.max(1))
        .map(|i| format!("Category{i}"))
        .collect()
}
