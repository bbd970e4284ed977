//! # gitfeed Sync
//!
//! Consumer and producer engines for git-backed change feeds.
//!
//! A producer writes records as files into a git working tree, commits and
//! pushes. Consumers fetch, diff from the last version they applied to the
//! new head, and hand every changed record to a registered category.
//!
//! ## Architecture
//!
//! ```text
//! Producer                         Consumer
//!   write_file / write_back          update
//!   commit ──► push ──► remote ──► fetch ──► diff ──► classify ──► apply
//! ```
//!
//! ## Key Invariants
//!
//! - At most one cycle runs per repository at a time, across processes
//! - The version pointer moves only after every change and deferred task of
//!   a cycle succeeded
//! - Categories are applied in the configured order, then in first-seen
//!   order; changes within a category in diff order
//! - A category that lacks a capability is skipped with a warning; any other
//!   handler failure aborts the cycle
//!
//! ## Example
//!
//! ```
//! use gitfeed_core::{Config, MemoryVersionManager};
//! use gitfeed_store::{DiffEntry, MockStore};
//! use gitfeed_sync::Consumer;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = Arc::new(Config::builder(dir.path().join("repo")).build().unwrap());
//! config.set_version_manager(Arc::new(MemoryVersionManager::starting_at("v0")));
//!
//! let store = Arc::new(MockStore::new("v1"));
//! store.script_diff("v0", "v1", vec![DiffEntry::added("post/1.json", b"{}".to_vec())]);
//!
//! let consumer = Consumer::with_store(config, store);
//! let report = consumer.update().unwrap();
//!
//! // Nothing is mapped, so nothing is applied, but the version still moves.
//! assert_eq!(report.changes_applied, 0);
//! assert_eq!(consumer.version().unwrap().as_str(), "v1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod error;
mod producer;
mod selector;
mod state;

pub use consumer::Consumer;
pub use error::{SyncError, SyncResult};
pub use producer::{Producer, DEFAULT_COMMIT_MESSAGE, INITIAL_COMMIT_MESSAGE};
pub use selector::CommitSelector;
pub use state::{CycleReport, CycleState, CycleStats};
