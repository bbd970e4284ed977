//! # gitfeed Core
//!
//! Configuration, change classification and locking for gitfeed.
//!
//! This crate sits between the versioned store and the sync engines. It
//! decides which category every changed record file belongs to, who
//! receives it, and in what order categories are applied.
//!
//! ## Core Concepts
//!
//! - **Category**: a named record type; files live under the underscored
//!   category directory, e.g. `nsync_test_foo/1.json`
//! - **Mapping**: producer categories fan out to consumer categories
//! - **Registry**: consumer category names resolve to [`RecordCategory`]
//!   handles that look up, add and update local records
//! - **ChangeSet**: a diff classified by consumer category
//! - **Version manager**: remembers the last fully applied version
//! - **Lock**: one cycle at a time per repository, across processes
//!
//! ## Example
//!
//! ```
//! use gitfeed_core::{classify, Category, Config, Resolution};
//! use gitfeed_store::DiffEntry;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = Config::builder(dir.path().join("repo"))
//!     .map_class("BlogPost", ["Post"])
//!     .build()
//!     .unwrap();
//!
//! let entries = vec![DiffEntry::added("blog_post/1.json", br#"{"title":"hi"}"#.to_vec())];
//! let changes = classify(&entries, config.format(), &config.resolver(Resolution::MappedOrSelf));
//!
//! // "Post" is mapped but not registered, so the producer's own category is used.
//! assert!(changes.contains("BlogPost"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod category;
mod changeset;
mod config;
mod cycle;
mod error;
mod lock;
mod mapping;
pub mod naming;
mod registry;
mod version;
mod writeback;

pub use category::{Capability, Category, Change, ChangeKind, RecordCategory, SyncedRecord};
pub use changeset::{classify, CategoryResolver, ChangeSet, Resolution};
pub use config::{Config, ConfigBuilder, ConfigFile, ConfigResolver, NetworkSection};
pub use cycle::{CycleContext, DeferredTask};
pub use error::{CoreError, CoreResult};
pub use lock::{FileLock, LockGuard};
pub use mapping::ClassMapping;
pub use registry::CategoryRegistry;
pub use version::{FileVersionManager, MemoryVersionManager, StoreVersionManager, VersionManager};
pub use writeback::{
    record_path, remove_back, write_back, ProducerRecord, RecordWriter, WorkingTree, WriteBack,
};

pub use gitfeed_codec::{FileContent, Record, RecordFormat};
pub use gitfeed_store::{DiffEntry, VersionPointer, VersionedStore};
