//! Record categories and the changes applied to them.
//!
//! A category is the unit of routing: every record file belongs to exactly
//! one producer category, which maps to zero or more consumer categories.
//! Consumers implement [`RecordCategory`] for each category they register,
//! and [`SyncedRecord`] for the objects a lookup returns.

use crate::cycle::CycleContext;
use crate::error::{CoreError, CoreResult};
use gitfeed_codec::Record;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of a record category, e.g. `NsyncTestFoo` or `Admin::AuditEntry`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Creates a category name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&String> for Category {
    fn from(name: &String) -> Self {
        Self(name.clone())
    }
}

impl Borrow<str> for Category {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What happened to a record file between two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The file did not exist at the old version.
    Added,
    /// The file changed in place.
    Modified,
    /// The file no longer exists.
    Deleted,
}

impl ChangeKind {
    /// Derives the kind from diff flags. Deletion wins over addition.
    pub fn from_flags(added: bool, deleted: bool) -> Self {
        if deleted {
            ChangeKind::Deleted
        } else if added {
            ChangeKind::Added
        } else {
            ChangeKind::Modified
        }
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified change to a record file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// Record id, the file name without its extension.
    pub id: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Path of the file relative to the repository root.
    pub path: String,
    /// Decoded content at the new version. Empty for deletions and for
    /// content that could not be decoded.
    pub payload: Record,
}

/// Optional operations a category or record may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create a record from a change.
    Add,
    /// Apply a change to an existing record.
    Update,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Add => f.write_str("add"),
            Capability::Update => f.write_str("update"),
        }
    }
}

/// A consumer-side record category.
///
/// `lookup` is required. `add` is optional: categories that cannot create
/// records keep the default, and the orchestrator logs and skips the change.
pub trait RecordCategory: Send + Sync {
    /// Finds the local records synced from the given id.
    ///
    /// Returning several records applies the change to each of them.
    fn lookup(&self, id: &str) -> CoreResult<Vec<Box<dyn SyncedRecord>>>;

    /// Creates a record for an id with no local counterpart.
    ///
    /// Never called for deletions.
    fn add(
        &self,
        cycle: &CycleContext,
        kind: ChangeKind,
        path: &str,
        payload: &Record,
    ) -> CoreResult<()> {
        let _ = (cycle, kind, path, payload);
        Err(CoreError::capability_missing(Capability::Add))
    }
}

/// A local record returned by [`RecordCategory::lookup`].
pub trait SyncedRecord: fmt::Debug {
    /// Applies a change. `kind` may be [`ChangeKind::Deleted`], in which case
    /// `payload` is empty and the record should remove itself.
    fn update(
        &mut self,
        cycle: &CycleContext,
        kind: ChangeKind,
        path: &str,
        payload: &Record,
    ) -> CoreResult<()> {
        let _ = (cycle, kind, path, payload);
        Err(CoreError::capability_missing(Capability::Update))
    }
}
