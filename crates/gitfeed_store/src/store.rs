//! Versioned store trait definition.

use crate::diff::DiffEntry;
use crate::error::StoreResult;
use crate::pointer::VersionPointer;
use std::path::PathBuf;

/// Order in which [`VersionedStore::list_commits`] walks history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Most recent commit first.
    NewestFirst,
    /// Root commit first.
    OldestFirst,
}

/// A version-controlled store of path-addressed content.
///
/// This is everything the change-feed engine needs from its transport. The
/// store owns the repository; the engine owns the interpretation of paths
/// and contents.
///
/// # Invariants
///
/// - `diff` returns entries in a stable order for a fixed pair of versions
/// - `reset_soft` moves only the ref, `reset_hard` moves the ref and the
///   working tree
/// - `push` force-updates the destination branch to the local one
/// - Implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`crate::GitStore`] - libgit2 repositories
/// - [`crate::MockStore`] - scripted responses for tests
pub trait VersionedStore: Send + Sync {
    /// Returns the pointer the primary ref currently names.
    fn head(&self) -> StoreResult<VersionPointer>;

    /// Computes the ordered path-level difference from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if either pointer does not resolve, or if a blob
    /// exceeds the size ceiling.
    fn diff(&self, from: &VersionPointer, to: &VersionPointer) -> StoreResult<Vec<DiffEntry>>;

    /// Computes the uncommitted working-tree difference against the last
    /// commit: tracked modifications, deletions and untracked new files.
    fn working_diff(&self) -> StoreResult<Vec<DiffEntry>>;

    /// Fetches from the named remote and returns the fetched head of
    /// `branch`.
    fn fetch(&self, remote: &str, branch: &str) -> StoreResult<VersionPointer>;

    /// Moves the primary ref to `target` without touching the working tree.
    fn reset_soft(&self, target: &VersionPointer) -> StoreResult<()>;

    /// Moves the primary ref and the working tree to `target`.
    fn reset_hard(&self, target: &VersionPointer) -> StoreResult<()>;

    /// Stages `path` (relative to the working tree).
    fn add(&self, path: &str) -> StoreResult<()>;

    /// Unstages `path` from the index.
    fn remove(&self, path: &str) -> StoreResult<()>;

    /// Commits the index.
    fn commit(&self, message: &str) -> StoreResult<VersionPointer>;

    /// Stages exactly `paths` (adding present files, removing missing ones)
    /// and commits the index.
    fn commit_selected(&self, paths: &[String], message: &str) -> StoreResult<VersionPointer>;

    /// Force-updates `branch` at `destination` to the local `branch`.
    fn push(&self, destination: &str, branch: &str) -> StoreResult<()>;

    /// Lists configured remote names.
    fn list_remotes(&self) -> StoreResult<Vec<String>>;

    /// Lists commit ids reachable from `branch`.
    fn list_commits(
        &self,
        branch: &str,
        limit: usize,
        offset: usize,
        order: WalkOrder,
    ) -> StoreResult<Vec<VersionPointer>>;

    /// Returns the working tree root, if the store has one.
    fn workdir(&self) -> Option<PathBuf>;
}
