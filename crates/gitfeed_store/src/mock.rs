//! Scripted versioned store for testing.

use crate::diff::DiffEntry;
use crate::error::{StoreError, StoreResult};
use crate::pointer::VersionPointer;
use crate::store::{VersionedStore, WalkOrder};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

/// A call made against a [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `diff(from, to)`.
    Diff(VersionPointer, VersionPointer),
    /// `working_diff()`.
    WorkingDiff,
    /// `fetch(remote)`.
    Fetch(String, String),
    /// `reset_soft(target)`.
    ResetSoft(VersionPointer),
    /// `reset_hard(target)`.
    ResetHard(VersionPointer),
    /// `add(path)`.
    Add(String),
    /// `remove(path)`.
    Remove(String),
    /// `commit(message)`.
    Commit(String),
    /// `commit_selected(paths, message)`.
    CommitSelected(Vec<String>, String),
    /// `push(destination, branch)`.
    Push(String, String),
}

#[derive(Debug, Default)]
struct MockState {
    head: Option<VersionPointer>,
    fetched: Option<VersionPointer>,
    diffs: HashMap<(VersionPointer, VersionPointer), Vec<DiffEntry>>,
    working: Vec<DiffEntry>,
    history: Vec<VersionPointer>,
    remotes: Vec<String>,
    calls: Vec<StoreCall>,
    next_commit: u64,
}

/// A store that answers from scripted responses and records every call.
///
/// Unscripted diffs are empty. Commits mint pointers `commit-1`,
/// `commit-2`, ... and move the head.
///
/// # Example
///
/// ```rust
/// use gitfeed_store::{DiffEntry, MockStore, VersionPointer, VersionedStore};
///
/// let store = MockStore::new("v1");
/// store.script_diff("v0", "v1", vec![DiffEntry::added("foo/1.json", "{}")]);
///
/// let entries = store.diff(&"v0".into(), &"v1".into()).unwrap();
/// assert_eq!(entries.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockStore {
    state: Mutex<MockState>,
    workdir: Option<PathBuf>,
}

impl MockStore {
    /// Creates a mock store whose head is `head`.
    pub fn new(head: impl Into<VersionPointer>) -> Self {
        let head = head.into();
        Self {
            state: Mutex::new(MockState {
                history: vec![head.clone()],
                head: Some(head),
                ..MockState::default()
            }),
            workdir: None,
        }
    }

    /// Sets the working tree root reported by [`VersionedStore::workdir`].
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Scripts the entries returned by `diff(from, to)`.
    pub fn script_diff(
        &self,
        from: impl Into<VersionPointer>,
        to: impl Into<VersionPointer>,
        entries: Vec<DiffEntry>,
    ) {
        self.state
            .lock()
            .diffs
            .insert((from.into(), to.into()), entries);
    }

    /// Scripts the entries returned by `working_diff()`.
    pub fn script_working_diff(&self, entries: Vec<DiffEntry>) {
        self.state.lock().working = entries;
    }

    /// Scripts the head returned by the next `fetch`.
    pub fn script_fetch(&self, head: impl Into<VersionPointer>) {
        self.state.lock().fetched = Some(head.into());
    }

    /// Sets the configured remotes.
    pub fn set_remotes(&self, remotes: Vec<String>) {
        self.state.lock().remotes = remotes;
    }

    /// Returns all recorded calls in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    /// Counts recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: StoreCall) {
        self.state.lock().calls.push(call);
    }

    fn mint_commit(&self) -> VersionPointer {
        let mut state = self.state.lock();
        state.next_commit += 1;
        let pointer = VersionPointer::new(format!("commit-{}", state.next_commit));
        state.head = Some(pointer.clone());
        state.history.push(pointer.clone());
        pointer
    }
}

impl VersionedStore for MockStore {
    fn head(&self) -> StoreResult<VersionPointer> {
        self.state
            .lock()
            .head
            .clone()
            .ok_or_else(|| StoreError::Mock("no head".into()))
    }

    fn diff(&self, from: &VersionPointer, to: &VersionPointer) -> StoreResult<Vec<DiffEntry>> {
        self.record(StoreCall::Diff(from.clone(), to.clone()));
        Ok(self
            .state
            .lock()
            .diffs
            .get(&(from.clone(), to.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn working_diff(&self) -> StoreResult<Vec<DiffEntry>> {
        self.record(StoreCall::WorkingDiff);
        Ok(self.state.lock().working.clone())
    }

    fn fetch(&self, remote: &str, branch: &str) -> StoreResult<VersionPointer> {
        self.record(StoreCall::Fetch(remote.to_string(), branch.to_string()));
        let state = self.state.lock();
        state
            .fetched
            .clone()
            .or_else(|| state.head.clone())
            .ok_or_else(|| StoreError::Mock("no fetch response set".into()))
    }

    fn reset_soft(&self, target: &VersionPointer) -> StoreResult<()> {
        self.record(StoreCall::ResetSoft(target.clone()));
        self.state.lock().head = Some(target.clone());
        Ok(())
    }

    fn reset_hard(&self, target: &VersionPointer) -> StoreResult<()> {
        self.record(StoreCall::ResetHard(target.clone()));
        self.state.lock().head = Some(target.clone());
        Ok(())
    }

    fn add(&self, path: &str) -> StoreResult<()> {
        self.record(StoreCall::Add(path.to_string()));
        Ok(())
    }

    fn remove(&self, path: &str) -> StoreResult<()> {
        self.record(StoreCall::Remove(path.to_string()));
        Ok(())
    }

    fn commit(&self, message: &str) -> StoreResult<VersionPointer> {
        self.record(StoreCall::Commit(message.to_string()));
        Ok(self.mint_commit())
    }

    fn commit_selected(&self, paths: &[String], message: &str) -> StoreResult<VersionPointer> {
        self.record(StoreCall::CommitSelected(paths.to_vec(), message.to_string()));
        self.state.lock().working.clear();
        Ok(self.mint_commit())
    }

    fn push(&self, destination: &str, branch: &str) -> StoreResult<()> {
        self.record(StoreCall::Push(destination.to_string(), branch.to_string()));
        Ok(())
    }

    fn list_remotes(&self) -> StoreResult<Vec<String>> {
        Ok(self.state.lock().remotes.clone())
    }

    fn list_commits(
        &self,
        _branch: &str,
        limit: usize,
        offset: usize,
        order: WalkOrder,
    ) -> StoreResult<Vec<VersionPointer>> {
        let state = self.state.lock();
        let mut history = state.history.clone();
        if order == WalkOrder::NewestFirst {
            history.reverse();
        }
        Ok(history.into_iter().skip(offset).take(limit).collect())
    }

    fn workdir(&self) -> Option<PathBuf> {
        self.workdir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_diff_is_empty() {
        let store = MockStore::new("v1");
        let entries = store.diff(&"a".into(), &"b".into()).unwrap();
        assert!(entries.is_empty());
        assert_eq!(
            store.calls(),
            vec![StoreCall::Diff("a".into(), "b".into())]
        );
    }

    #[test]
    fn commits_move_head_and_history() {
        let store = MockStore::new("root");
        let c1 = store.commit("one").unwrap();
        assert_eq!(c1.as_str(), "commit-1");
        assert_eq!(store.head().unwrap(), c1);

        let newest = store
            .list_commits("master", 10, 1, WalkOrder::NewestFirst)
            .unwrap();
        assert_eq!(newest, vec![VersionPointer::new("root")]);
    }

    #[test]
    fn fetch_defaults_to_head() {
        let store = MockStore::new("v3");
        assert_eq!(store.fetch("origin", "master").unwrap().as_str(), "v3");
        store.script_fetch("v4");
        assert_eq!(store.fetch("origin", "master").unwrap().as_str(), "v4");
        assert_eq!(store.count_calls(|c| matches!(c, StoreCall::Fetch(..))), 2);
    }
}
