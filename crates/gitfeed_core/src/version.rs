//! Version pointer persistence.
//!
//! A consumer remembers the last version it fully applied. The next cycle
//! diffs from that pointer, so it only moves once every change and deferred
//! task has succeeded. A crash before the move replays the same diff.
//!
//! Managers must tolerate being asked to persist the pointer they already
//! hold.

use crate::error::{CoreError, CoreResult};
use gitfeed_store::{VersionPointer, VersionedStore, WalkOrder, PRIMARY_BRANCH};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Persists the consumer's version pointer.
pub trait VersionManager: Send + Sync {
    /// Returns the last fully applied version.
    fn version(&self) -> CoreResult<VersionPointer>;

    /// Returns the version before [`VersionManager::version`].
    fn previous_version(&self) -> CoreResult<VersionPointer>;

    /// Records `pointer` as fully applied.
    fn set_version(&self, pointer: &VersionPointer) -> CoreResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct VersionState {
    current: Option<String>,
    previous: Option<String>,
}

impl VersionState {
    fn advance(&mut self, pointer: &VersionPointer) -> bool {
        if self.current.as_deref() == Some(pointer.as_str()) {
            return false;
        }
        self.previous = self.current.replace(pointer.as_str().to_string());
        true
    }

    fn current(&self) -> CoreResult<VersionPointer> {
        self.current
            .as_deref()
            .map(VersionPointer::from)
            .ok_or(CoreError::NoVersion { which: "current" })
    }

    fn previous(&self) -> CoreResult<VersionPointer> {
        self.previous
            .as_deref()
            .map(VersionPointer::from)
            .ok_or(CoreError::NoVersion { which: "previous" })
    }
}

/// Keeps the pointer in memory. Setting a new pointer shifts the current one
/// into `previous`.
#[derive(Debug, Default)]
pub struct MemoryVersionManager {
    state: RwLock<VersionState>,
}

impl MemoryVersionManager {
    /// Creates a manager with no recorded version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose current version is `pointer`.
    pub fn starting_at(pointer: impl Into<VersionPointer>) -> Self {
        let pointer: VersionPointer = pointer.into();
        Self {
            state: RwLock::new(VersionState {
                current: Some(pointer.into_string()),
                previous: None,
            }),
        }
    }
}

impl VersionManager for MemoryVersionManager {
    fn version(&self) -> CoreResult<VersionPointer> {
        self.state.read().current()
    }

    fn previous_version(&self) -> CoreResult<VersionPointer> {
        self.state.read().previous()
    }

    fn set_version(&self, pointer: &VersionPointer) -> CoreResult<()> {
        self.state.write().advance(pointer);
        Ok(())
    }
}

/// Keeps the pointer in a JSON file, replaced atomically on every update.
#[derive(Debug)]
pub struct FileVersionManager {
    path: PathBuf,
    state: RwLock<VersionState>,
}

impl FileVersionManager {
    /// Opens the state file at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let data = fs::read(&path)?;
            if data.is_empty() {
                VersionState::default()
            } else {
                serde_json::from_slice(&data).map_err(|e| {
                    CoreError::invalid_config(format!(
                        "corrupt version file {}: {e}",
                        path.display()
                    ))
                })?
            }
        } else {
            VersionState::default()
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Returns the state file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &VersionState) -> CoreResult<()> {
        let data = serde_json::to_vec_pretty(state)
            .map_err(|e| CoreError::invalid_config(e.to_string()))?;
        let temp = self.path.with_extension("tmp");

        let mut file = File::create(&temp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &self.path)?;
        sync_parent(&self.path)
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> CoreResult<()> {
    Ok(())
}

impl VersionManager for FileVersionManager {
    fn version(&self) -> CoreResult<VersionPointer> {
        self.state.read().current()
    }

    fn previous_version(&self) -> CoreResult<VersionPointer> {
        self.state.read().previous()
    }

    fn set_version(&self, pointer: &VersionPointer) -> CoreResult<()> {
        let mut state = self.state.write();
        let mut next = state.clone();
        if !next.advance(pointer) {
            return Ok(());
        }
        self.persist(&next)?;
        *state = next;
        Ok(())
    }
}

/// Reads versions straight from a producer's store: the current version is
/// the head and the previous one is its predecessor on the primary branch.
///
/// Setting a version is a no-op; the store head already moved.
pub struct StoreVersionManager {
    store: Arc<dyn VersionedStore>,
    branch: String,
}

impl StoreVersionManager {
    /// Creates a manager over `store`'s primary branch.
    pub fn new(store: Arc<dyn VersionedStore>) -> Self {
        Self {
            store,
            branch: PRIMARY_BRANCH.to_string(),
        }
    }

    /// Uses a different branch for the previous version.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }
}

impl std::fmt::Debug for StoreVersionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreVersionManager")
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl VersionManager for StoreVersionManager {
    fn version(&self) -> CoreResult<VersionPointer> {
        Ok(self.store.head()?)
    }

    fn previous_version(&self) -> CoreResult<VersionPointer> {
        self.store
            .list_commits(&self.branch, 1, 1, WalkOrder::NewestFirst)?
            .into_iter()
            .next()
            .ok_or(CoreError::NoVersion { which: "previous" })
    }

    fn set_version(&self, pointer: &VersionPointer) -> CoreResult<()> {
        debug!(version = %pointer, "store head is the version; nothing to record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitfeed_store::MockStore;
    use tempfile::tempdir;

    #[test]
    fn memory_manager_shifts_previous() {
        let manager = MemoryVersionManager::new();
        assert!(matches!(
            manager.version().unwrap_err(),
            CoreError::NoVersion { which: "current" }
        ));

        manager.set_version(&"v0".into()).unwrap();
        manager.set_version(&"v1".into()).unwrap();
        assert_eq!(manager.version().unwrap().as_str(), "v1");
        assert_eq!(manager.previous_version().unwrap().as_str(), "v0");
    }

    #[test]
    fn resetting_the_same_pointer_keeps_previous() {
        let manager = MemoryVersionManager::starting_at("v0");
        manager.set_version(&"v1".into()).unwrap();
        manager.set_version(&"v1".into()).unwrap();
        assert_eq!(manager.previous_version().unwrap().as_str(), "v0");
    }

    #[test]
    fn file_manager_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("version.json");

        let manager = FileVersionManager::open(&path).unwrap();
        manager.set_version(&"abc".into()).unwrap();
        manager.set_version(&"def".into()).unwrap();
        drop(manager);

        let reopened = FileVersionManager::open(&path).unwrap();
        assert_eq!(reopened.version().unwrap().as_str(), "def");
        assert_eq!(reopened.previous_version().unwrap().as_str(), "abc");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("version.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            FileVersionManager::open(&path).unwrap_err(),
            CoreError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn store_manager_reads_head_and_predecessor() {
        let store = Arc::new(MockStore::new("c0"));
        store.commit("one").unwrap();
        let manager = StoreVersionManager::new(store.clone());

        assert_eq!(manager.version().unwrap().as_str(), "commit-1");
        assert_eq!(manager.previous_version().unwrap().as_str(), "c0");

        manager.set_version(&"anything".into()).unwrap();
        assert_eq!(manager.version().unwrap().as_str(), "commit-1");
    }
}
