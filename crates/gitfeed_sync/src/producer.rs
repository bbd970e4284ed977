//! The producer engine.
//!
//! A producer owns the working tree of the feed repository. Application
//! records are written as files (directly or through write-back), committed
//! and pushed. Categories with no mapping fall back to themselves, so a
//! producer can replay its own history on rollback.

use crate::consumer::Consumer;
use crate::error::{SyncError, SyncResult};
use crate::selector::CommitSelector;
use crate::state::{CycleReport, CycleState, CycleStats};
use gitfeed_core::naming::IGNORE_FILE;
use gitfeed_core::{
    ChangeSet, Config, CoreResult, CycleContext, FileContent, RecordWriter, Resolution,
    WorkingTree,
};
use gitfeed_store::{GitStore, VersionPointer, VersionedStore, WalkOrder};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Commit message of the bootstrap commit.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial Commit";

/// Default commit message.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Friendly data update";

/// Writes, commits and pushes record files.
pub struct Producer {
    engine: Consumer,
    files: Arc<WorkingTree>,
}

impl Producer {
    /// Opens the producer repository, initializing it on first use.
    ///
    /// A new repository gets an empty ignore file and an initial commit.
    pub fn open(config: Arc<Config>) -> SyncResult<Self> {
        let path = config.repo_path().to_path_buf();
        let limits = config.limits();

        if path.exists() {
            let store = GitStore::open(&path, limits).map_err(|e| SyncError::repo_init(&path, e))?;
            return Ok(Self::with_store(config, Arc::new(store)));
        }

        let store = config.lock(|| -> SyncResult<GitStore> {
            info!(path = %path.display(), "initializing feed repository");
            GitStore::init(&path, config.branch(), limits)
                .map_err(|e| SyncError::repo_init(&path, e))
        })?;
        let producer = Self::with_store(config, Arc::new(store));

        producer
            .config()
            .lock(|| producer.write_file(IGNORE_FILE, "", true))?;
        producer.commit(INITIAL_COMMIT_MESSAGE, &CommitSelector::All)?;
        Ok(producer)
    }

    /// Creates a producer over an already opened store and registers it as
    /// the configuration's write-back target.
    pub fn with_store(config: Arc<Config>, store: Arc<dyn VersionedStore>) -> Self {
        let root = store
            .workdir()
            .unwrap_or_else(|| config.repo_path().to_path_buf());
        let files = Arc::new(WorkingTree::new(root, config.format(), Arc::clone(&store)));
        let writer: Weak<WorkingTree> = Arc::downgrade(&files);
        config.set_producer(writer);

        Self {
            engine: Consumer::assemble(config, store, Resolution::MappedOrSelf),
            files,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Arc<Config> {
        self.engine.config()
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<dyn VersionedStore> {
        self.engine.store()
    }

    /// Gets the current state.
    pub fn state(&self) -> CycleState {
        self.engine.state()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> CycleStats {
        self.engine.stats()
    }

    /// Returns the deferred-task context handed to record handlers during
    /// rollback.
    pub fn cycle(&self) -> &CycleContext {
        self.engine.cycle()
    }

    /// Defers `task` until `category` has finished applying.
    pub fn after_class_finished<F>(&self, category: impl Into<gitfeed_core::Category>, task: F)
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.engine.after_class_finished(category, task);
    }

    /// Defers `task` until the category being applied has finished.
    pub fn after_current_class_finished<F>(&self, task: F) -> SyncResult<()>
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.engine.after_current_class_finished(task)
    }

    /// Defers `task` until the rollback has applied every category.
    pub fn after_finished<F>(&self, task: F)
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.engine.after_finished(task);
    }

    /// Returns true if `name` exists in the working tree.
    pub fn file_exists(&self, name: &str) -> bool {
        self.files.file_exists(name)
    }

    /// Writes a file into the working tree, staging it if `add` is set.
    pub fn write_file(
        &self,
        name: &str,
        content: impl Into<FileContent>,
        add: bool,
    ) -> SyncResult<()> {
        Ok(self.files.write_file(name, content.into(), add)?)
    }

    /// Removes a file from the working tree. The deletion is picked up by
    /// the next commit.
    pub fn remove_file(&self, name: &str) -> SyncResult<()> {
        Ok(self.files.remove_file(name)?)
    }

    /// Classifies uncommitted working-tree changes, untracked files
    /// included.
    pub fn latest_changes(&self) -> SyncResult<ChangeSet> {
        let entries = self.store().working_diff()?;
        Ok(self.engine.classify(&entries))
    }

    /// Classifies the changes between two committed versions.
    pub fn changes_between(
        &self,
        from: &VersionPointer,
        to: &VersionPointer,
    ) -> SyncResult<ChangeSet> {
        self.engine.changes_between(from, to)
    }

    /// Commits the selected pending changes and pushes.
    pub fn commit(&self, message: &str, selector: &CommitSelector) -> SyncResult<VersionPointer> {
        self.engine.guarded(CycleState::Committing, || {
            let changes = self.latest_changes()?;
            let paths = selector.select(&changes);
            let pointer = self.store().commit_selected(&paths, message)?;
            info!(version = %pointer, files = paths.len(), message, "committed");
            self.push_locked()?;
            Ok(pointer)
        })
    }

    /// Force-pushes the branch to the push URL. Returns false if no push
    /// URL is configured.
    pub fn push(&self) -> SyncResult<bool> {
        self.engine.guarded(CycleState::Pushing, || self.push_locked())
    }

    fn push_locked(&self) -> SyncResult<bool> {
        let Some(url) = self.config().repo_push_url() else {
            debug!("no push url configured, not pushing");
            return Ok(false);
        };
        self.engine.set_state(CycleState::Pushing);
        self.store().push(url, self.config().branch())?;
        info!(url, branch = self.config().branch(), "pushed");
        Ok(true)
    }

    /// Undoes the last commit.
    ///
    /// Hard-resets the working tree to the previous version, applies the
    /// diff from the current version back to it to the producer's own
    /// categories, then force-pushes.
    pub fn rollback(&self) -> SyncResult<CycleReport> {
        let manager = self.config().version_manager()?;
        let current = manager.version()?;
        let previous = manager.previous_version()?;
        info!(from = %current, to = %previous, "rolling back");

        self.engine.guarded(CycleState::Diffing, || {
            self.store().reset_hard(&previous)?;
            let report = self.engine.run_cycle(&current, &previous)?;
            self.push_locked()?;
            Ok(report)
        })
    }

    /// Lists the most recent commits on the branch, newest first.
    pub fn history(&self, limit: usize) -> SyncResult<Vec<VersionPointer>> {
        Ok(self
            .store()
            .list_commits(self.config().branch(), limit, 0, WalkOrder::NewestFirst)?)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("files", &self.files)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
