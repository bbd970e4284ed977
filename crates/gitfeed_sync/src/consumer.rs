//! The consumer engine.
//!
//! A consumer diffs the store between the version it last applied and a
//! target version, classifies the diff by category and hands every change
//! to the registered [`RecordCategory`]. The version pointer only moves once
//! the whole cycle, deferred tasks included, has succeeded; a failed or
//! interrupted cycle replays the same diff next time.

use crate::error::{SyncError, SyncResult};
use crate::state::{CycleReport, CycleState, CycleStats};
use gitfeed_core::{
    classify, Category, Change, ChangeKind, ChangeSet, Config, CoreError, CoreResult,
    CycleContext, RecordCategory, Resolution,
};
use gitfeed_store::{DiffEntry, GitStore, VersionPointer, VersionedStore, WalkOrder};
use parking_lot::RwLock;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Applies changes from a versioned store to local record categories.
pub struct Consumer {
    config: Arc<Config>,
    store: Arc<dyn VersionedStore>,
    resolution: Resolution,
    cycle: CycleContext,
    state: RwLock<CycleState>,
    stats: RwLock<CycleStats>,
}

impl Consumer {
    /// Opens the consumer's repository, cloning it on first use.
    ///
    /// A local configuration opens `repo_path` directly. A remote one clones
    /// `repo_url` bare into `repo_path` under the lock and records the
    /// oldest commit on the branch as the current version, so the first
    /// update replays the whole history.
    pub fn open(config: Arc<Config>) -> SyncResult<Self> {
        let path = config.repo_path().to_path_buf();
        let limits = config.limits();

        let clone_from = config
            .repo_url()
            .filter(|_| !path.exists())
            .map(str::to_string);
        let Some(url) = clone_from else {
            let store = GitStore::open(&path, limits).map_err(|e| SyncError::repo_init(&path, e))?;
            return Ok(Self::with_store(config, Arc::new(store)));
        };

        let manager = config.version_manager()?;
        let store = config.lock(|| -> SyncResult<GitStore> {
            info!(url = %url, path = %path.display(), "cloning feed repository");
            let store = GitStore::clone_bare(&url, &path, config.branch(), limits)
                .map_err(|e| SyncError::repo_init(&path, e))?;
            let first = store
                .list_commits(config.branch(), 1, 0, WalkOrder::OldestFirst)?
                .into_iter()
                .next()
                .ok_or_else(|| SyncError::EmptyHistory {
                    branch: config.branch().to_string(),
                })?;
            manager.set_version(&first)?;
            debug!(version = %first, "starting from the first commit");
            Ok(store)
        })?;

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Creates a consumer over an already opened store.
    pub fn with_store(config: Arc<Config>, store: Arc<dyn VersionedStore>) -> Self {
        Self::assemble(config, store, Resolution::Mapped)
    }

    pub(crate) fn assemble(
        config: Arc<Config>,
        store: Arc<dyn VersionedStore>,
        resolution: Resolution,
    ) -> Self {
        Self {
            config,
            store,
            resolution,
            cycle: CycleContext::new(),
            state: RwLock::new(CycleState::Idle),
            stats: RwLock::new(CycleStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<dyn VersionedStore> {
        &self.store
    }

    /// Gets the current state.
    pub fn state(&self) -> CycleState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> CycleStats {
        self.stats.read().clone()
    }

    /// Returns the deferred-task context handed to record handlers.
    pub fn cycle(&self) -> &CycleContext {
        &self.cycle
    }

    /// Defers `task` until `category` has finished applying in the current
    /// cycle.
    pub fn after_class_finished<F>(&self, category: impl Into<Category>, task: F)
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.cycle.after_class_finished(category, task);
    }

    /// Defers `task` until the category being applied has finished.
    pub fn after_current_class_finished<F>(&self, task: F) -> SyncResult<()>
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        Ok(self.cycle.after_current_class_finished(task)?)
    }

    /// Defers `task` until the current cycle has applied every category.
    pub fn after_finished<F>(&self, task: F)
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.cycle.after_finished(task);
    }

    /// Returns the last fully applied version.
    pub fn version(&self) -> SyncResult<VersionPointer> {
        Ok(self.config.version_manager()?.version()?)
    }

    /// Brings local records up to date.
    ///
    /// With a remote configured, fetches and moves the local head to the
    /// fetched head first. Then applies everything between the current
    /// version and the head.
    pub fn update(&self) -> SyncResult<CycleReport> {
        let manager = self.config.version_manager()?;
        let target = if self.config.remote() {
            self.update_repo()?
        } else {
            self.store.head()?
        };
        let current = manager.version()?;
        self.apply_changes(&current, &target)
    }

    /// Fetches the configured branch and moves the local head to it
    /// without touching records. Returns the new head.
    fn update_repo(&self) -> SyncResult<VersionPointer> {
        self.guarded(CycleState::Fetching, || {
            let remote = self.config.remote_name();
            let head = self.store.fetch(remote, self.config.branch())?;
            self.store.reset_soft(&head)?;
            info!(remote, head = %head, "moved local head to the fetched head");
            Ok(head)
        })
    }

    /// Applies the inverse of the last cycle: the diff from the current
    /// version back to the previous one.
    pub fn rollback(&self) -> SyncResult<CycleReport> {
        let manager = self.config.version_manager()?;
        let current = manager.version()?;
        let previous = manager.previous_version()?;
        info!(from = %current, to = %previous, "rolling back");
        self.apply_changes(&current, &previous)
    }

    /// Applies every change between `from` and `to` under the lock.
    pub fn apply_changes(
        &self,
        from: &VersionPointer,
        to: &VersionPointer,
    ) -> SyncResult<CycleReport> {
        self.guarded(CycleState::Diffing, || self.run_cycle(from, to))
    }

    /// Applies one category's changes, then runs the tasks deferred for it.
    ///
    /// Neither takes the lock nor moves the version pointer; the returned
    /// report has the current version at both ends.
    pub fn apply_changes_for_category(
        &self,
        category: &Category,
        changes: &[Change],
    ) -> SyncResult<CycleReport> {
        let start = Instant::now();
        let version = self.version()?;
        let mut report = CycleReport::new(version.clone(), version);
        self.apply_category(category, changes, &mut report)?;
        report.duration = start.elapsed();
        Ok(report)
    }

    /// Classifies the changes between two versions without applying them.
    pub fn changes_between(
        &self,
        from: &VersionPointer,
        to: &VersionPointer,
    ) -> SyncResult<ChangeSet> {
        let entries = self.store.diff(from, to)?;
        Ok(self.classify(&entries))
    }

    /// Classifies diff entries with this engine's resolution.
    pub fn classify(&self, entries: &[DiffEntry]) -> ChangeSet {
        classify(
            entries,
            self.config.format(),
            &self.config.resolver(self.resolution),
        )
    }

    /// Returns the order categories of `changes` are applied in.
    ///
    /// Categories named in the configured ordering come first, in that
    /// order; ordering names with no registered handle are logged and
    /// skipped, and names with no changes are passed over. Remaining
    /// categories follow in first-seen order.
    pub fn processing_order(&self, changes: &ChangeSet) -> Vec<Category> {
        let mut order: Vec<Category> = Vec::with_capacity(changes.len());

        if let Some(ordering) = self.config.ordering() {
            for category in ordering {
                if self.config.category(category.as_str()).is_none() {
                    warn!(category = %category, "could not find category from ordering, skipping");
                    continue;
                }
                if changes.contains(category.as_str()) && !order.contains(&category) {
                    order.push(category);
                }
            }
        }

        for category in changes.categories() {
            if !order.contains(category) {
                order.push(category.clone());
            }
        }
        order
    }

    pub(crate) fn set_state(&self, state: CycleState) {
        *self.state.write() = state;
    }

    /// Runs `section` under the repository lock, tracking state and stats.
    pub(crate) fn guarded<T>(
        &self,
        active: CycleState,
        section: impl FnOnce() -> SyncResult<T>,
    ) -> SyncResult<T> {
        let current = self.state();
        if !current.can_start_cycle() {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{current:?}"),
                to: format!("{active:?}"),
            });
        }

        self.set_state(CycleState::Locking);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.config.lock(|| {
                self.set_state(active);
                section()
            })
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                self.handle_panic();
                panic::resume_unwind(payload);
            }
        };

        match &result {
            Ok(_) => self.set_state(CycleState::Idle),
            Err(e) => self.handle_error(e),
        }
        result
    }

    fn handle_error(&self, error: &SyncError) {
        let mut stats = self.stats.write();
        if error.is_lock_contention() {
            self.set_state(CycleState::LockFailed);
            stats.lock_failures += 1;
        } else {
            error!(error = %error, "cycle aborted");
            self.set_state(CycleState::Aborted);
            stats.cycles_aborted += 1;
        }
        stats.last_error = Some(error.to_string());
    }

    /// Records a cycle that unwound. The lock guard has already been
    /// dropped, so the next cycle can start from `Aborted`.
    fn handle_panic(&self) {
        self.cycle.clear();
        error!("cycle panicked");
        self.set_state(CycleState::Aborted);
        let mut stats = self.stats.write();
        stats.cycles_aborted += 1;
        stats.last_error = Some("cycle panicked".to_string());
    }

    /// Applies `from..to`. The caller holds the lock.
    pub(crate) fn run_cycle(
        &self,
        from: &VersionPointer,
        to: &VersionPointer,
    ) -> SyncResult<CycleReport> {
        let start = Instant::now();
        self.cycle.clear();
        let result = self.apply_between(from, to, start);
        self.cycle.clear();

        if let Ok(report) = &result {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.changes_applied += report.changes_applied as u64;
            stats.changes_skipped += report.changes_skipped as u64;
            stats.callbacks_run += report.callbacks_run as u64;
            stats.last_cycle_time = Some(Instant::now());
            stats.last_error = None;
        }
        result
    }

    fn apply_between(
        &self,
        from: &VersionPointer,
        to: &VersionPointer,
        start: Instant,
    ) -> SyncResult<CycleReport> {
        let manager = self.config.version_manager()?;
        info!(from = %from, to = %to, "applying changes");

        self.set_state(CycleState::Diffing);
        let entries = self.store.diff(from, to)?;

        self.set_state(CycleState::Classifying);
        let changes = self.classify(&entries);
        let order = self.processing_order(&changes);
        debug!(
            entries = entries.len(),
            categories = order.len(),
            "classified changes"
        );

        self.set_state(CycleState::Applying);
        let mut report = CycleReport::new(from.clone(), to.clone());
        for category in &order {
            if let Some(list) = changes.get(category.as_str()) {
                self.apply_category(category, list, &mut report)?;
            }
        }

        self.set_state(CycleState::Finalizing);
        report.callbacks_run +=
            self.cycle
                .run_finished()
                .map_err(|source| SyncError::CallbackFailed {
                    scope: "cycle".to_string(),
                    source,
                })?;

        manager.set_version(to)?;
        report.duration = start.elapsed();
        info!(
            version = %to,
            applied = report.changes_applied,
            skipped = report.changes_skipped,
            "changes applied"
        );
        Ok(report)
    }

    fn apply_category(
        &self,
        category: &Category,
        changes: &[Change],
        report: &mut CycleReport,
    ) -> SyncResult<()> {
        let Some(handle) = self.config.category(category.as_str()) else {
            warn!(
                category = %category,
                changes = changes.len(),
                "category is not registered, skipping"
            );
            report.changes_skipped += changes.len();
            return Ok(());
        };

        self.cycle.begin_category(category);
        for change in changes {
            self.apply_change(category, handle.as_ref(), change, report)?;
        }
        self.cycle.end_category();

        report.callbacks_run +=
            self.cycle
                .run_category(category)
                .map_err(|source| SyncError::CallbackFailed {
                    scope: category.to_string(),
                    source,
                })?;
        report.categories.push(category.clone());
        Ok(())
    }

    fn apply_change(
        &self,
        category: &Category,
        handle: &dyn RecordCategory,
        change: &Change,
        report: &mut CycleReport,
    ) -> SyncResult<()> {
        let failed = |source: CoreError| SyncError::ApplyFailed {
            category: category.to_string(),
            path: change.path.clone(),
            kind: change.kind,
            source,
        };

        let records = handle.lookup(&change.id).map_err(failed)?;

        if records.is_empty() {
            if change.kind == ChangeKind::Deleted {
                debug!(category = %category, id = %change.id, "nothing to delete");
                return Ok(());
            }
            info!(category = %category, path = %change.path, "adding record");
            let outcome = handle.add(&self.cycle, change.kind, &change.path, &change.payload);
            return tally(outcome, category, report).map_err(failed);
        }

        for mut record in records {
            info!(
                category = %category,
                path = %change.path,
                kind = %change.kind,
                record = ?record,
                "updating record"
            );
            let outcome = record.update(&self.cycle, change.kind, &change.path, &change.payload);
            tally(outcome, category, report).map_err(failed)?;
        }
        Ok(())
    }
}

/// Counts a handler outcome. A missing capability is logged and skipped.
fn tally(outcome: CoreResult<()>, category: &Category, report: &mut CycleReport) -> CoreResult<()> {
    match outcome {
        Ok(()) => {
            report.changes_applied += 1;
            Ok(())
        }
        Err(CoreError::CapabilityMissing { capability }) => {
            warn!(category = %category, %capability, "category cannot apply change, skipping");
            report.changes_skipped += 1;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("config", &self.config)
            .field("resolution", &self.resolution)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
