//! Cycle state machine, statistics and reports.

use gitfeed_core::Category;
use gitfeed_store::VersionPointer;
use std::time::{Duration, Instant};

/// The current state of an engine.
///
/// ```text
/// Idle -> Locking -> Diffing -> Classifying -> Applying -> Finalizing -> Idle
///            |                                    |
///            v                                    v
///        LockFailed                            Aborted
/// ```
///
/// Producers also pass through `Committing` and `Pushing`, and consumers
/// through `Fetching` while updating from a remote. `LockFailed` and
/// `Aborted` are resting states; the next cycle starts from them as it
/// would from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    /// No cycle is running.
    #[default]
    Idle,
    /// Acquiring the repository lock.
    Locking,
    /// Fetching from the remote and moving the local head.
    Fetching,
    /// Computing the diff between two versions.
    Diffing,
    /// Classifying diff entries into categories.
    Classifying,
    /// Applying changes category by category.
    Applying,
    /// Running end-of-cycle tasks and recording the new version.
    Finalizing,
    /// Committing the working tree.
    Committing,
    /// Pushing to the remote.
    Pushing,
    /// The last cycle was skipped because the lock was held.
    LockFailed,
    /// The last cycle failed and did not record a new version.
    Aborted,
}

impl CycleState {
    /// Returns true if a cycle is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            CycleState::Idle | CycleState::LockFailed | CycleState::Aborted
        )
    }

    /// Returns true if a new cycle can start.
    pub fn can_start_cycle(&self) -> bool {
        !self.is_active()
    }
}

/// Cumulative engine statistics.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// Cycles that recorded a new version.
    pub cycles_completed: u64,
    /// Cycles that failed.
    pub cycles_aborted: u64,
    /// Cycles skipped because the lock was held.
    pub lock_failures: u64,
    /// Changes handed to a record handler successfully.
    pub changes_applied: u64,
    /// Changes skipped for a missing capability or category.
    pub changes_skipped: u64,
    /// Deferred tasks run.
    pub callbacks_run: u64,
    /// When the last cycle completed.
    pub last_cycle_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Outcome of one apply cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Version the diff started from.
    pub from: VersionPointer,
    /// Version the diff ended at, now recorded as applied.
    pub to: VersionPointer,
    /// Categories applied, in processing order.
    pub categories: Vec<Category>,
    /// Changes handed to a record handler successfully.
    pub changes_applied: usize,
    /// Changes skipped for a missing capability or category.
    pub changes_skipped: usize,
    /// Deferred tasks run.
    pub callbacks_run: usize,
    /// Wall-clock time of the cycle.
    pub duration: Duration,
}

impl CycleReport {
    pub(crate) fn new(from: VersionPointer, to: VersionPointer) -> Self {
        Self {
            from,
            to,
            categories: Vec::new(),
            changes_applied: 0,
            changes_skipped: 0,
            callbacks_run: 0,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the cycle touched nothing.
    pub fn is_empty(&self) -> bool {
        self.changes_applied == 0 && self.changes_skipped == 0 && self.callbacks_run == 0
    }
}
