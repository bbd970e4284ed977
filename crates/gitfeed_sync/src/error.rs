//! Error types for the sync engines.

use gitfeed_core::{ChangeKind, CoreError};
use gitfeed_store::{LimitKind, StoreError};
use std::path::Path;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Another cycle holds the repository lock.
    #[error("lock unavailable: {path} is held by another cycle")]
    LockUnavailable {
        /// Path of the lock file.
        path: String,
    },

    /// The repository could not be cloned, initialized or opened.
    #[error("failed to initialize repository at {path}: {source}")]
    RepoInit {
        /// Repository path.
        path: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// A record handler failed; the cycle was aborted.
    #[error("failed to apply {kind} {path} to {category}: {source}")]
    ApplyFailed {
        /// Consumer category.
        category: String,
        /// Record file path.
        path: String,
        /// Change kind.
        kind: ChangeKind,
        /// Handler error.
        #[source]
        source: CoreError,
    },

    /// A deferred task failed; the cycle was aborted.
    #[error("deferred task failed after {scope}: {source}")]
    CallbackFailed {
        /// Category the task was deferred on, or `cycle` for end-of-cycle
        /// tasks.
        scope: String,
        /// Task error.
        #[source]
        source: CoreError,
    },

    /// The branch has no commits to start from.
    #[error("no commits on branch {branch}")]
    EmptyHistory {
        /// Branch name.
        branch: String,
    },

    /// A commit selector could not be parsed.
    #[error("invalid commit selector: {0}")]
    InvalidSelector(String),

    /// A cycle was started while another one is running on this engine.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Versioned store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Core error.
    #[error("core error: {0}")]
    Core(CoreError),
}

impl From<CoreError> for SyncError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::LockUnavailable { path } => SyncError::LockUnavailable { path },
            CoreError::Store(source) => SyncError::Store(source),
            other => SyncError::Core(other),
        }
    }
}

impl SyncError {
    /// Creates a repository initialization error.
    pub fn repo_init(path: &Path, source: StoreError) -> Self {
        Self::RepoInit {
            path: path.display().to_string(),
            source,
        }
    }

    /// Returns true if trying the operation again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::LockUnavailable { .. }
                | SyncError::Store(StoreError::LimitExceeded {
                    kind: LimitKind::Timeout(_),
                    ..
                })
        )
    }

    /// Returns true if the error means the lock was held elsewhere.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, SyncError::LockUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::LockUnavailable { path: "x".into() }.is_retryable());
        assert!(SyncError::Store(StoreError::LimitExceeded {
            operation: "fetch",
            kind: LimitKind::Timeout(Duration::from_secs(1)),
        })
        .is_retryable());
        assert!(!SyncError::Store(StoreError::LimitExceeded {
            operation: "diff",
            kind: LimitKind::ObjectSize(10),
        })
        .is_retryable());
        assert!(!SyncError::InvalidSelector("x".into()).is_retryable());
    }

    #[test]
    fn core_errors_are_lifted() {
        let err = SyncError::from(CoreError::LockUnavailable { path: "a.lock".into() });
        assert!(err.is_lock_contention());

        let err = SyncError::from(CoreError::VersionManagerUnconfigured);
        assert!(matches!(err, SyncError::Core(CoreError::VersionManagerUnconfigured)));
    }
}
