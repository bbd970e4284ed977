//! Error types for store operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Which network limit was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// The operation ran longer than the configured timeout.
    Timeout(Duration),
    /// An object or transfer exceeded the configured size ceiling.
    ObjectSize(u64),
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The underlying git library reported an error.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// No repository exists at the given path.
    #[error("no repository at {path}")]
    NoSuchRepository {
        /// The path that was opened.
        path: String,
    },

    /// A version pointer did not name anything in history.
    #[error("unknown version: {pointer}")]
    UnknownVersion {
        /// The unresolved pointer.
        pointer: String,
    },

    /// A working-tree operation was requested on a bare repository.
    #[error("repository has no working tree")]
    NoWorkingTree,

    /// A network or object-size limit was exceeded.
    #[error("{kind} exceeded during {operation}")]
    LimitExceeded {
        /// The operation that was cut short.
        operation: &'static str,
        /// The limit that tripped.
        kind: LimitKind,
    },

    /// A scripted store had no response for a call.
    #[error("mock store: {0}")]
    Mock(String),
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKind::Timeout(d) => write!(f, "timeout of {}s", d.as_secs_f64()),
            LimitKind::ObjectSize(max) => write!(f, "object size ceiling of {max} bytes"),
        }
    }
}

impl StoreError {
    /// Creates an unknown version error.
    pub fn unknown_version(pointer: impl Into<String>) -> Self {
        Self::UnknownVersion {
            pointer: pointer.into(),
        }
    }

    /// Returns true if this error was caused by a network limit.
    pub fn is_limit(&self) -> bool {
        matches!(self, StoreError::LimitExceeded { .. })
    }
}
