//! Error types for gitfeed core.

use crate::category::Capability;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in gitfeed core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Versioned store error.
    #[error("store error: {0}")]
    Store(#[from] gitfeed_store::StoreError),

    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] gitfeed_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The named lock is held by another cycle.
    #[error("lock unavailable: {path} is held by another process or thread")]
    LockUnavailable {
        /// Path of the lock file.
        path: String,
    },

    /// No version manager has been configured.
    #[error("no version manager configured")]
    VersionManagerUnconfigured,

    /// The version manager has no pointer to hand out yet.
    #[error("no {which} version recorded")]
    NoVersion {
        /// Which pointer was requested ("current" or "previous").
        which: &'static str,
    },

    /// A category name has no registered handle.
    #[error("category not registered: {name}")]
    CategoryUnresolved {
        /// The unresolved name.
        name: String,
    },

    /// A record category does not provide a capability.
    #[error("{capability} capability not provided")]
    CapabilityMissing {
        /// The missing capability.
        capability: Capability,
    },

    /// A record handler reported a failure.
    #[error("handler failed: {message}")]
    Handler {
        /// Description of the failure.
        message: String,
    },

    /// A deferred task was scheduled for the current category outside of
    /// category application.
    #[error("no category is being applied")]
    NoCurrentCategory,

    /// Write-back was attempted without an active producer.
    #[error("no active producer")]
    NoActiveProducer,

    /// Configuration is invalid or could not be loaded.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a handler failure. Record categories use this to abort a
    /// cycle.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a missing capability error.
    pub fn capability_missing(capability: Capability) -> Self {
        Self::CapabilityMissing { capability }
    }

    /// Returns true if this error must abort the enclosing cycle.
    ///
    /// Lock contention, unresolved categories and missing capabilities are
    /// logged and skipped; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CoreError::LockUnavailable { .. }
                | CoreError::CategoryUnresolved { .. }
                | CoreError::CapabilityMissing { .. }
        )
    }
}
