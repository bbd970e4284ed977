//! Bounds on network operations.

use std::time::Duration;

/// Limits applied at the store boundary to fetch, push and blob reads.
///
/// Exceeding either limit fails the operation with
/// [`crate::StoreError::LimitExceeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkLimits {
    /// Maximum wall-clock time for a fetch or push.
    pub timeout: Duration,
    /// Maximum size in bytes of a single blob, and of a fetch transfer.
    pub max_object_size: u64,
}

impl NetworkLimits {
    /// Creates limits with the given timeout and size ceiling.
    pub const fn new(timeout: Duration, max_object_size: u64) -> Self {
        Self {
            timeout,
            max_object_size,
        }
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the size ceiling.
    #[must_use]
    pub const fn with_max_object_size(mut self, max: u64) -> Self {
        self.max_object_size = max;
        self
    }
}

impl Default for NetworkLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_object_size: 100 * 1024 * 1024, // 100 MiB
        }
    }
}
