//! Opaque version pointers.

use std::fmt;

/// An opaque token naming a point in the store's history.
///
/// Pointers are produced by the store (commit ids for [`crate::GitStore`])
/// and handed back to it verbatim. The engine only compares them by
/// identity; it never parses them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionPointer(String);

impl VersionPointer {
    /// Wraps a store-issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the pointer, returning the raw token.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for VersionPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionPointer {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VersionPointer {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for VersionPointer {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
