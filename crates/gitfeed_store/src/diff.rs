//! Path-level diff entries.

/// One path-level difference between two versions.
///
/// `content` holds the bytes at the new version; it is `None` for deletions
/// and for entries whose content could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Path at the old version, if the path existed there.
    pub old_path: Option<String>,
    /// Path at the new version, if the path exists there.
    pub new_path: Option<String>,
    /// The path did not exist at the old version.
    pub added: bool,
    /// The path does not exist at the new version.
    pub deleted: bool,
    /// Content at the new version.
    pub content: Option<Vec<u8>>,
}

impl DiffEntry {
    /// An entry for a newly added path.
    pub fn added(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            old_path: None,
            new_path: Some(path.into()),
            added: true,
            deleted: false,
            content: Some(content.into()),
        }
    }

    /// An entry for a path modified in place.
    pub fn modified(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        Self {
            old_path: Some(path.clone()),
            new_path: Some(path),
            added: false,
            deleted: false,
            content: Some(content.into()),
        }
    }

    /// An entry for a deleted path.
    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            old_path: Some(path.into()),
            new_path: None,
            added: false,
            deleted: true,
            content: None,
        }
    }

    /// The effective path: the new path if present, else the old one.
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    /// Content at the new version.
    pub fn content_at_new_version(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_path_prefers_new() {
        let mut entry = DiffEntry::modified("foo/1.json", "{}");
        entry.old_path = Some("foo/old.json".into());
        assert_eq!(entry.path(), Some("foo/1.json"));

        let entry = DiffEntry::deleted("foo/2.json");
        assert_eq!(entry.path(), Some("foo/2.json"));
        assert!(entry.content_at_new_version().is_none());
    }
}
