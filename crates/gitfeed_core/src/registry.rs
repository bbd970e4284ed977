//! Name-to-handle resolution for record categories.

use crate::category::{Category, RecordCategory};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registry of consumer category handles, keyed by category name.
///
/// Category names found in record paths and mappings are plain strings; the
/// registry is the only place they turn into something callable.
#[derive(Clone, Default)]
pub struct CategoryRegistry {
    handles: HashMap<Category, Arc<dyn RecordCategory>>,
}

impl CategoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle, returning the one it replaces.
    pub fn register(
        &mut self,
        name: impl Into<Category>,
        handle: Arc<dyn RecordCategory>,
    ) -> Option<Arc<dyn RecordCategory>> {
        self.handles.insert(name.into(), handle)
    }

    /// Removes a handle.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn RecordCategory>> {
        self.handles.remove(name)
    }

    /// Resolves a name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn RecordCategory>> {
        self.handles.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// Returns registered names, sorted.
    pub fn names(&self) -> Vec<Category> {
        let mut names: Vec<Category> = self.handles.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered categories.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Removes every handle.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

impl fmt::Debug for CategoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::SyncedRecord;
    use crate::error::CoreResult;

    struct Empty;

    impl RecordCategory for Empty {
        fn lookup(&self, _id: &str) -> CoreResult<Vec<Box<dyn SyncedRecord>>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = CategoryRegistry::new();
        assert!(registry.register("NsyncTestBar", Arc::new(Empty)).is_none());
        assert!(registry.register("NsyncTestBar", Arc::new(Empty)).is_some());

        assert!(registry.contains("NsyncTestBar"));
        assert!(registry.get("NsyncTestBar").is_some());
        assert!(registry.get("Missing").is_none());
        assert_eq!(registry.len(), 1);

        registry.unregister("NsyncTestBar");
        assert!(registry.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = CategoryRegistry::new();
        registry.register("B", Arc::new(Empty));
        registry.register("A", Arc::new(Empty));
        assert_eq!(registry.names(), vec![Category::from("A"), Category::from("B")]);
    }
}
