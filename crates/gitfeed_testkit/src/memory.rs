//! In-memory record category.

use gitfeed_codec::Record;
use gitfeed_core::{
    naming, Capability, ChangeKind, CoreError, CoreResult, CycleContext, RecordCategory,
    SyncedRecord,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// What a [`MemoryCategory`] did with a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Created a record.
    Add,
    /// Replaced a record's payload.
    Update,
    /// Removed a record.
    Delete,
}

/// One change applied to a [`MemoryCategory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// What happened.
    pub action: Action,
    /// Record id.
    pub id: String,
    /// Change kind as delivered.
    pub kind: ChangeKind,
}

type Hook = Arc<dyn Fn(&CycleContext, &Applied) -> CoreResult<()> + Send + Sync>;

struct Inner {
    name: String,
    records: RwLock<BTreeMap<String, Record>>,
    applied: Mutex<Vec<Applied>>,
    failing: RwLock<HashSet<String>>,
    can_add: bool,
    can_update: bool,
    hook: Option<Hook>,
}

/// A record category backed by a map, for tests.
///
/// Clones share state, so a test can keep one handle and register another.
#[derive(Clone)]
pub struct MemoryCategory {
    inner: Arc<Inner>,
}

impl MemoryCategory {
    /// Creates an empty category that can add and update.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), true, true, None)
    }

    fn build(name: String, can_add: bool, can_update: bool, hook: Option<Hook>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                records: RwLock::new(BTreeMap::new()),
                applied: Mutex::new(Vec::new()),
                failing: RwLock::new(HashSet::new()),
                can_add,
                can_update,
                hook,
            }),
        }
    }

    /// Creates a category that can look records up but not change them.
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::build(name.into(), false, false, None)
    }

    /// Creates a category that can update existing records but not add.
    pub fn without_add(name: impl Into<String>) -> Self {
        Self::build(name.into(), false, true, None)
    }

    /// Creates a category that calls `hook` after every applied change.
    pub fn with_hook<F>(name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&CycleContext, &Applied) -> CoreResult<()> + Send + Sync + 'static,
    {
        Self::build(name.into(), true, true, Some(Arc::new(hook)))
    }

    /// Returns the category name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the handle to register on a configuration.
    pub fn handle(&self) -> Arc<dyn RecordCategory> {
        Arc::new(self.clone())
    }

    /// Inserts a record directly.
    pub fn seed(&self, id: impl Into<String>, record: Record) {
        self.inner.records.write().insert(id.into(), record);
    }

    /// Makes changes to `id` fail.
    pub fn fail_on(&self, id: impl Into<String>) {
        self.inner.failing.write().insert(id.into());
    }

    /// Stops failing changes to `id`.
    pub fn heal(&self, id: &str) {
        self.inner.failing.write().remove(id);
    }

    /// Returns a record.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.inner.records.read().get(id).cloned()
    }

    /// Returns record ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.inner.records.read().keys().cloned().collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.inner.records.read().is_empty()
    }

    /// Returns every applied change, in order.
    pub fn applied(&self) -> Vec<Applied> {
        self.inner.applied.lock().clone()
    }

    /// Forgets applied changes.
    pub fn clear_applied(&self) {
        self.inner.applied.lock().clear();
    }

    fn check(&self, id: &str) -> CoreResult<()> {
        if self.inner.failing.read().contains(id) {
            return Err(CoreError::handler(format!(
                "{} refused record {id}",
                self.inner.name
            )));
        }
        Ok(())
    }

    fn record_applied(&self, cycle: &CycleContext, applied: Applied) -> CoreResult<()> {
        self.inner.applied.lock().push(applied.clone());
        match &self.inner.hook {
            Some(hook) => hook(cycle, &applied),
            None => Ok(()),
        }
    }
}

impl RecordCategory for MemoryCategory {
    fn lookup(&self, id: &str) -> CoreResult<Vec<Box<dyn SyncedRecord>>> {
        if !self.inner.records.read().contains_key(id) {
            return Ok(Vec::new());
        }
        Ok(vec![Box::new(MemoryRecord {
            id: id.to_string(),
            category: self.clone(),
        })])
    }

    fn add(
        &self,
        cycle: &CycleContext,
        kind: ChangeKind,
        path: &str,
        payload: &Record,
    ) -> CoreResult<()> {
        if !self.inner.can_add {
            return Err(CoreError::capability_missing(Capability::Add));
        }
        let id = naming::category_and_id(path)
            .map(|(_, id)| id)
            .unwrap_or_else(|| path.to_string());
        self.check(&id)?;
        self.inner.records.write().insert(id.clone(), payload.clone());
        self.record_applied(
            cycle,
            Applied {
                action: Action::Add,
                id,
                kind,
            },
        )
    }
}

impl fmt::Debug for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCategory")
            .field("name", &self.inner.name)
            .field("records", &self.len())
            .finish()
    }
}

/// A record returned by [`MemoryCategory::lookup`].
pub struct MemoryRecord {
    id: String,
    category: MemoryCategory,
}

impl fmt::Debug for MemoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category.name(), self.id)
    }
}

impl SyncedRecord for MemoryRecord {
    fn update(
        &mut self,
        cycle: &CycleContext,
        kind: ChangeKind,
        _path: &str,
        payload: &Record,
    ) -> CoreResult<()> {
        if !self.category.inner.can_update {
            return Err(CoreError::capability_missing(Capability::Update));
        }
        self.category.check(&self.id)?;

        let action = if kind == ChangeKind::Deleted {
            self.category.inner.records.write().remove(&self.id);
            Action::Delete
        } else {
            self.category
                .inner
                .records
                .write()
                .insert(self.id.clone(), payload.clone());
            Action::Update
        };
        self.category.record_applied(
            cycle,
            Applied {
                action,
                id: self.id.clone(),
                kind,
            },
        )
    }
}
