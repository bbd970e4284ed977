//! Change classification.
//!
//! A store diff is a flat list of path-level entries. Classification turns
//! it into a [`ChangeSet`]: changes grouped by the consumer category that
//! should apply them, each carrying its decoded payload.
//!
//! Classification is a pure function of the diff, the record format and the
//! category resolver. Entries are visited in diff order and categories keep
//! the order in which they were first seen.

use crate::category::{Category, Change, ChangeKind};
use crate::naming;
use gitfeed_codec::{Record, RecordFormat};
use gitfeed_store::DiffEntry;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Changes grouped by consumer category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<(Category, Vec<Change>)>,
    index: HashMap<Category, usize>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change under `category`.
    pub fn push(&mut self, category: Category, change: Change) {
        match self.index.get(&category) {
            Some(&slot) => self.entries[slot].1.push(change),
            None => {
                self.index.insert(category.clone(), self.entries.len());
                self.entries.push((category, vec![change]));
            }
        }
    }

    /// Returns the changes for a category.
    pub fn get(&self, category: &str) -> Option<&[Change]> {
        self.index
            .get(category)
            .map(|&slot| self.entries[slot].1.as_slice())
    }

    /// Returns true if the category has changes.
    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    /// Iterates over categories in first-seen order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.entries.iter().map(|(c, _)| c)
    }

    /// Iterates over categories and their changes.
    pub fn iter(&self) -> impl Iterator<Item = (&Category, &[Change])> {
        self.entries.iter().map(|(c, changes)| (c, changes.as_slice()))
    }

    /// Returns the number of categories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of changes across all categories.
    pub fn total_changes(&self) -> usize {
        self.entries.iter().map(|(_, changes)| changes.len()).sum()
    }

    /// Returns the distinct file paths touched by the changes.
    pub fn paths(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut paths: Vec<String> = Vec::new();
        for (_, changes) in &self.entries {
            for change in changes {
                if seen.insert(change.path.as_str()) {
                    paths.push(change.path.clone());
                }
            }
        }
        paths
    }
}

impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, changes) in &self.entries {
            map.serialize_entry(category, changes)?;
        }
        map.end()
    }
}

/// Resolves a producer category to the consumer categories that receive
/// its changes.
pub trait CategoryResolver {
    /// Returns consumer categories for `producer`, in mapping order.
    fn resolve(&self, producer: &Category) -> Vec<Category>;
}

impl<F> CategoryResolver for F
where
    F: Fn(&Category) -> Vec<Category>,
{
    fn resolve(&self, producer: &Category) -> Vec<Category> {
        self(producer)
    }
}

/// How an engine resolves producer categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Only mapped, registered consumer categories.
    #[default]
    Mapped,
    /// Mapped categories, falling back to the producer category itself when
    /// nothing is mapped.
    MappedOrSelf,
}

/// Classifies diff entries into a change set.
///
/// Entries without a category directory and the ignore file are skipped.
/// Content that does not decode yields an empty payload.
pub fn classify<R>(entries: &[DiffEntry], format: RecordFormat, resolver: &R) -> ChangeSet
where
    R: CategoryResolver + ?Sized,
{
    let mut changes = ChangeSet::new();

    for entry in entries {
        let Some(path) = entry.path() else {
            continue;
        };
        let Some((producer, id)) = naming::category_and_id(path) else {
            if !naming::is_ignored(path) {
                warn!(path, "skipping file outside any category directory");
            }
            continue;
        };

        let kind = ChangeKind::from_flags(entry.added, entry.deleted);
        let payload = match (&kind, entry.content_at_new_version()) {
            (ChangeKind::Deleted, _) | (_, None) => Record::new(),
            (_, Some(bytes)) => format.decode_lenient(bytes),
        };

        for consumer in resolver.resolve(&producer) {
            changes.push(
                consumer,
                Change {
                    id: id.clone(),
                    kind,
                    path: path.to_string(),
                    payload: payload.clone(),
                },
            );
        }
    }

    changes
}
