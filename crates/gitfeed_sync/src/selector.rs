//! Selecting which working-tree changes a commit includes.

use crate::error::SyncError;
use gitfeed_core::{Category, ChangeSet};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Which pending changes a producer commit stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommitSelector {
    /// Every pending change.
    #[default]
    All,
    /// Only the listed record ids, per category.
    Only(BTreeMap<Category, Vec<String>>),
}

impl CommitSelector {
    /// Selects the given ids of one category.
    pub fn only<I, S>(category: impl Into<Category>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::All.and(category, ids)
    }

    /// Adds ids of another category. Turns `All` into a selection.
    #[must_use]
    pub fn and<I, S>(self, category: impl Into<Category>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = match self {
            CommitSelector::All => BTreeMap::new(),
            CommitSelector::Only(map) => map,
        };
        map.entry(category.into())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        CommitSelector::Only(map)
    }

    /// Returns the distinct paths of the selected changes.
    pub fn select(&self, changes: &ChangeSet) -> Vec<String> {
        let map = match self {
            CommitSelector::All => return changes.paths(),
            CommitSelector::Only(map) => map,
        };

        let mut paths: Vec<String> = Vec::new();
        for (category, list) in changes.iter() {
            let Some(ids) = map.get(category) else {
                continue;
            };
            for change in list.iter().filter(|c| ids.contains(&c.id)) {
                if !paths.contains(&change.path) {
                    paths.push(change.path.clone());
                }
            }
        }
        paths
    }
}

impl FromStr for CommitSelector {
    type Err = SyncError;

    /// Parses `Category=id1,id2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, ids) = s
            .split_once('=')
            .ok_or_else(|| SyncError::InvalidSelector(format!("expected Category=ids, got {s:?}")))?;
        let category = category.trim();
        let ids: Vec<&str> = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();
        if category.is_empty() || ids.is_empty() {
            return Err(SyncError::InvalidSelector(format!(
                "expected Category=ids, got {s:?}"
            )));
        }
        Ok(CommitSelector::only(category, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitfeed_core::{Change, ChangeKind};

    fn changes() -> ChangeSet {
        let mut set = ChangeSet::new();
        for (category, id) in [("Foo", "1"), ("Foo", "2"), ("Bar", "1")] {
            set.push(
                Category::from(category),
                Change {
                    id: id.into(),
                    kind: ChangeKind::Added,
                    path: format!("{}/{id}.json", category.to_lowercase()),
                    payload: Default::default(),
                },
            );
        }
        set
    }

    #[test]
    fn all_selects_every_path() {
        assert_eq!(CommitSelector::All.select(&changes()).len(), 3);
    }

    #[test]
    fn only_selects_listed_ids() {
        let selector = CommitSelector::only("Foo", ["2"]).and("Bar", ["1", "9"]);
        assert_eq!(selector.select(&changes()), ["foo/2.json", "bar/1.json"]);
    }

    #[test]
    fn unknown_categories_select_nothing() {
        assert!(CommitSelector::only("Baz", ["1"]).select(&changes()).is_empty());
    }

    #[test]
    fn parse() {
        let selector: CommitSelector = "Foo=1, 2".parse().unwrap();
        assert_eq!(selector, CommitSelector::only("Foo", ["1", "2"]));
        assert!("Foo".parse::<CommitSelector>().is_err());
        assert!("=1".parse::<CommitSelector>().is_err());
        assert!("Foo=".parse::<CommitSelector>().is_err());
    }
}
