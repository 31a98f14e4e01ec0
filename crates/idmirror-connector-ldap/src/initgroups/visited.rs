//! Groups seen during one resolution.
//!
//! Keyed by primary group name. Checking [`VisitedGroups::has`] before
//! searching a group's parents breaks membership cycles and avoids searching
//! the same group twice.

use std::collections::HashMap;

use idmirror_connector::DirectoryEntry;

use crate::error::{InitgroupsError, InitgroupsResult};

/// A resolved group and the parent groups found for it in the directory.
#[derive(Debug, Clone)]
pub struct VisitedGroup {
    pub group: DirectoryEntry,
    pub parents: Vec<DirectoryEntry>,
}

impl VisitedGroup {
    pub fn new(group: DirectoryEntry, parents: Vec<DirectoryEntry>) -> Self {
        Self { group, parents }
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }
}

/// Visited-set of one top-level resolution.
#[derive(Debug, Default)]
pub struct VisitedGroups {
    entries: HashMap<String, VisitedGroup>,
}

impl VisitedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Record a group. Inserting a name twice is a caller bug and fails.
    pub fn insert(&mut self, name: impl Into<String>, entry: VisitedGroup) -> InitgroupsResult<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(InitgroupsError::internal(format!(
                "group '{}' recorded twice in one resolution",
                name
            )));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&VisitedGroup> {
        self.entries.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = &VisitedGroup> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VisitedGroup)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
