//! Name set differences and per-entity membership diffs.

use std::collections::HashSet;

use idmirror_cache::MemberType;

/// Result of comparing desired names against current ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameDiff {
    /// Desired but not current.
    pub add: Vec<String>,
    /// Current but not desired.
    pub remove: Vec<String>,
    /// Present on both sides, only filled when requested.
    pub unchanged: Option<Vec<String>>,
}

impl NameDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Compute `add = desired - current` and `remove = current - desired`.
///
/// Names compare exactly. Each output lists every name once, in the order it
/// first appears in its input.
pub fn diff_names<D, C>(desired: &[D], current: &[C]) -> NameDiff
where
    D: AsRef<str>,
    C: AsRef<str>,
{
    compute(desired, current, false)
}

/// Like [`diff_names`], also reporting the names common to both sides.
pub fn diff_names_with_unchanged<D, C>(desired: &[D], current: &[C]) -> NameDiff
where
    D: AsRef<str>,
    C: AsRef<str>,
{
    compute(desired, current, true)
}

fn compute<D, C>(desired: &[D], current: &[C], with_unchanged: bool) -> NameDiff
where
    D: AsRef<str>,
    C: AsRef<str>,
{
    let desired_set: HashSet<&str> = desired.iter().map(as_str).collect();
    let current_set: HashSet<&str> = current.iter().map(as_str).collect();

    let add = ordered_difference(desired, &current_set);
    let remove = ordered_difference(current, &desired_set);
    let unchanged = with_unchanged.then(|| {
        let mut seen = HashSet::new();
        desired
            .iter()
            .map(as_str)
            .filter(|name| current_set.contains(name) && seen.insert(*name))
            .map(str::to_string)
            .collect()
    });

    NameDiff {
        add,
        remove,
        unchanged,
    }
}

fn as_str<T: AsRef<str>>(name: &T) -> &str {
    name.as_ref()
}

fn ordered_difference<T: AsRef<str>>(names: &[T], exclude: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(as_str)
        .filter(|name| !exclude.contains(name) && seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Pending change to the direct parent groups of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDiff {
    pub name: String,
    pub kind: MemberType,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl MembershipDiff {
    /// Diff the parents found in the directory against the cached ones.
    pub fn build<D, C>(
        name: impl Into<String>,
        kind: MemberType,
        directory_parents: &[D],
        cached_parents: &[C],
    ) -> Self
    where
        D: AsRef<str>,
        C: AsRef<str>,
    {
        let diff = diff_names(directory_parents, cached_parents);
        Self {
            name: name.into(),
            kind,
            add: diff.add,
            remove: diff.remove,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}
