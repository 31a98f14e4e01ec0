//! Cache writes of a resolution.
//!
//! Every write sequence runs inside [`in_transaction`]: committed when the
//! body succeeds, cancelled otherwise.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

use idmirror_cache::{CacheStore, CacheTransaction};
use idmirror_connector::{attr, DirectoryEntry};

use super::diff::MembershipDiff;
use crate::error::{InitgroupsError, InitgroupsResult};

/// Run `body` in one cache transaction.
///
/// A failing body cancels the transaction and its error is returned even if
/// the cancel fails too.
pub fn in_transaction<T, F>(cache: &dyn CacheStore, body: F) -> InitgroupsResult<T>
where
    F: FnOnce(&mut dyn CacheTransaction) -> InitgroupsResult<T>,
{
    let mut tx = cache.begin()?;
    match body(&mut *tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(cancel_err) = tx.cancel() {
                warn!(error = %cancel_err, "Failed to cancel cache transaction");
            }
            Err(err)
        }
    }
}

/// Primary names of fetched groups, deduplicated, in fetch order.
///
/// Entries without a usable name are skipped with a warning.
pub fn primary_names(groups: &[DirectoryEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(groups.len());
    for group in groups {
        match group.primary_name() {
            Ok(name) => {
                if seen.insert(name.to_string()) {
                    names.push(name.to_string());
                }
            }
            Err(e) => warn!(
                dn = group.original_dn().unwrap_or("<unknown>"),
                error = %e,
                "Skipping group without a usable name"
            ),
        }
    }
    names
}

/// Insert placeholder records for the names not cached yet.
///
/// Each missing name must match a group of `fetched`; an unmatched name is an
/// invalid state. Existing records are never overwritten.
pub fn add_incomplete_groups(
    tx: &mut dyn CacheTransaction,
    names: &[String],
    fetched: &[DirectoryEntry],
    now: DateTime<Utc>,
) -> InitgroupsResult<()> {
    for name in names {
        if tx.find_group_by_name(name)?.is_some() {
            continue;
        }

        let group = fetched
            .iter()
            .find(|g| g.primary_name().is_ok_and(|n| n == name.as_str()))
            .ok_or_else(|| {
                InitgroupsError::invalid_state(format!(
                    "group '{}' is not among the fetched groups",
                    name
                ))
            })?;

        let (gid, is_posix) = match group.get_u32(attr::GID_NUMBER)? {
            Some(gid) if gid != 0 => (gid, true),
            _ => (0, false),
        };

        debug!(group = %name, gid, is_posix, "Adding incomplete group");
        tx.insert_incomplete_group(name, gid, group.original_dn(), is_posix, now)?;
    }
    Ok(())
}

/// Make sure every named group of `groups` exists in the cache.
pub fn store_groups(
    tx: &mut dyn CacheTransaction,
    groups: &[DirectoryEntry],
    now: DateTime<Utc>,
) -> InitgroupsResult<()> {
    let names = primary_names(groups);
    add_incomplete_groups(tx, &names, groups, now)
}

/// Apply membership diffs, skipping empty ones.
pub fn apply_diffs(tx: &mut dyn CacheTransaction, diffs: &[MembershipDiff]) -> InitgroupsResult<()> {
    for diff in diffs.iter().filter(|d| !d.is_empty()) {
        debug!(
            member = %diff.name,
            kind = %diff.kind,
            add = diff.add.len(),
            remove = diff.remove.len(),
            "Updating memberships"
        );
        tx.replace_membership_edges(&diff.name, diff.kind, &diff.add, &diff.remove)?;
    }
    Ok(())
}
