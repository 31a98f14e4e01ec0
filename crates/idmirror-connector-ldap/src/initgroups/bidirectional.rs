//! Bidirectional strategy: groups list member DNs and may be members of other
//! groups.
//!
//! Starting from the groups naming the user, parent groups are searched depth
//! first up to the configured nesting level. The visited-set stops cycles and
//! repeated searches.

use chrono::Utc;
use tracing::{debug, warn};

use idmirror_cache::MemberType;
use idmirror_connector::{attr, DirectoryEntry, Filter};

use super::diff::MembershipDiff;
use super::reconcile::{apply_diffs, in_transaction, primary_names, store_groups};
use super::user::ResolvedUser;
use super::visited::{VisitedGroup, VisitedGroups};
use super::Context;
use crate::error::InitgroupsResult;

/// Groups still to be expanded at one nesting level.
struct Frontier {
    groups: std::vec::IntoIter<DirectoryEntry>,
    nesting: usize,
}

pub(crate) async fn run(ctx: &Context<'_>, user: &ResolvedUser) -> InitgroupsResult<()> {
    let direct = search_parents(ctx, user.original_dn()?).await?;
    let direct_names = primary_names(&direct);
    debug!(user = %user.name, count = direct_names.len(), "Direct parent groups");

    if !direct.is_empty() {
        let visited = walk(ctx, direct).await?;
        store_group_memberships(ctx, &visited)?;
    }

    store_user_memberships(ctx, user, &direct_names)
}

/// Groups whose member attribute holds `dn`.
async fn search_parents(ctx: &Context<'_>, dn: &str) -> InitgroupsResult<Vec<DirectoryEntry>> {
    let member = ctx.group_map.require(attr::MEMBER)?;
    let filter = ctx.group_filter(Filter::eq(member, dn))?;
    ctx.search
        .search(ctx.group_bases(), &filter, ctx.group_attributes(), ctx.group_map)
        .await
}

/// Depth-first walk upwards from the direct groups.
async fn walk(ctx: &Context<'_>, direct: Vec<DirectoryEntry>) -> InitgroupsResult<VisitedGroups> {
    let max_nesting = ctx.options.max_nesting_level;
    let mut visited = VisitedGroups::new();
    let mut stack = vec![Frontier {
        groups: direct.into_iter(),
        nesting: 0,
    }];

    loop {
        let Some(frontier) = stack.last_mut() else {
            break;
        };
        let nesting = frontier.nesting;
        let Some(group) = frontier.groups.next() else {
            stack.pop();
            continue;
        };

        let name = match group.primary_name() {
            Ok(name) => name.to_string(),
            Err(e) => {
                warn!(error = %e, "Skipping group without a usable name");
                continue;
            }
        };
        if visited.has(&name) {
            debug!(group = %name, "Group already processed");
            continue;
        }
        let Some(dn) = group.original_dn() else {
            warn!(group = %name, "Skipping group without an original DN");
            continue;
        };

        let parents = search_parents(ctx, dn).await?;
        debug!(group = %name, nesting, parents = parents.len(), "Resolved parent groups");

        let next = parents.clone();
        visited.insert(name, VisitedGroup::new(group, parents))?;

        if next.is_empty() {
            continue;
        }
        if nesting >= max_nesting {
            debug!(nesting, max_nesting, "Maximum nesting level reached");
            continue;
        }
        stack.push(Frontier {
            groups: next.into_iter(),
            nesting: nesting + 1,
        });
    }

    Ok(visited)
}

/// Store every group seen and reconcile each visited group's parents.
fn store_group_memberships(ctx: &Context<'_>, visited: &VisitedGroups) -> InitgroupsResult<()> {
    let mut all_groups = Vec::with_capacity(visited.len());
    for entry in visited.values() {
        all_groups.push(entry.group.clone());
        all_groups.extend(entry.parents.iter().cloned());
    }

    in_transaction(ctx.cache, |tx| {
        store_groups(tx, &all_groups, Utc::now())?;

        let mut diffs = Vec::with_capacity(visited.len());
        for (name, entry) in visited.iter() {
            let parents = primary_names(&entry.parents);
            let cached = tx.get_direct_parent_names(name, MemberType::Group)?;
            diffs.push(MembershipDiff::build(name, MemberType::Group, &parents, &cached));
        }
        apply_diffs(tx, &diffs)
    })
}

fn store_user_memberships(
    ctx: &Context<'_>,
    user: &ResolvedUser,
    direct_names: &[String],
) -> InitgroupsResult<()> {
    in_transaction(ctx.cache, |tx| {
        let cached = tx.get_direct_parent_names(&user.name, MemberType::User)?;
        let diff = MembershipDiff::build(user.name.as_str(), MemberType::User, direct_names, &cached);
        apply_diffs(tx, std::slice::from_ref(&diff))
    })
}
