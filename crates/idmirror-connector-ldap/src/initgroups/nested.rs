//! Direct-attribute strategy: the user entry lists its groups in memberOf.
//!
//! Referenced groups are fetched one lookup at a time, or with a single
//! dereference search when the server supports it and the user has more
//! references than the configured threshold. Group nesting is only resolved
//! among the fetched groups; their own parents are not searched.

use chrono::Utc;
use tracing::{debug, warn};

use idmirror_cache::MemberType;
use idmirror_connector::{attr, ConnectorError, DirectoryEntry, Filter};

use super::diff::MembershipDiff;
use super::reconcile::{apply_diffs, in_transaction, store_groups};
use super::user::ResolvedUser;
use super::Context;
use crate::error::{InitgroupsError, InitgroupsResult};

pub(crate) async fn run(ctx: &Context<'_>, user: &ResolvedUser) -> InitgroupsResult<()> {
    let references: Vec<String> = user
        .entry
        .get_strings(attr::MEMBER_OF)
        .into_iter()
        .map(str::to_string)
        .collect();
    if references.is_empty() {
        debug!(user = %user.name, "User has no memberOf references");
        return Ok(());
    }

    let groups = if ctx.search.supports_dereference() && references.len() > ctx.options.deref_threshold
    {
        let deref_attribute = ctx.user_map.require(attr::MEMBER_OF)?;
        let groups = ctx
            .search
            .dereference(
                user.original_dn()?,
                deref_attribute,
                ctx.group_attributes(),
                ctx.group_map,
            )
            .await?;
        if groups.is_empty() {
            debug!(user = %user.name, "Dereference returned no groups");
            return Ok(());
        }
        groups
    } else {
        lookup_each(ctx, &references).await?
    };

    debug!(
        user = %user.name,
        references = references.len(),
        groups = groups.len(),
        "Resolved memberOf references"
    );
    store(ctx, user, &groups)
}

/// One base-scoped lookup per reference, in order.
async fn lookup_each(ctx: &Context<'_>, references: &[String]) -> InitgroupsResult<Vec<DirectoryEntry>> {
    let filter = Filter::and(vec![
        Filter::eq(attr::OBJECT_CLASS, ctx.group_map.object_class.as_str()),
        Filter::present(ctx.group_map.require(attr::NAME)?),
    ]);

    let mut groups = Vec::with_capacity(references.len());
    for dn in references {
        match ctx
            .search
            .lookup(dn, &filter, ctx.group_attributes(), ctx.group_map)
            .await
        {
            Ok(mut found) if found.len() == 1 => groups.push(found.remove(0)),
            Ok(found) => {
                warn!(dn = %dn, count = found.len(), "Expected exactly one group, skipping reference");
            }
            Err(InitgroupsError::Directory(ConnectorError::MalformedEntry { message })) => {
                warn!(dn = %dn, reason = %message, "Malformed group entry, skipping reference");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(groups)
}

/// Names of the groups in `groups` whose members include `dn`.
fn parents_of(dn: &str, groups: &[(String, &DirectoryEntry)]) -> Vec<String> {
    groups
        .iter()
        .filter(|(_, group)| group.has_value_ignore_case(attr::MEMBER, dn))
        .map(|(name, _)| name.clone())
        .collect()
}

fn store(ctx: &Context<'_>, user: &ResolvedUser, groups: &[DirectoryEntry]) -> InitgroupsResult<()> {
    let user_dn = user.original_dn()?;
    let named: Vec<(String, &DirectoryEntry)> = groups
        .iter()
        .filter_map(|g| g.primary_name().ok().map(|n| (n.to_string(), g)))
        .collect();

    in_transaction(ctx.cache, |tx| {
        store_groups(tx, groups, Utc::now())?;

        let mut diffs = Vec::with_capacity(named.len() + 1);
        for (name, group) in &named {
            let Some(dn) = group.original_dn() else {
                continue;
            };
            let parents = parents_of(dn, &named);
            let cached = tx.get_direct_parent_names(name, MemberType::Group)?;
            diffs.push(MembershipDiff::build(name.as_str(), MemberType::Group, &parents, &cached));
        }

        let parents = parents_of(user_dn, &named);
        debug!(user = %user.name, direct = parents.len(), "Direct parent groups");
        let cached = tx.get_direct_parent_names(&user.name, MemberType::User)?;
        diffs.push(MembershipDiff::build(user.name.as_str(), MemberType::User, &parents, &cached));

        apply_diffs(tx, &diffs)
    })
}
