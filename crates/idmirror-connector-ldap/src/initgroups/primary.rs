//! Primary group refresh.
//!
//! A user belongs to the group matching its gidNumber whether or not that
//! group lists it, so the group is fetched by gid and stored in full. No
//! membership edge is written; the user's gid carries the membership.

use tracing::{debug, warn};

use idmirror_cache::GroupRecord;
use idmirror_connector::{attr, Filter};

use super::reconcile::in_transaction;
use super::user::ResolvedUser;
use super::Context;
use crate::error::{InitgroupsError, InitgroupsResult};

pub(crate) async fn refresh_primary_group(
    ctx: &Context<'_>,
    user: &ResolvedUser,
) -> InitgroupsResult<()> {
    let gid = user.entry.get_u32(attr::GID_NUMBER)?.ok_or_else(|| {
        InitgroupsError::invalid_state(format!("user '{}' has no gidNumber", user.name))
    })?;

    let map = ctx.group_map;
    let filter = Filter::and(vec![
        Filter::eq(map.require(attr::GID_NUMBER)?, gid.to_string()),
        Filter::eq(attr::OBJECT_CLASS, map.object_class.as_str()),
    ]);
    let groups = ctx
        .search
        .search(ctx.group_bases(), &filter, ctx.group_attributes(), map)
        .await?;

    if groups.is_empty() {
        debug!(user = %user.name, gid, "Primary group not found in directory");
        return Ok(());
    }

    in_transaction(ctx.cache, |tx| {
        for group in &groups {
            let name = match group.primary_name() {
                Ok(name) => name,
                Err(e) => {
                    warn!(gid, error = %e, "Skipping primary group without a usable name");
                    continue;
                }
            };
            let mut record = GroupRecord::new(name, group.get_u32(attr::GID_NUMBER)?.unwrap_or(0));
            if let Some(dn) = group.original_dn() {
                record = record.with_original_dn(dn);
            }
            if let Some(existing) = tx.find_group_by_name(name)? {
                record.created_at = existing.created_at;
            }
            debug!(user = %user.name, group = %name, gid, "Storing primary group");
            tx.store_group(record)?;
        }
        Ok(())
    })
}
