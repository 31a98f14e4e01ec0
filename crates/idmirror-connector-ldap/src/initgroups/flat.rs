//! Flat strategy: groups list their members by user name.

use chrono::Utc;
use tracing::debug;

use idmirror_cache::MemberType;
use idmirror_connector::{attr, Filter};

use super::diff::MembershipDiff;
use super::reconcile::{add_incomplete_groups, apply_diffs, in_transaction, primary_names};
use super::user::ResolvedUser;
use super::Context;
use crate::error::InitgroupsResult;

pub(crate) async fn run(ctx: &Context<'_>, user: &ResolvedUser) -> InitgroupsResult<()> {
    let map = ctx.group_map;
    let gid = map.require(attr::GID_NUMBER)?;
    // groups without a usable gid are not memberships in this schema
    let filter = Filter::and(vec![
        Filter::eq(map.require(attr::MEMBER)?, user.name.as_str()),
        Filter::eq(attr::OBJECT_CLASS, map.object_class.as_str()),
        Filter::present(map.require(attr::NAME)?),
        Filter::and(vec![
            Filter::present(gid),
            Filter::negate(Filter::eq(gid, "0")),
        ]),
    ]);

    let groups = ctx
        .search
        .search(ctx.group_bases(), &filter, ctx.group_attributes(), map)
        .await?;
    let names = primary_names(&groups);
    debug!(user = %user.name, count = names.len(), "Found groups");

    in_transaction(ctx.cache, |tx| {
        let cached = tx.get_direct_parent_names(&user.name, MemberType::User)?;
        let diff = MembershipDiff::build(user.name.as_str(), MemberType::User, &names, &cached);
        add_incomplete_groups(tx, &diff.add, &groups, Utc::now())?;
        apply_diffs(tx, std::slice::from_ref(&diff))
    })
}
