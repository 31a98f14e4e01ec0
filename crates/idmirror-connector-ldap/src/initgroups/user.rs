//! User lookup and storage.

use tracing::{debug, warn};

use idmirror_cache::UserRecord;
use idmirror_connector::{attr, ConnectorError, DirectoryEntry, Filter};

use super::reconcile::in_transaction;
use super::Context;
use crate::error::{InitgroupsError, InitgroupsResult};

/// The user being resolved, as found in the directory.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    /// Canonical name, used as the cache key.
    pub name: String,
    pub entry: DirectoryEntry,
}

impl ResolvedUser {
    pub fn original_dn(&self) -> InitgroupsResult<&str> {
        self.entry.original_dn().ok_or_else(|| {
            InitgroupsError::invalid_state(format!("user '{}' has no original DN", self.name))
        })
    }
}

/// Find the user under the user search bases, first base with a hit wins.
pub(crate) async fn lookup_user(ctx: &Context<'_>, name: &str) -> InitgroupsResult<ResolvedUser> {
    let map = ctx.user_map;
    let filter = Filter::and(vec![
        Filter::eq(map.require(attr::NAME)?, name),
        Filter::eq(attr::OBJECT_CLASS, map.object_class.as_str()),
    ]);
    let attributes = map.request_attributes();

    if ctx.options.user_search_bases.is_empty() {
        return Err(ConnectorError::invalid_configuration("no user search base configured").into());
    }

    for base in &ctx.options.user_search_bases {
        let mut entries = ctx
            .search
            .search(std::slice::from_ref(base), &filter, &attributes, map)
            .await?;

        match entries.len() {
            0 => {
                debug!(user = %name, base = %base.dn, "User not found under base");
                continue;
            }
            1 => {
                let entry = entries.remove(0);
                let canonical = entry.primary_name()?.to_string();
                if canonical != name {
                    debug!(user = %name, canonical = %canonical, "Using canonical user name");
                }
                return Ok(ResolvedUser {
                    name: canonical,
                    entry,
                });
            }
            count => {
                warn!(user = %name, base = %base.dn, count, "User name is not unique");
                return Err(InitgroupsError::invalid_state(format!(
                    "{} entries found for user '{}' under '{}'",
                    count, name, base.dn
                )));
            }
        }
    }

    Err(InitgroupsError::UserNotFound {
        name: name.to_string(),
    })
}

/// Store or refresh the user record in its own transaction.
pub(crate) fn store_user(ctx: &Context<'_>, user: &ResolvedUser) -> InitgroupsResult<()> {
    let uid = user.entry.get_u32(attr::UID_NUMBER)?;
    let gid = user.entry.get_u32(attr::GID_NUMBER)?;

    in_transaction(ctx.cache, |tx| {
        let mut record = UserRecord::new(&user.name).with_ids(uid, gid);
        if let Some(dn) = user.entry.original_dn() {
            record = record.with_original_dn(dn);
        }
        if let Some(existing) = tx.find_user_by_name(&user.name)? {
            record.created_at = existing.created_at;
        }
        debug!(user = %user.name, ?uid, ?gid, "Storing user");
        tx.store_user(record)?;
        Ok(())
    })
}
