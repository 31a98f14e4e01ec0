//! Cache store traits
//!
//! Writes only happen inside a [`CacheTransaction`]. A transaction is started,
//! used and committed or cancelled without suspending in between, so
//! implementations are synchronous.

use chrono::{DateTime, Utc};

use crate::error::CacheResult;
use crate::records::{GroupRecord, MemberType, UserRecord};

/// Read access shared by the store and its transactions.
pub trait CacheRead {
    fn find_group_by_name(&self, name: &str) -> CacheResult<Option<GroupRecord>>;

    fn find_user_by_name(&self, name: &str) -> CacheResult<Option<UserRecord>>;

    /// Names of the groups `name` is a direct member of. Unknown entities
    /// have no parents.
    fn get_direct_parent_names(&self, name: &str, kind: MemberType) -> CacheResult<Vec<String>>;
}

/// A transactional identity cache.
///
/// While a transaction is open its reads must go through the transaction;
/// implementations may block reads on the store itself until it ends.
pub trait CacheStore: CacheRead + Send + Sync {
    fn begin(&self) -> CacheResult<Box<dyn CacheTransaction + '_>>;
}

/// An open cache transaction. Dropping it without commit discards its writes.
pub trait CacheTransaction: CacheRead {
    /// Insert a placeholder group. Fails if a group of that name exists.
    fn insert_incomplete_group(
        &mut self,
        name: &str,
        gid: u32,
        original_dn: Option<&str>,
        is_posix: bool,
        created_at: DateTime<Utc>,
    ) -> CacheResult<()>;

    /// Insert or replace a user record. Existing edges are kept.
    fn store_user(&mut self, user: UserRecord) -> CacheResult<()>;

    /// Insert or replace a group record. Existing edges are kept.
    fn store_group(&mut self, group: GroupRecord) -> CacheResult<()>;

    /// Add and remove direct parent groups of one entity.
    ///
    /// The entity and every added group must exist. Removing an edge that
    /// does not exist is not an error.
    fn replace_membership_edges(
        &mut self,
        name: &str,
        kind: MemberType,
        add: &[String],
        remove: &[String],
    ) -> CacheResult<()>;

    fn commit(self: Box<Self>) -> CacheResult<()>;

    fn cancel(self: Box<Self>) -> CacheResult<()>;
}
