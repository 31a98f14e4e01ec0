//! In-memory cache store
//!
//! A transaction takes the store lock and works on a staged copy of the
//! state; commit swaps the copy in, cancel or drop throws it away.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::records::{GroupRecord, MemberType, UserRecord};
use crate::store::{CacheRead, CacheStore, CacheTransaction};

#[derive(Debug, Clone, Default)]
struct CacheState {
    users: HashMap<String, UserRecord>,
    groups: HashMap<String, GroupRecord>,
    parents: HashMap<(MemberType, String), BTreeSet<String>>,
}

impl CacheState {
    fn parents_of(&self, name: &str, kind: MemberType) -> Vec<String> {
        self.parents
            .get(&(kind, name.to_string()))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn exists(&self, name: &str, kind: MemberType) -> bool {
        match kind {
            MemberType::User => self.users.contains_key(name),
            MemberType::Group => self.groups.contains_key(name),
        }
    }
}

/// Transactional in-memory identity cache.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    state: Mutex<CacheState>,
    fail_next_commit: AtomicBool,
    commits: AtomicUsize,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|_| CacheError::storage("cache state lock poisoned"))
    }

    /// Make the next commit fail, leaving the state untouched.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn user(&self, name: &str) -> CacheResult<Option<UserRecord>> {
        self.find_user_by_name(name)
    }

    pub fn group(&self, name: &str) -> CacheResult<Option<GroupRecord>> {
        self.find_group_by_name(name)
    }

    /// Every cached user, sorted by name.
    pub fn users(&self) -> CacheResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.lock()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    pub fn direct_parents(&self, name: &str, kind: MemberType) -> CacheResult<Vec<String>> {
        self.get_direct_parent_names(name, kind)
    }

    /// Sorted names of every group the user belongs to directly, including
    /// the group matching the user's primary gid.
    pub fn initgroups(&self, name: &str) -> CacheResult<Vec<String>> {
        let state = self.lock()?;
        let user = state
            .users
            .get(name)
            .ok_or_else(|| CacheError::not_found(MemberType::User, name))?;

        let mut groups: BTreeSet<String> =
            state.parents_of(name, MemberType::User).into_iter().collect();
        if let Some(gid) = user.gid.filter(|gid| *gid != 0) {
            groups.extend(
                state
                    .groups
                    .values()
                    .filter(|g| g.gid == gid)
                    .map(|g| g.name.clone()),
            );
        }
        Ok(groups.into_iter().collect())
    }
}

impl CacheRead for InMemoryCache {
    fn find_group_by_name(&self, name: &str) -> CacheResult<Option<GroupRecord>> {
        Ok(self.lock()?.groups.get(name).cloned())
    }

    fn find_user_by_name(&self, name: &str) -> CacheResult<Option<UserRecord>> {
        Ok(self.lock()?.users.get(name).cloned())
    }

    fn get_direct_parent_names(&self, name: &str, kind: MemberType) -> CacheResult<Vec<String>> {
        Ok(self.lock()?.parents_of(name, kind))
    }
}

impl CacheStore for InMemoryCache {
    fn begin(&self) -> CacheResult<Box<dyn CacheTransaction + '_>> {
        let guard = self.lock()?;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            cache: self,
            guard,
            staged,
        }))
    }
}

struct InMemoryTransaction<'a> {
    cache: &'a InMemoryCache,
    guard: MutexGuard<'a, CacheState>,
    staged: CacheState,
}

impl CacheRead for InMemoryTransaction<'_> {
    fn find_group_by_name(&self, name: &str) -> CacheResult<Option<GroupRecord>> {
        Ok(self.staged.groups.get(name).cloned())
    }

    fn find_user_by_name(&self, name: &str) -> CacheResult<Option<UserRecord>> {
        Ok(self.staged.users.get(name).cloned())
    }

    fn get_direct_parent_names(&self, name: &str, kind: MemberType) -> CacheResult<Vec<String>> {
        Ok(self.staged.parents_of(name, kind))
    }
}

impl CacheTransaction for InMemoryTransaction<'_> {
    fn insert_incomplete_group(
        &mut self,
        name: &str,
        gid: u32,
        original_dn: Option<&str>,
        is_posix: bool,
        created_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        if self.staged.groups.contains_key(name) {
            return Err(CacheError::Conflict {
                kind: MemberType::Group,
                name: name.to_string(),
            });
        }
        self.staged.groups.insert(
            name.to_string(),
            GroupRecord::incomplete(
                name,
                gid,
                original_dn.map(str::to_string),
                is_posix,
                created_at,
            ),
        );
        Ok(())
    }

    fn store_user(&mut self, user: UserRecord) -> CacheResult<()> {
        self.staged.users.insert(user.name.clone(), user);
        Ok(())
    }

    fn store_group(&mut self, group: GroupRecord) -> CacheResult<()> {
        self.staged.groups.insert(group.name.clone(), group);
        Ok(())
    }

    fn replace_membership_edges(
        &mut self,
        name: &str,
        kind: MemberType,
        add: &[String],
        remove: &[String],
    ) -> CacheResult<()> {
        if !self.staged.exists(name, kind) {
            return Err(CacheError::not_found(kind, name));
        }
        if let Some(missing) = add.iter().find(|g| !self.staged.groups.contains_key(*g)) {
            return Err(CacheError::not_found(MemberType::Group, missing.clone()));
        }

        let edges = self
            .staged
            .parents
            .entry((kind, name.to_string()))
            .or_default();
        for group in remove {
            edges.remove(group);
        }
        edges.extend(add.iter().cloned());
        Ok(())
    }

    fn commit(self: Box<Self>) -> CacheResult<()> {
        let mut this = *self;
        if this.cache.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CacheError::transaction("commit rejected by storage"));
        }
        *this.guard = this.staged;
        this.cache.commits.fetch_add(1, Ordering::SeqCst);
        debug!("cache transaction committed");
        Ok(())
    }

    fn cancel(self: Box<Self>) -> CacheResult<()> {
        debug!("cache transaction cancelled");
        Ok(())
    }
}
