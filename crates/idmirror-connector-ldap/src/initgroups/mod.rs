//! Initgroups resolution
//!
//! Resolves every group a user belongs to and mirrors the result into the
//! cache:
//!
//! 1. Look the user up and store it
//! 2. Run the strategy picked for the schema variant ([`Strategy`])
//! 3. Refresh the user's primary group by gid
//!
//! A resolution keeps at most one directory request in flight and never holds
//! a cache transaction open across a request.

mod bidirectional;
pub mod diff;
mod flat;
mod nested;
mod primary;
pub mod reconcile;
pub mod search;
mod selector;
mod user;
pub mod visited;

use std::sync::Arc;
use tracing::{debug, info, instrument};

use idmirror_cache::CacheStore;
use idmirror_connector::config::{InitgroupsOptions, SearchBase};
use idmirror_connector::schema::AttributeMap;
use idmirror_connector::traits::DirectoryTransport;
use idmirror_connector::{attr, Filter};

use crate::error::InitgroupsResult;
use search::SearchOrchestrator;

pub use diff::{diff_names, diff_names_with_unchanged, MembershipDiff, NameDiff};
pub use selector::Strategy;
pub use user::ResolvedUser;
pub use visited::{VisitedGroup, VisitedGroups};

/// Initgroups engine bound to one directory and one cache.
///
/// Cheap to share behind an `Arc`; concurrent calls for different users each
/// get their own visited-set.
pub struct Initgroups {
    transport: Arc<dyn DirectoryTransport>,
    cache: Arc<dyn CacheStore>,
    options: InitgroupsOptions,
    user_map: AttributeMap,
    group_map: AttributeMap,
}

impl Initgroups {
    /// Create an engine. The options are validated here.
    pub fn new(
        transport: Arc<dyn DirectoryTransport>,
        cache: Arc<dyn CacheStore>,
        options: InitgroupsOptions,
    ) -> InitgroupsResult<Self> {
        options.validate()?;
        let user_map = options.user_map();
        let group_map = options.group_map();
        user_map.validate()?;
        group_map.validate()?;

        Ok(Self {
            transport,
            cache,
            options,
            user_map,
            group_map,
        })
    }

    pub fn options(&self) -> &InitgroupsOptions {
        &self.options
    }

    /// Strategy used for every resolution of this engine.
    pub fn strategy(&self) -> Strategy {
        Strategy::for_schema(self.options.schema)
    }

    /// Resolve the groups of `name` and reconcile them into the cache.
    #[instrument(skip(self), fields(schema = %self.options.schema))]
    pub async fn initgroups(&self, name: &str) -> InitgroupsResult<()> {
        let ctx = Context {
            search: SearchOrchestrator::new(self.transport.as_ref(), self.options.search_timeout()),
            cache: self.cache.as_ref(),
            options: &self.options,
            user_map: &self.user_map,
            group_map: &self.group_map,
            group_attributes: self.group_map.request_attributes(),
        };

        let user = user::lookup_user(&ctx, name).await?;
        user::store_user(&ctx, &user)?;

        let strategy = self.strategy();
        debug!(user = %user.name, ?strategy, "Resolving group memberships");
        strategy.run(&ctx, &user).await?;

        primary::refresh_primary_group(&ctx, &user).await?;

        info!(user = %user.name, "Initgroups completed");
        Ok(())
    }
}

impl std::fmt::Debug for Initgroups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Initgroups")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Per-call state shared by the resolution steps.
pub(crate) struct Context<'a> {
    pub search: SearchOrchestrator<'a>,
    pub cache: &'a dyn CacheStore,
    pub options: &'a InitgroupsOptions,
    pub user_map: &'a AttributeMap,
    pub group_map: &'a AttributeMap,
    group_attributes: Vec<String>,
}

impl Context<'_> {
    pub fn group_bases(&self) -> &[SearchBase] {
        &self.options.group_search_bases
    }

    pub fn group_attributes(&self) -> &[String] {
        &self.group_attributes
    }

    /// `(&<condition>(objectClass=<group class>)(<name>=*))`
    pub fn group_filter(&self, condition: Filter) -> InitgroupsResult<Filter> {
        Ok(Filter::and(vec![
            condition,
            Filter::eq(attr::OBJECT_CLASS, self.group_map.object_class.as_str()),
            Filter::present(self.group_map.require(attr::NAME)?),
        ]))
    }
}
