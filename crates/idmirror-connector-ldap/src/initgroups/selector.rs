//! Strategy selection.

use idmirror_connector::SchemaVariant;

use super::user::ResolvedUser;
use super::{bidirectional, flat, nested, Context};
use crate::error::InitgroupsResult;

/// How group memberships are discovered for a schema variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One search for groups naming the user.
    Flat,
    /// Follow the user's own member-of references.
    NestedDirectAttribute,
    /// Walk upwards from the user's direct groups through group members.
    NestedBidirectional,
}

impl Strategy {
    pub fn for_schema(schema: SchemaVariant) -> Self {
        match schema {
            SchemaVariant::Rfc2307 => Strategy::Flat,
            SchemaVariant::Rfc2307Bis => Strategy::NestedBidirectional,
            SchemaVariant::IpaV1 | SchemaVariant::Ad => Strategy::NestedDirectAttribute,
        }
    }

    pub(crate) async fn run(self, ctx: &Context<'_>, user: &ResolvedUser) -> InitgroupsResult<()> {
        match self {
            Strategy::Flat => flat::run(ctx, user).await,
            Strategy::NestedDirectAttribute => nested::run(ctx, user).await,
            Strategy::NestedBidirectional => bidirectional::run(ctx, user).await,
        }
    }
}
