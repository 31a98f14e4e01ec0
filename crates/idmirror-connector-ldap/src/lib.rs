//! # LDAP initgroups
//!
//! Resolves the complete group membership of a user from an LDAP directory
//! and reconciles it into the local cache.
//!
//! ## Features
//!
//! - RFC2307, RFC2307bis, FreeIPA and Active Directory schemas
//! - Flat, member-of and bidirectional nested resolution strategies
//! - Bounded nesting depth with cycle detection
//! - Transactional diff-based cache updates
//! - `ldap3` transport with SSL/TLS and STARTTLS
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use idmirror_cache::InMemoryCache;
//! use idmirror_connector::prelude::*;
//! use idmirror_connector_ldap::{Initgroups, LdapConfig, LdapDirectory};
//!
//! let directory = LdapDirectory::new(
//!     LdapConfig::new("ldap.example.com").with_bind("cn=reader,dc=example,dc=com", "secret"),
//! )?;
//! let options = InitgroupsOptions::new(SchemaVariant::Rfc2307Bis)
//!     .with_user_search_base(SearchBase::new("ou=people,dc=example,dc=com"))
//!     .with_group_search_base(SearchBase::new("ou=groups,dc=example,dc=com"));
//!
//! let engine = Initgroups::new(Arc::new(directory), Arc::new(InMemoryCache::new()), options)?;
//! engine.initgroups("alice").await?;
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod initgroups;

// Re-exports
pub use config::LdapConfig;
pub use connector::LdapDirectory;
pub use error::{ErrorClass, InitgroupsError, InitgroupsResult};
pub use initgroups::{Initgroups, ResolvedUser, Strategy};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::LdapConfig;
    pub use crate::connector::LdapDirectory;
    pub use crate::error::{ErrorClass, InitgroupsError, InitgroupsResult};
    pub use crate::initgroups::{Initgroups, MembershipDiff, NameDiff, Strategy};
}
