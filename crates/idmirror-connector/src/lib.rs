//! # idmirror directory vocabulary
//!
//! Types shared by every part of idmirror that reads from a directory server.
//!
//! ## Crate Organization
//!
//! - [`entry`] - Raw transport entries and parsed [`DirectoryEntry`] bags
//! - [`schema`] - Schema variants, attribute maps and entry parsing
//! - [`filter`] - Filter trees, RFC 4515 escaping and base sub-filters
//! - [`config`] - Search bases and engine options
//! - [`traits`] - The [`DirectoryTransport`] async trait
//! - [`error`] - Error types with transient/permanent classification

pub mod config;
pub mod entry;
pub mod error;
pub mod filter;
pub mod schema;
pub mod traits;

pub use config::{InitgroupsOptions, SearchBase, SearchScope};
pub use entry::{attr, DirectoryEntry, RawEntry};
pub use error::{ConnectorError, ConnectorResult};
pub use filter::Filter;
pub use schema::{parse_entry, AttributeMap, SchemaVariant};
pub use traits::{DereferenceRequest, DirectoryTransport, SearchRequest};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{InitgroupsOptions, SearchBase, SearchScope};
    pub use crate::entry::{attr, DirectoryEntry, RawEntry};
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::filter::{combine_filters, escape_filter_value, Filter};
    pub use crate::schema::{parse_entry, AttributeMap, SchemaVariant};
    pub use crate::traits::{DereferenceRequest, DirectoryTransport, SearchRequest};
}
