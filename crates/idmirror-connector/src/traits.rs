//! Directory transport trait
//!
//! The engine never talks to a server directly; it issues requests through a
//! [`DirectoryTransport`]. Each request carries the timeout the transport is
//! expected to enforce.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::SearchScope;
use crate::entry::RawEntry;
use crate::error::{ConnectorError, ConnectorResult};

/// One scoped search against one base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
    pub attributes: Vec<String>,
    pub timeout: Duration,
}

/// A dereference search: read `deref_attribute` off the entry at `base_dn`
/// and return the entries it references in one round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DereferenceRequest {
    pub base_dn: String,
    pub deref_attribute: String,
    pub attributes: Vec<String>,
    pub timeout: Duration,
}

/// Search primitives of a directory server.
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Run one search and return every entry, all pages concatenated.
    async fn search(&self, request: &SearchRequest) -> ConnectorResult<Vec<RawEntry>>;

    /// Whether the server advertises the dereference control.
    fn supports_dereference(&self) -> bool {
        false
    }

    /// Resolve the references held in one attribute in bulk.
    async fn dereference_search(
        &self,
        _request: &DereferenceRequest,
    ) -> ConnectorResult<Vec<RawEntry>> {
        Err(ConnectorError::DereferenceUnsupported)
    }
}
