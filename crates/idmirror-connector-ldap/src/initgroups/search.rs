//! Search fan-out over configured search bases.

use std::time::Duration;
use tracing::debug;

use idmirror_connector::config::{SearchBase, SearchScope};
use idmirror_connector::filter::{combine_filters, Filter};
use idmirror_connector::schema::{parse_entry, AttributeMap};
use idmirror_connector::traits::{DereferenceRequest, DirectoryTransport, SearchRequest};
use idmirror_connector::{ConnectorError, DirectoryEntry};

use crate::error::InitgroupsResult;

/// Issues searches through a transport and parses the results.
///
/// One request is in flight at a time.
pub struct SearchOrchestrator<'a> {
    transport: &'a dyn DirectoryTransport,
    timeout: Duration,
}

impl<'a> SearchOrchestrator<'a> {
    pub fn new(transport: &'a dyn DirectoryTransport, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn supports_dereference(&self) -> bool {
        self.transport.supports_dereference()
    }

    /// Search every base in order and concatenate the parsed results.
    ///
    /// Each base's own sub-filter is ANDed onto `filter`. Results found under
    /// overlapping bases are not deduplicated. A failure under any base fails
    /// the whole search.
    pub async fn search(
        &self,
        bases: &[SearchBase],
        filter: &Filter,
        attributes: &[String],
        map: &AttributeMap,
    ) -> InitgroupsResult<Vec<DirectoryEntry>> {
        if bases.is_empty() {
            return Err(ConnectorError::invalid_configuration("no search base configured").into());
        }

        let rendered = filter.to_ldap();
        let mut entries = Vec::new();
        for base in bases {
            let request = SearchRequest {
                base: base.dn.clone(),
                scope: base.scope,
                filter: combine_filters(&rendered, base.filter.as_deref()),
                attributes: attributes.to_vec(),
                timeout: self.timeout,
            };
            debug!(base = %request.base, scope = %request.scope, filter = %request.filter, "Searching");

            let raw = self.transport.search(&request).await?;
            debug!(base = %request.base, count = raw.len(), "Search returned");
            for entry in &raw {
                entries.push(parse_entry(entry, Some(map))?);
            }
        }

        Ok(entries)
    }

    /// Base-scoped search of a single DN.
    pub async fn lookup(
        &self,
        dn: &str,
        filter: &Filter,
        attributes: &[String],
        map: &AttributeMap,
    ) -> InitgroupsResult<Vec<DirectoryEntry>> {
        let base = SearchBase::new(dn).with_scope(SearchScope::Base);
        self.search(std::slice::from_ref(&base), filter, attributes, map)
            .await
    }

    /// Dereference `deref_attribute` of the entry at `base_dn`.
    ///
    /// Returned entries that do not match `map` are skipped.
    pub async fn dereference(
        &self,
        base_dn: &str,
        deref_attribute: &str,
        attributes: &[String],
        map: &AttributeMap,
    ) -> InitgroupsResult<Vec<DirectoryEntry>> {
        let request = DereferenceRequest {
            base_dn: base_dn.to_string(),
            deref_attribute: deref_attribute.to_string(),
            attributes: attributes.to_vec(),
            timeout: self.timeout,
        };
        debug!(base = %base_dn, attribute = %deref_attribute, "Dereference search");

        let raw = self.transport.dereference_search(&request).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for entry in &raw {
            if !map.matches(entry) {
                debug!(dn = %entry.dn, "Dereferenced entry does not match group map, skipping");
                continue;
            }
            entries.push(parse_entry(entry, Some(map))?);
        }
        Ok(entries)
    }
}
