//! LDAP directory transport
//!
//! Implements [`DirectoryTransport`] on top of `ldap3`.

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use idmirror_connector::config::SearchScope;
use idmirror_connector::entry::RawEntry;
use idmirror_connector::error::{ConnectorError, ConnectorResult};
use idmirror_connector::traits::{DirectoryTransport, SearchRequest};

use crate::config::LdapConfig;

/// Result code of a search whose base does not exist.
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_ADMIN_LIMIT_EXCEEDED: u32 = 11;
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Directory transport backed by one lazily opened LDAP connection.
pub struct LdapDirectory {
    config: LdapConfig,

    /// Cached LDAP connection (lazily initialized).
    connection: Arc<RwLock<Option<Ldap>>>,

    disposed: Arc<RwLock<bool>>,
}

impl LdapDirectory {
    /// Create a transport with the given configuration. No I/O happens here.
    pub fn new(config: LdapConfig) -> ConnectorResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            disposed: Arc::new(RwLock::new(false)),
        })
    }

    /// Get an LDAP connection, creating one if necessary.
    async fn get_connection(&self) -> ConnectorResult<Ldap> {
        if *self.disposed.read().await {
            return Err(ConnectorError::invalid_configuration(
                "directory transport has been disposed",
            ));
        }

        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let conn = self.create_connection().await?;
        *self.connection.write().await = Some(conn.clone());
        Ok(conn)
    }

    /// Open and bind a new connection.
    async fn create_connection(&self) -> ConnectorResult<Ldap> {
        let url = self.config.url();
        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.connection_timeout_secs))
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", url),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        if !self.config.bind_dn.is_empty() {
            let bind_dn = &self.config.bind_dn;
            let bind_password = self.config.bind_password.as_deref().unwrap_or("");
            debug!(bind_dn = %bind_dn, "Performing LDAP bind");

            let result = ldap
                .simple_bind(bind_dn, bind_password)
                .await
                .map_err(|e| {
                    ConnectorError::connection_failed_with_source(
                        format!("LDAP bind failed for {}", bind_dn),
                        e,
                    )
                })?;

            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(ConnectorError::AuthenticationFailed);
            }
            if result.rc != 0 {
                return Err(ConnectorError::connection_failed(format!(
                    "LDAP bind failed with code {}: {}",
                    result.rc, result.text
                )));
            }
        }

        info!(host = %self.config.host, "LDAP connection established");
        Ok(ldap)
    }

    /// Forget the cached connection so the next request reconnects.
    async fn reset_connection(&self) {
        *self.connection.write().await = None;
    }

    /// Unbind and refuse further requests.
    pub async fn dispose(&self) -> ConnectorResult<()> {
        *self.disposed.write().await = true;
        let conn = self.connection.write().await.take();
        if let Some(mut ldap) = conn {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "Error during LDAP unbind");
            }
        }
        info!(host = %self.config.host, "LDAP transport disposed");
        Ok(())
    }

    /// Map a transport failure, dropping the connection it happened on.
    async fn search_error(&self, request: &SearchRequest, error: LdapError) -> ConnectorError {
        self.reset_connection().await;
        match error {
            LdapError::Timeout { .. } => ConnectorError::ConnectionTimeout {
                timeout_secs: request.timeout.as_secs(),
            },
            e => ConnectorError::search_failed_with_source(&request.base, "LDAP search failed", e),
        }
    }

    /// Decide what a finished search's result code means for the entries
    /// already received: `Ok(true)` keeps them, `Ok(false)` means the base
    /// does not exist.
    fn accept_status(base: &str, rc: u32, text: &str) -> ConnectorResult<bool> {
        match rc {
            0 => Ok(true),
            RC_NO_SUCH_OBJECT => {
                debug!(base = %base, "Search base does not exist");
                Ok(false)
            }
            RC_SIZE_LIMIT_EXCEEDED | RC_ADMIN_LIMIT_EXCEEDED => {
                warn!(base = %base, rc, "Server limit reached, keeping partial results");
                Ok(true)
            }
            rc => Err(ConnectorError::search_failed(
                base,
                format!("result code {}: {}", rc, text),
            )),
        }
    }

    fn scope_to_ldap(scope: SearchScope) -> Scope {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }

    /// Convert an LDAP search entry, keeping text and binary values as bytes.
    fn entry_to_raw(entry: SearchEntry) -> RawEntry {
        let mut raw = RawEntry::new(entry.dn);
        for (name, values) in entry.attrs {
            raw.attrs
                .entry(name)
                .or_default()
                .extend(values.into_iter().map(String::into_bytes));
        }
        for (name, values) in entry.bin_attrs {
            raw.attrs.entry(name).or_default().extend(values);
        }
        raw
    }
}

#[async_trait]
impl DirectoryTransport for LdapDirectory {
    #[instrument(skip(self, request), fields(base = %request.base, scope = %request.scope))]
    async fn search(&self, request: &SearchRequest) -> ConnectorResult<Vec<RawEntry>> {
        let mut ldap = self.get_connection().await?;

        let attrs: Vec<String> = if request.attributes.is_empty() {
            vec!["*".to_string()]
        } else {
            request.attributes.clone()
        };

        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(self.config.page_size)),
        ];

        let mut stream = match ldap
            .with_timeout(request.timeout)
            .streaming_search_with(
                adapters,
                &request.base,
                Self::scope_to_ldap(request.scope),
                &request.filter,
                attrs,
            )
            .await
        {
            Ok(stream) => stream,
            Err(e) => return Err(self.search_error(request, e).await),
        };

        let mut entries = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break,
                Err(e) => return Err(self.search_error(request, e).await),
            }
        }
        let status = stream.finish().await;

        if !Self::accept_status(&request.base, status.rc, &status.text)? {
            return Ok(Vec::new());
        }

        let entries: Vec<RawEntry> = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(Self::entry_to_raw)
            .collect();

        debug!(count = entries.len(), "LDAP search completed");
        Ok(entries)
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("config", &self.config.redacted())
            .finish()
    }
}
