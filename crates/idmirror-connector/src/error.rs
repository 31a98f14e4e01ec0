//! Directory-side error types
//!
//! Error definitions with transient/permanent classification. Configuration
//! errors are surfaced before any I/O, directory errors abort the current
//! resolution call.

use thiserror::Error;

/// Error that can occur while talking to the directory or preparing a request.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Configuration errors (permanent)
    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Schema variant is not supported.
    #[error("unsupported schema variant: {schema}")]
    UnsupportedSchema { schema: String },

    // Connection errors (usually transient)
    /// Failed to establish connection to the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection or request timed out.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    /// Invalid bind credentials.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    // Protocol errors
    /// A search against one base failed.
    #[error("search failed under '{base}': {message}")]
    SearchFailed {
        base: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The transport does not implement dereference searches.
    #[error("dereference search is not supported by this transport")]
    DereferenceUnsupported,

    /// A returned entry could not be parsed with the active attribute map.
    #[error("malformed entry: {message}")]
    MalformedEntry { message: String },

    /// An attribute value has an unexpected format.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    // Internal errors
    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ConnectorError {
    /// Check if this error is transient and the operation could be retried
    /// by a higher layer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. } | ConnectorError::ConnectionTimeout { .. }
        )
    }

    /// Check if this error stems from configuration rather than the directory.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ConnectorError::InvalidConfiguration { .. } | ConnectorError::UnsupportedSchema { .. }
        )
    }

    /// Get a stable error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            ConnectorError::UnsupportedSchema { .. } => "UNSUPPORTED_SCHEMA",
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            ConnectorError::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ConnectorError::SearchFailed { .. } => "SEARCH_FAILED",
            ConnectorError::DereferenceUnsupported => "DEREFERENCE_UNSUPPORTED",
            ConnectorError::MalformedEntry { .. } => "MALFORMED_ENTRY",
            ConnectorError::InvalidData { .. } => "INVALID_DATA",
            ConnectorError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    pub fn search_failed(base: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError::SearchFailed {
            base: base.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a search failed error with source.
    pub fn search_failed_with_source(
        base: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::SearchFailed {
            base: base.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a malformed entry error.
    pub fn malformed_entry(message: impl Into<String>) -> Self {
        ConnectorError::MalformedEntry {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        ConnectorError::InvalidData {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ConnectorError::Internal {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for directory operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
