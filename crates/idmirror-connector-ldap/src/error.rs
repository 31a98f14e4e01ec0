//! Initgroups error types

use thiserror::Error;

use idmirror_cache::CacheError;
use idmirror_connector::ConnectorError;

/// Broad category of a failed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing search base, unsupported schema and the like. Not retried.
    Configuration,
    /// Search failure or malformed reply.
    Directory,
    /// Fetched data does not add up.
    InvalidState,
    /// Cache storage failure.
    Cache,
}

/// Error returned by an initgroups resolution.
#[derive(Debug, Error)]
pub enum InitgroupsError {
    #[error(transparent)]
    Directory(#[from] ConnectorError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The user does not exist under any user search base.
    #[error("user '{name}' not found")]
    UserNotFound { name: String },

    /// Fetched data is inconsistent.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl InitgroupsError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        InitgroupsError::InvalidState {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        InitgroupsError::Internal {
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            InitgroupsError::Directory(e) if e.is_configuration_error() => {
                ErrorClass::Configuration
            }
            InitgroupsError::Directory(ConnectorError::InvalidData { .. }) => {
                ErrorClass::InvalidState
            }
            InitgroupsError::Directory(_) => ErrorClass::Directory,
            InitgroupsError::Cache(_) => ErrorClass::Cache,
            InitgroupsError::UserNotFound { .. }
            | InitgroupsError::InvalidState { .. }
            | InitgroupsError::Internal { .. } => ErrorClass::InvalidState,
        }
    }

    /// Get a stable error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            InitgroupsError::Directory(e) => e.error_code(),
            InitgroupsError::Cache(e) => e.error_code(),
            InitgroupsError::UserNotFound { .. } => "USER_NOT_FOUND",
            InitgroupsError::InvalidState { .. } => "INVALID_STATE",
            InitgroupsError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, InitgroupsError::Directory(e) if e.is_transient())
    }
}

/// Result type for initgroups operations.
pub type InitgroupsResult<T> = Result<T, InitgroupsError>;
