//! Cache error types

use thiserror::Error;

use crate::records::MemberType;

/// Error raised by a cache store or one of its transactions.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Entity referenced by an operation does not exist.
    #[error("{kind} '{name}' not found in cache")]
    NotFound { kind: MemberType, name: String },

    /// Record already exists and must not be overwritten.
    #[error("{kind} '{name}' already exists in cache")]
    Conflict { kind: MemberType, name: String },

    /// Transaction could not be started, committed or cancelled.
    #[error("transaction failed: {message}")]
    Transaction { message: String },

    /// Underlying storage failure.
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CacheError {
    pub fn not_found(kind: MemberType, name: impl Into<String>) -> Self {
        CacheError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        CacheError::Transaction {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        CacheError::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Get a stable error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            CacheError::NotFound { .. } => "CACHE_NOT_FOUND",
            CacheError::Conflict { .. } => "CACHE_CONFLICT",
            CacheError::Transaction { .. } => "CACHE_TRANSACTION",
            CacheError::Storage { .. } => "CACHE_STORAGE",
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
