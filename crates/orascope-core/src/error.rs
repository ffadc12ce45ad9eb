//! Error types for orascope

use crate::StatementKind;
use thiserror::Error;

/// Core error type for orascope operations
#[derive(Error, Debug)]
pub enum OrascopeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Disallowed statement: expected {expected} but statement starts with {found:?}")]
    DisallowedStatement {
        expected: StatementKind,
        found: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-transient SQL error from Oracle. `code` carries the ORA error
    /// number when the driver surfaced one.
    #[error("Query error (ORA-{code:05}): {message}")]
    Query { code: i32, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache corrupt: {0}")]
    CacheCorrupt(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrascopeError {
    /// Stable string code used in tool response envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            OrascopeError::NotFound(_) => "not_found",
            OrascopeError::InvalidArgument(_) => "invalid_argument",
            OrascopeError::DisallowedStatement { .. } => "disallowed_statement",
            OrascopeError::Connection(_) => "connection_error",
            OrascopeError::Query { .. } => "query_error",
            OrascopeError::Configuration(_) => "configuration_error",
            OrascopeError::CacheCorrupt(_) => "cache_corrupt",
            OrascopeError::Timeout(_) => "timeout",
            OrascopeError::Internal(_)
            | OrascopeError::Io(_)
            | OrascopeError::Serialization(_) => "internal",
        }
    }

    /// Whether a failed operation may be retried on a fresh session.
    ///
    /// ORA-03113/03114 (end-of-file / not connected), ORA-12537 (connection
    /// closed) and ORA-12514 (listener does not know of service) come and go
    /// with network partitions and instance restarts.
    pub fn is_transient(&self) -> bool {
        match self {
            OrascopeError::Connection(_) => true,
            OrascopeError::Query { code, .. } => {
                matches!(code, 3113 | 3114 | 12537 | 12514)
            }
            _ => false,
        }
    }
}

/// Result type alias for orascope operations
pub type Result<T> = std::result::Result<T, OrascopeError>;
