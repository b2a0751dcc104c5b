//! Error types and handling for the Weft engine

use crate::key::KeyError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, WeftError>;

/// Primary error type for all engine operations
#[derive(thiserror::Error, Debug)]
pub enum WeftError {
    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource not found: {resource_type} {key}")]
    NotFound { resource_type: String, key: String },

    #[error("conflict writing {key}: {message}")]
    Conflict { key: String, message: String },

    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("validation failed for {key}: {message}")]
    Validation { key: String, message: String },

    #[error("terminal reconcile error for {key}: {message}")]
    Terminal { key: String, message: String },

    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl WeftError {
    /// Whether the worker runtime should retry this error with backoff.
    ///
    /// Validation and terminal errors are never retried; the entity's status
    /// records the cause and a later spec change re-enqueues the key.
    pub fn is_retryable(&self) -> bool {
        match self {
            WeftError::Conflict { .. } => true,
            WeftError::StoreUnavailable { .. } => true,
            WeftError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            WeftError::Key(_) => "key",
            WeftError::Serialization(_) => "serialization",
            WeftError::Config(_) => "config",
            WeftError::NotFound { .. } => "not_found",
            WeftError::Conflict { .. } => "conflict",
            WeftError::StoreUnavailable { .. } => "store_unavailable",
            WeftError::Validation { .. } => "validation",
            WeftError::Terminal { .. } => "terminal",
            WeftError::Timeout { .. } => "timeout",
            WeftError::Internal { .. } => "internal",
        }
    }
}
