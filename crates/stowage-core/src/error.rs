//! Core error types for Stowage
//!
//! Every attachment and thumbnail operation reports failures through
//! [`StowError`]. Callers decide how to surface a failure (404, JSON
//! envelope, fallback image) from its kind alone.

use thiserror::Error;

/// Core error type for all Stowage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StowError {
    /// Missing or invalid caller input (e.g. no target id, no owner)
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Byte store or metadata store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unrecognized or corrupt image input
    #[error("Decode error: {0}")]
    Decode(String),

    /// Image could not be re-encoded in the target format
    #[error("Encode error: {0}")]
    Encode(String),

    /// Invalid static configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StowError {
    pub fn validation(message: impl Into<String>) -> Self {
        StowError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        StowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(message: impl std::fmt::Display) -> Self {
        StowError::Storage(message.to_string())
    }

    /// Whether the error was caused by the caller rather than the system
    pub fn is_user_error(&self) -> bool {
        matches!(self, StowError::Validation(_) | StowError::NotFound { .. })
    }

    pub fn status_code(&self) -> u16 {
        match self {
            StowError::Validation(_) | StowError::NotFound { .. } => 404,
            StowError::Decode(_) | StowError::Encode(_) => 422,
            StowError::Storage(_) | StowError::Config(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StowError::Validation(_) => "validation_failed",
            StowError::NotFound { .. } => "not_found",
            StowError::Storage(_) => "storage_error",
            StowError::Decode(_) => "decode_error",
            StowError::Encode(_) => "encode_error",
            StowError::Config(_) => "configuration_error",
        }
    }
}

/// Standard Result type for Stowage operations
pub type StowResult<T> = Result<T, StowError>;
