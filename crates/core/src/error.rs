//! Core error model.

use thiserror::Error;

/// Result type used by the core primitives.
pub type CoreResult<T> = Result<T, CoreError>;

/// Validation failures for core primitives.
///
/// Keep this focused on deterministic input problems. Runtime failures
/// (agents, completion, cache) have their own error types in the crates that
/// own those concerns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A name collides with a reserved routing keyword.
    #[error("reserved name: {0}")]
    Reserved(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn reserved(msg: impl Into<String>) -> Self {
        Self::Reserved(msg.into())
    }
}
