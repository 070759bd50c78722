use thiserror::Error;

/// Failure of the completion capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("invalid completion input: {0}")]
    InvalidInput(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("completion backend unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AiError {
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::InferenceFailed(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
