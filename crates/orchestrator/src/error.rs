use thiserror::Error;

use atlaserp_agents::AgentError;
use atlaserp_ai::{AiError, CacheError};
use atlaserp_core::AgentName;

/// Orchestrator failure taxonomy.
///
/// Most variants never reach callers as `Err`: `process_request` turns them
/// into an error `RequestOutcome`, and message dispatch turns them into
/// delivery-report entries and log lines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    /// Operation attempted before `initialize()` completed or after `cleanup()`.
    #[error("orchestrator not initialized")]
    NotInitialized,

    #[error("agent '{0}' is not registered")]
    UnknownAgent(String),

    #[error("agent '{0}' is already registered")]
    DuplicateAgent(AgentName),

    #[error("agent '{agent}' failed to initialize: {reason}")]
    AgentInitialization { agent: String, reason: String },

    #[error("agent '{agent}' failed: {source}")]
    AgentExecution {
        agent: AgentName,
        #[source]
        source: AgentError,
    },

    #[error("completion failed: {0}")]
    UpstreamCompletion(#[source] AiError),

    /// A shared collaborator (completion client, cache) is unusable.
    #[error("shared collaborator unavailable: {0}")]
    Collaborator(String),

    #[error("message queue is closed")]
    QueueClosed,
}

impl OrchestratorError {
    /// Stable machine-readable code (used by the HTTP layer).
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::UnknownAgent(_) => "unknown_agent",
            Self::DuplicateAgent(_) => "duplicate_agent",
            Self::AgentInitialization { .. } => "agent_initialization",
            Self::AgentExecution { .. } => "agent_execution",
            Self::UpstreamCompletion(_) => "upstream_completion",
            Self::Collaborator(_) => "collaborator_unavailable",
            Self::QueueClosed => "queue_closed",
        }
    }
}

impl From<CacheError> for OrchestratorError {
    fn from(value: CacheError) -> Self {
        Self::Collaborator(format!("cache: {value}"))
    }
}
