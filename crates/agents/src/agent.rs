//! Agent contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use atlaserp_ai::{AiError, Cache, CompletionClient, CompletionOptions};
use atlaserp_core::AgentName;
use atlaserp_messaging::{AgentMessage, Payload};

/// Tracked status of a registered agent.
///
/// ```text
/// (initialize ok) → idle → processing → idle
///                               └─────→ error → processing → ...
/// (initialize failed / unknown name)  → offline
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Processing,
    Error,
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

impl core::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A natural-language request routed to one agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    #[serde(default)]
    pub context: Payload,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl AgentRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: Payload) -> Self {
        self.context = context;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Result of a successful `Agent::process_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: AgentName,
    pub response: String,
    /// Agent-specific structured data (may be `null`).
    #[serde(default)]
    pub data: JsonValue,
}

impl AgentResponse {
    pub fn new(agent: AgentName, response: impl Into<String>) -> Self {
        Self {
            agent,
            response: response.into(),
            data: JsonValue::Null,
        }
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("agent not ready: {0}")]
    NotReady(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Completion(#[from] AiError),

    #[error("agent timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(String),
}

impl AgentError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Shared collaborators handed to every agent at construction.
#[derive(Clone)]
pub struct AgentCollaborators {
    pub completion: Arc<dyn CompletionClient>,
    pub cache: Arc<dyn Cache>,
    /// Conversation-memory window (`AI_CONTEXT_WINDOW`).
    pub context_window: usize,
    pub options: CompletionOptions,
}

impl core::fmt::Debug for AgentCollaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AgentCollaborators")
            .field("context_window", &self.context_window)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A unit of domain-specific request handling.
///
/// The orchestrator owns the lifecycle:
/// - `initialize` exactly once before registration (failure = never registered)
/// - `process_request` / `handle_message` any number of times, possibly concurrently
/// - `cleanup` once on shutdown
///
/// Implementations are `Send + Sync` and guard their own mutable state.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &AgentName;

    /// Human-readable capability list (introspection only).
    fn capabilities(&self) -> Vec<String>;

    async fn initialize(&self) -> Result<(), AgentError>;

    async fn process_request(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError>;

    /// Handle a queued message.
    ///
    /// `Some(payload)` is a reply. Replies to `request` messages are addressed
    /// back to the source; replies to anything else are only reported.
    async fn handle_message(&self, message: &AgentMessage) -> Result<Option<Payload>, AgentError>;

    async fn cleanup(&self) -> Result<(), AgentError>;
}
