//! `DomainAgent`: the `Agent` implementation for every built-in `AgentKind`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use atlaserp_ai::{ChatMessage, ConversationMemory};
use atlaserp_core::AgentName;
use atlaserp_messaging::{AgentMessage, MessageType, Payload};

use crate::agent::{Agent, AgentCollaborators, AgentError, AgentRequest, AgentResponse};
use crate::kind::AgentKind;
use crate::prompt;

/// LLM-backed domain agent.
///
/// - Requests: system prompt + recent memory + the user's request.
/// - Queued `request` messages: answered with a `{"response": ...}` reply.
/// - Queued `event`/`response` messages: noted in memory, no reply.
#[derive(Debug)]
pub struct DomainAgent {
    kind: AgentKind,
    name: AgentName,
    collaborators: AgentCollaborators,
    memory: Mutex<ConversationMemory>,
    ready: AtomicBool,
    requests_served: AtomicU64,
    messages_handled: AtomicU64,
}

impl DomainAgent {
    pub fn new(kind: AgentKind, collaborators: AgentCollaborators) -> Result<Self, AgentError> {
        let name = kind
            .agent_name()
            .map_err(|e| AgentError::failed(format!("invalid agent name: {e}")))?;
        let memory = Mutex::new(ConversationMemory::new(collaborators.context_window));

        Ok(Self {
            kind,
            name,
            collaborators,
            memory,
            ready: AtomicBool::new(false),
            requests_served: AtomicU64::new(0),
            messages_handled: AtomicU64::new(0),
        })
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub fn messages_handled(&self) -> u64 {
        self.messages_handled.load(Ordering::Relaxed)
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    fn ensure_ready(&self) -> Result<(), AgentError> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AgentError::NotReady(self.name.to_string()))
        }
    }

    /// System prompt + memory snapshot + `user`. The memory lock is not held
    /// across the completion call.
    async fn conversation(&self, user: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.kind.system_prompt())];
        messages.extend(self.memory.lock().await.messages());
        messages.push(ChatMessage::user(user));
        messages
    }

    async fn complete(&self, user: &str) -> Result<String, AgentError> {
        let messages = self.conversation(user).await;
        let text = self
            .collaborators
            .completion
            .complete(&messages, self.collaborators.options)
            .await?;

        let mut memory = self.memory.lock().await;
        memory.push(ChatMessage::user(user));
        memory.push(ChatMessage::assistant(text.clone()));
        Ok(text)
    }
}

#[async_trait]
impl Agent for DomainAgent {
    fn name(&self) -> &AgentName {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.kind
            .capabilities()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        self.memory.lock().await.clear();
        self.ready.store(true, Ordering::Release);
        debug!(agent = %self.name, "domain agent initialized");
        Ok(())
    }

    async fn process_request(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        self.ensure_ready()?;
        if request.message.trim().is_empty() {
            return Err(AgentError::InvalidInput("request message is empty".to_string()));
        }

        let user = prompt::with_context(&request.message, &request.context);
        let text = self.complete(&user).await?;
        self.requests_served.fetch_add(1, Ordering::Relaxed);

        Ok(AgentResponse::new(self.name.clone(), text).with_data(json!({
            "domain": self.kind.as_str(),
            "capabilities": self.kind.capabilities(),
            "user_id": request.user_id,
        })))
    }

    async fn handle_message(&self, message: &AgentMessage) -> Result<Option<Payload>, AgentError> {
        self.ensure_ready()?;
        self.messages_handled.fetch_add(1, Ordering::Relaxed);

        match message.message_type() {
            MessageType::Request => {
                let query = prompt::payload_query(message.payload());
                let text = self.complete(&query).await?;

                let mut reply = Payload::new();
                reply.insert("response".to_string(), json!(text));
                reply.insert("in_reply_to".to_string(), json!(message.id()));
                Ok(Some(reply))
            }
            MessageType::Event | MessageType::Response => {
                let note = format!(
                    "{} from {}: {}",
                    match message.message_type() {
                        MessageType::Event => "event",
                        _ => "response",
                    },
                    message.source(),
                    serde_json::Value::Object(message.payload().clone())
                );
                self.memory.lock().await.push(ChatMessage::system(note));
                Ok(None)
            }
        }
    }

    async fn cleanup(&self) -> Result<(), AgentError> {
        self.ready.store(false, Ordering::Release);
        self.memory.lock().await.clear();
        debug!(agent = %self.name, "domain agent cleaned up");
        Ok(())
    }
}
