use serde::{Deserialize, Serialize};

use atlaserp_agents::AgentRequest;
use atlaserp_core::MessageId;
use atlaserp_messaging::{MessageType, Payload, Priority};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<Payload>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ChatRequest {
    /// `header_user` is used when the body carries no `user_id`.
    pub fn into_agent_request(self, header_user: Option<&str>) -> AgentRequest {
        let mut request = AgentRequest::new(self.message);
        if let Some(context) = self.context {
            request = request.with_context(context);
        }
        match self.user_id.as_deref().or(header_user) {
            Some(user) => request.with_user(user),
            None => request,
        }
    }
}

/// Envelope fields accepted by `POST /ai/messages`; `source` defaults to `external`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message_type: MessageType,
    #[serde(default)]
    pub source: Option<String>,
    pub target: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: MessageId,
    pub status: &'static str,
}
