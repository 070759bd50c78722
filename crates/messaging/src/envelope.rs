use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use atlaserp_core::agent_name::{BROADCAST, EXTERNAL};
use atlaserp_core::{AgentName, CoreError, MessageId};

/// Opaque key-value payload carried by an envelope.
pub type Payload = serde_json::Map<String, JsonValue>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Event,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Producer of a message: an external caller or a registered agent.
///
/// Serialises as a plain string (`"external"` or the agent name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Source {
    External,
    Agent(AgentName),
}

impl Source {
    pub fn agent(&self) -> Option<&AgentName> {
        match self {
            Source::External => None,
            Source::Agent(name) => Some(name),
        }
    }

    pub fn is_agent(&self, name: &AgentName) -> bool {
        self.agent() == Some(name)
    }
}

impl From<AgentName> for Source {
    fn from(value: AgentName) -> Self {
        Source::Agent(value)
    }
}

impl TryFrom<String> for Source {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == EXTERNAL {
            return Ok(Source::External);
        }
        AgentName::new(value).map(Source::Agent)
    }
}

impl From<Source> for String {
    fn from(value: Source) -> Self {
        match value {
            Source::External => EXTERNAL.to_string(),
            Source::Agent(name) => name.into_string(),
        }
    }
}

impl core::fmt::Display for Source {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Source::External => f.write_str(EXTERNAL),
            Source::Agent(name) => core::fmt::Display::fmt(name, f),
        }
    }
}

/// Addressee of a message: one agent, or every registered agent except the source.
///
/// Serialises as a plain string (`"broadcast"` or the agent name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    Broadcast,
    Agent(AgentName),
}

impl Target {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Target::Broadcast)
    }
}

impl From<AgentName> for Target {
    fn from(value: AgentName) -> Self {
        Target::Agent(value)
    }
}

impl TryFrom<String> for Target {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == BROADCAST {
            return Ok(Target::Broadcast);
        }
        AgentName::new(value).map(Target::Agent)
    }
}

impl From<Target> for String {
    fn from(value: Target) -> Self {
        match value {
            Target::Broadcast => BROADCAST.to_string(),
            Target::Agent(name) => name.into_string(),
        }
    }
}

impl core::fmt::Display for Target {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Target::Broadcast => f.write_str(BROADCAST),
            Target::Agent(name) => core::fmt::Display::fmt(name, f),
        }
    }
}

/// Envelope routed through the orchestrator's message queue.
///
/// Notes:
/// - **Immutable once queued**: fields are private; builders consume `self`.
/// - **Consumed once**: the drain loop takes ownership when it pops the envelope.
/// - `payload` is opaque to the orchestrator; only agents interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    id: MessageId,
    message_type: MessageType,
    source: Source,
    target: Target,
    payload: Payload,
    #[serde(default)]
    priority: Priority,
    timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        message_type: MessageType,
        source: impl Into<Source>,
        target: impl Into<Target>,
        payload: Payload,
    ) -> Self {
        Self {
            id: MessageId::new(),
            message_type,
            source: source.into(),
            target: target.into(),
            payload,
            priority: Priority::default(),
            timestamp: Utc::now(),
        }
    }

    /// Convenience for an event published to every agent.
    pub fn broadcast_event(source: impl Into<Source>, payload: Payload) -> Self {
        Self::new(MessageType::Event, source, Target::Broadcast, payload)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Build the `response` envelope an agent sends back to this message's source.
    ///
    /// Returns `None` when the source is external: there is no queue address to
    /// reply to, so the reply only lives in the delivery report.
    pub fn response_from(&self, responder: AgentName, payload: Payload) -> Option<AgentMessage> {
        let origin = self.source.agent()?.clone();
        Some(
            AgentMessage::new(MessageType::Response, responder, origin, payload)
                .with_priority(self.priority),
        )
    }
}
