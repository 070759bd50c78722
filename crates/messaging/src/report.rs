//! Fan-in record for one drained message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atlaserp_core::{AgentName, MessageId};

use crate::envelope::{Payload, Target};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub agent: AgentName,
    pub error: String,
}

/// Reply payload returned by an agent's message handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub agent: AgentName,
    pub payload: Payload,
}

/// Outcome of delivering one message to its target(s).
///
/// A broadcast produces one report covering every recipient: successes,
/// failures and replies are collected here instead of being propagated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub message_id: MessageId,
    pub target: Target,
    pub delivered: Vec<AgentName>,
    pub failed: Vec<DeliveryFailure>,
    pub replies: Vec<AgentReply>,
    /// Set when the message never reached any handler (e.g. unknown target).
    pub dropped: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl DeliveryReport {
    pub fn new(message_id: MessageId, target: Target) -> Self {
        Self {
            message_id,
            target,
            delivered: Vec::new(),
            failed: Vec::new(),
            replies: Vec::new(),
            dropped: None,
            completed_at: Utc::now(),
        }
    }

    pub fn dropped(message_id: MessageId, target: Target, reason: impl Into<String>) -> Self {
        let mut report = Self::new(message_id, target);
        report.dropped = Some(reason.into());
        report
    }

    pub fn record_success(&mut self, agent: AgentName, reply: Option<Payload>) {
        if let Some(payload) = reply {
            self.replies.push(AgentReply {
                agent: agent.clone(),
                payload,
            });
        }
        self.delivered.push(agent);
    }

    pub fn record_failure(&mut self, agent: AgentName, error: impl Into<String>) {
        self.failed.push(DeliveryFailure {
            agent,
            error: error.into(),
        });
    }

    /// Stamp the completion time and sort recipients by name for stable output.
    pub fn finish(mut self) -> Self {
        self.delivered.sort();
        self.failed.sort_by(|a, b| a.agent.cmp(&b.agent));
        self.replies.sort_by(|a, b| a.agent.cmp(&b.agent));
        self.completed_at = Utc::now();
        self
    }

    /// Number of handlers that were invoked (successfully or not).
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    /// No failures and not dropped.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.dropped.is_none()
    }
}
