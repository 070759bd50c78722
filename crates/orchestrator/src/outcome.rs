//! Request outcome: the single result shape of `process_request`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use atlaserp_agents::AgentResponse;
use atlaserp_core::AgentName;

use crate::error::OrchestratorError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Result of one natural-language request. Failures are values, not `Err`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub status: OutcomeStatus,
    pub agent: Option<String>,
    pub response: Option<String>,
    pub data: Option<JsonValue>,
    pub error: Option<String>,
    #[serde(default)]
    pub candidates: Vec<AgentName>,
    pub timestamp: DateTime<Utc>,
}

impl RequestOutcome {
    pub fn success(agent: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            agent: Some(agent.into()),
            response: Some(response.into()),
            data: None,
            error: None,
            candidates: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: &OrchestratorError) -> Self {
        let agent = match error {
            OrchestratorError::UnknownAgent(name) => Some(name.clone()),
            OrchestratorError::AgentExecution { agent, .. } => Some(agent.to_string()),
            _ => None,
        };
        Self {
            status: OutcomeStatus::Error,
            agent,
            response: None,
            data: None,
            error: Some(error.to_string()),
            candidates: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = (!data.is_null()).then_some(data);
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<AgentName>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

impl From<AgentResponse> for RequestOutcome {
    fn from(value: AgentResponse) -> Self {
        Self::success(value.agent.into_string(), value.response).with_data(value.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlaserp_agents::AgentError;
    use serde_json::json;

    #[test]
    fn agent_response_becomes_success() {
        let name = AgentName::new("accounting").unwrap();
        let outcome: RequestOutcome = AgentResponse::new(name, "3 invoices overdue")
            .with_data(json!({"domain": "accounting"}))
            .into();

        assert!(outcome.is_success());
        assert_eq!(outcome.agent.as_deref(), Some("accounting"));
        assert_eq!(outcome.response.as_deref(), Some("3 invoices overdue"));
        assert_eq!(outcome.data, Some(json!({"domain": "accounting"})));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn execution_failure_keeps_agent_name() {
        let err = OrchestratorError::AgentExecution {
            agent: AgentName::new("crm").unwrap(),
            source: AgentError::failed("crm backend down"),
        };
        let outcome = RequestOutcome::failure(&err);

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.agent.as_deref(), Some("crm"));
        assert!(outcome.error.unwrap().contains("crm backend down"));
    }

    #[test]
    fn not_initialized_has_no_agent() {
        let outcome = RequestOutcome::failure(&OrchestratorError::NotInitialized);
        assert_eq!(outcome.agent, None);
        assert_eq!(outcome.error.as_deref(), Some("orchestrator not initialized"));
    }

    #[test]
    fn wire_shape_uses_lowercase_status_and_nulls() {
        let outcome = RequestOutcome::success("general", "hello");
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["data"], JsonValue::Null);
        assert_eq!(value["error"], JsonValue::Null);
        assert_eq!(value["candidates"], json!([]));

        let back: RequestOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }
}
