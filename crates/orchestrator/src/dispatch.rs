//! Single-message dispatch: routing by target, per-delivery isolation, fan-in.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use atlaserp_agents::{Agent, AgentError};
use atlaserp_core::AgentName;
use atlaserp_messaging::{AgentMessage, DeliveryReport, MessageType, Payload, Target};

use crate::registry::AgentRegistry;

/// Report for one message plus the reply envelopes to enqueue next.
#[derive(Debug)]
pub struct Dispatched {
    pub report: DeliveryReport,
    pub follow_ups: Vec<AgentMessage>,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    agent_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<AgentRegistry>, agent_timeout: Duration) -> Self {
        Self {
            registry,
            agent_timeout,
        }
    }

    /// Deliver `message` to its target(s) and wait for every delivery.
    ///
    /// Never fails: handler errors, timeouts and panics are recorded in the
    /// report. An unknown unicast target is recorded as dropped.
    pub async fn dispatch(&self, message: AgentMessage) -> Dispatched {
        let recipients = match message.target() {
            Target::Broadcast => self.registry.recipients_except(message.source()),
            Target::Agent(name) => match self.registry.get(name.as_str()) {
                Some(agent) => vec![agent],
                None => {
                    warn!(
                        message_id = %message.id(),
                        target = %name,
                        "dropping message for unknown agent"
                    );
                    return Dispatched {
                        report: DeliveryReport::dropped(
                            message.id(),
                            message.target().clone(),
                            format!("unknown target agent '{name}'"),
                        )
                        .finish(),
                        follow_ups: Vec::new(),
                    };
                }
            },
        };

        let message = Arc::new(message);
        let handles: Vec<(AgentName, JoinHandle<Result<Option<Payload>, AgentError>>)> = recipients
            .into_iter()
            .map(|agent| {
                let name = agent.name().clone();
                self.registry.begin_dispatch(name.as_str());
                let handle = tokio::spawn(deliver(agent, message.clone(), self.agent_timeout));
                (name, handle)
            })
            .collect();

        let mut report = DeliveryReport::new(message.id(), message.target().clone());
        let mut follow_ups = Vec::new();

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(reply)) => {
                    self.registry.finish_dispatch(name.as_str(), true);
                    if let Some(payload) = &reply {
                        if let Some(response) = self.follow_up(&message, &name, payload.clone()) {
                            follow_ups.push(response);
                        }
                    }
                    report.record_success(name, reply);
                }
                Ok(Err(err)) => {
                    self.registry.finish_dispatch(name.as_str(), false);
                    warn!(
                        message_id = %message.id(),
                        agent = %name,
                        error = %err,
                        "message handler failed"
                    );
                    report.record_failure(name, err.to_string());
                }
                Err(join_err) => {
                    self.registry.finish_dispatch(name.as_str(), false);
                    let reason = if join_err.is_panic() {
                        "agent panicked".to_string()
                    } else {
                        format!("delivery aborted: {join_err}")
                    };
                    warn!(
                        message_id = %message.id(),
                        agent = %name,
                        error = %reason,
                        "message handler crashed"
                    );
                    report.record_failure(name, reason);
                }
            }
        }

        let report = report.finish();
        debug!(
            message_id = %report.message_id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "message dispatched"
        );
        Dispatched { report, follow_ups }
    }

    /// Reply envelope back to the source, if `message` is a request and its
    /// source is a registered agent. Replies to anything else stay in the report.
    fn follow_up(
        &self,
        message: &AgentMessage,
        responder: &AgentName,
        payload: Payload,
    ) -> Option<AgentMessage> {
        if message.message_type() != MessageType::Request {
            debug!(
                message_id = %message.id(),
                agent = %responder,
                message_type = ?message.message_type(),
                "reply to a non-request kept in the report"
            );
            return None;
        }
        let response = message.response_from(responder.clone(), payload)?;
        match response.target() {
            Target::Agent(origin) if self.registry.contains(origin.as_str()) => Some(response),
            _ => None,
        }
    }
}

async fn deliver(
    agent: Arc<dyn Agent>,
    message: Arc<AgentMessage>,
    timeout: Duration,
) -> Result<Option<Payload>, AgentError> {
    match tokio::time::timeout(timeout, agent.handle_message(&message)).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::TimedOut(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestAgent;
    use atlaserp_agents::AgentStatus;
    use atlaserp_messaging::Source;
    use serde_json::json;

    fn name(s: &str) -> AgentName {
        AgentName::new(s).unwrap()
    }

    fn payload() -> Payload {
        json!({"event": "period_closed"}).as_object().cloned().unwrap()
    }

    fn registry_with(agents: Vec<Arc<TestAgent>>) -> Arc<AgentRegistry> {
        let registry = Arc::new(AgentRegistry::new());
        for agent in agents {
            registry.register(agent).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone_but_the_source() {
        let crm = Arc::new(TestAgent::named("crm"));
        let hr = Arc::new(TestAgent::named("hr"));
        let sales = Arc::new(TestAgent::named("sales"));
        let registry = registry_with(vec![crm.clone(), hr.clone(), sales.clone()]);
        let dispatcher = Dispatcher::new(registry, Duration::from_secs(1));

        let out = dispatcher
            .dispatch(AgentMessage::broadcast_event(name("hr"), payload()))
            .await;

        assert_eq!(out.report.delivered, vec![name("crm"), name("sales")]);
        assert!(out.report.is_clean());
        assert_eq!(crm.received().len(), 1);
        assert!(hr.received().is_empty());
        assert_eq!(sales.received().len(), 1);
    }

    #[tokio::test]
    async fn failures_and_panics_are_isolated_per_recipient() {
        let ok = Arc::new(TestAgent::named("crm"));
        let failing = Arc::new(TestAgent::named("hr").failing_messages());
        let panicking = Arc::new(TestAgent::named("sales").panicking_messages());
        let registry = registry_with(vec![ok.clone(), failing, panicking]);
        let dispatcher = Dispatcher::new(registry.clone(), Duration::from_secs(1));

        let out = dispatcher
            .dispatch(AgentMessage::broadcast_event(Source::External, payload()))
            .await;

        assert_eq!(out.report.delivered, vec![name("crm")]);
        assert_eq!(out.report.failed.len(), 2);
        assert_eq!(out.report.failed[0].agent, name("hr"));
        assert_eq!(out.report.failed[0].error, "message rejected");
        assert_eq!(out.report.failed[1].agent, name("sales"));
        assert_eq!(out.report.failed[1].error, "agent panicked");

        assert_eq!(registry.status("crm"), AgentStatus::Idle);
        assert_eq!(registry.status("hr"), AgentStatus::Error);
        assert_eq!(registry.status("sales"), AgentStatus::Error);
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let slow = Arc::new(TestAgent::named("crm").with_delay(Duration::from_millis(500)));
        let registry = registry_with(vec![slow]);
        let dispatcher = Dispatcher::new(registry.clone(), Duration::from_millis(20));

        let msg = AgentMessage::new(MessageType::Event, Source::External, name("crm"), payload());
        let out = dispatcher.dispatch(msg).await;

        assert_eq!(out.report.failed.len(), 1);
        assert!(out.report.failed[0].error.contains("timed out"));
        assert_eq!(registry.status("crm"), AgentStatus::Error);
    }

    #[tokio::test]
    async fn unknown_target_is_dropped() {
        let dispatcher = Dispatcher::new(registry_with(vec![]), Duration::from_secs(1));
        let msg = AgentMessage::new(MessageType::Request, Source::External, name("ghost"), payload());
        let id = msg.id();

        let out = dispatcher.dispatch(msg).await;

        assert_eq!(out.report.message_id, id);
        assert_eq!(out.report.attempted(), 0);
        assert!(out.report.dropped.unwrap().contains("ghost"));
        assert!(out.follow_ups.is_empty());
    }

    #[tokio::test]
    async fn replies_to_agents_become_follow_ups() {
        let crm = Arc::new(TestAgent::named("crm"));
        let sales = Arc::new(TestAgent::named("sales").replying());
        let registry = registry_with(vec![crm, sales]);
        let dispatcher = Dispatcher::new(registry, Duration::from_secs(1));

        let request = AgentMessage::new(MessageType::Request, name("crm"), name("sales"), payload());
        let out = dispatcher.dispatch(request).await;

        assert_eq!(out.report.replies.len(), 1);
        assert_eq!(out.follow_ups.len(), 1);
        let response = &out.follow_ups[0];
        assert_eq!(response.message_type(), MessageType::Response);
        assert_eq!(response.target(), &Target::Agent(name("crm")));
        assert_eq!(response.payload()["ack"], "sales");
    }

    #[tokio::test]
    async fn replies_to_responses_are_not_re_enqueued() {
        let crm = Arc::new(TestAgent::named("crm").replying_to_everything());
        let sales = Arc::new(TestAgent::named("sales").replying_to_everything());
        let dispatcher = Dispatcher::new(registry_with(vec![crm, sales]), Duration::from_secs(1));

        let request = AgentMessage::new(MessageType::Request, name("crm"), name("sales"), payload());
        let out = dispatcher.dispatch(request).await;
        assert_eq!(out.follow_ups.len(), 1);

        let response = out.follow_ups.into_iter().next().unwrap();
        let out = dispatcher.dispatch(response).await;
        assert_eq!(out.report.delivered, vec![name("crm")]);
        assert_eq!(out.report.replies.len(), 1);
        assert!(out.follow_ups.is_empty());

        let event = AgentMessage::new(MessageType::Event, name("crm"), name("sales"), payload());
        let out = dispatcher.dispatch(event).await;
        assert_eq!(out.report.replies.len(), 1);
        assert!(out.follow_ups.is_empty());
    }

    #[tokio::test]
    async fn replies_to_external_stay_in_the_report() {
        let sales = Arc::new(TestAgent::named("sales").replying());
        let dispatcher = Dispatcher::new(registry_with(vec![sales]), Duration::from_secs(1));

        let request =
            AgentMessage::new(MessageType::Request, Source::External, name("sales"), payload());
        let out = dispatcher.dispatch(request).await;

        assert_eq!(out.report.replies.len(), 1);
        assert!(out.follow_ups.is_empty());
    }
}
