//! Scriptable `Agent` for orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use atlaserp_agents::{Agent, AgentError, AgentRequest, AgentResponse};
use atlaserp_core::AgentName;
use atlaserp_messaging::{AgentMessage, MessageType, Payload};

#[derive(Debug, Default)]
pub(crate) struct TestAgent {
    name: Option<AgentName>,
    capabilities: Vec<String>,
    fail_init: bool,
    fail_requests: bool,
    fail_messages: bool,
    panic_on_message: bool,
    reply_to_requests: bool,
    reply_always: bool,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
    received: Mutex<Vec<AgentMessage>>,
    requests: Mutex<Vec<AgentRequest>>,
    cleanups: AtomicUsize,
}

impl TestAgent {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            name: Some(AgentName::new(name).unwrap()),
            ..Self::default()
        }
    }

    pub(crate) fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }

    pub(crate) fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub(crate) fn failing_requests(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    pub(crate) fn failing_messages(mut self) -> Self {
        self.fail_messages = true;
        self
    }

    pub(crate) fn panicking_messages(mut self) -> Self {
        self.panic_on_message = true;
        self
    }

    /// Answer `request` messages with `{"ack": <name>}`.
    pub(crate) fn replying(mut self) -> Self {
        self.reply_to_requests = true;
        self
    }

    /// Answer every message, whatever its type, with `{"ack": <name>}`.
    pub(crate) fn replying_to_everything(mut self) -> Self {
        self.reply_always = true;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block `process_request` until the returned `Notify` is signalled.
    pub(crate) fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Signalled each time `process_request` starts.
    pub(crate) fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    pub(crate) fn into_dyn(self) -> Arc<dyn Agent> {
        Arc::new(self)
    }

    pub(crate) fn received(&self) -> Vec<AgentMessage> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn requests(&self) -> Vec<AgentRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    fn agent_name(&self) -> &AgentName {
        self.name.as_ref().expect("TestAgent built without a name")
    }
}

#[async_trait]
impl Agent for TestAgent {
    fn name(&self) -> &AgentName {
        self.agent_name()
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        if self.fail_init {
            return Err(AgentError::failed("init refused"));
        }
        Ok(())
    }

    async fn process_request(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        self.entered.notify_one();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_requests {
            return Err(AgentError::failed(format!("{} exploded", self.agent_name())));
        }
        Ok(
            AgentResponse::new(self.agent_name().clone(), format!("handled: {}", request.message))
                .with_data(json!({"agent": self.agent_name().as_str()})),
        )
    }

    async fn handle_message(&self, message: &AgentMessage) -> Result<Option<Payload>, AgentError> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        if self.panic_on_message {
            panic!("{} panicked on purpose", self.agent_name());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_messages {
            return Err(AgentError::failed("message rejected"));
        }
        if self.reply_always
            || (self.reply_to_requests && message.message_type() == MessageType::Request)
        {
            let mut reply = Payload::new();
            reply.insert("ack".to_string(), json!(self.agent_name().as_str()));
            return Ok(Some(reply));
        }
        Ok(None)
    }

    async fn cleanup(&self) -> Result<(), AgentError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
