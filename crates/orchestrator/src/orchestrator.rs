//! The orchestrator: lifecycle, request routing, message intake, introspection.
//!
//! ```text
//!            process_request ──► RequestRouter ──► primary agent ──► RequestOutcome
//!                                     │ (no match)                      │
//!                                     └──► general completion           └─► cache
//!            send_message ──► queue ──► drain loop ──► agents (see `drain`)
//! ```
//!
//! No global instance: callers own an `Arc<Orchestrator>` and drive
//! `initialize()` / `cleanup()` themselves.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use atlaserp_agents::prompt;
use atlaserp_agents::{AgentCollaborators, AgentError, AgentRequest, AgentStatus};
use atlaserp_ai::{AiError, Cache, ChatMessage, CompletionClient, InMemoryCache};
use atlaserp_core::{AgentName, MessageId, agent_name::GENERAL};
use atlaserp_messaging::{
    AgentMessage, DeliveryReport, MessageSink, QueueReceiver, QueueSender, unbounded,
};

use crate::catalog::AgentCatalog;
use crate::config::OrchestratorConfig;
use crate::dispatch::Dispatcher;
use crate::drain::{self, DrainContext, DrainHandle, DrainStats, SharedStats, lock_stats};
use crate::error::OrchestratorError;
use crate::outcome::RequestOutcome;
use crate::registry::AgentRegistry;
use crate::router::{KeywordTable, RequestRouter};

/// Prefix of every cached request result.
pub const CACHE_KEY_PREFIX: &str = "ai_response:";

const GENERAL_PROMPT: &str = "You are the AtlasERP assistant. Answer general questions about \
the ERP suite briefly, and suggest which module (accounting, CRM, inventory, HR, projects, \
sales, purchasing, helpdesk, marketing, manufacturing) can help when relevant.";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    CleaningUp,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::CleaningUp => "cleaning_up",
        }
    }
}

/// Queue and drain loop of one initialized lifetime.
struct Runtime {
    sender: QueueSender<AgentMessage>,
    receiver: Arc<tokio::sync::Mutex<QueueReceiver<AgentMessage>>>,
    drain: DrainHandle,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    completion: Arc<dyn CompletionClient>,
    cache: Arc<dyn Cache>,
    router: RequestRouter,
    catalog: AgentCatalog,
    registry: Arc<AgentRegistry>,
    state: RwLock<LifecycleState>,
    /// Serialises `initialize` and `cleanup`.
    lifecycle: tokio::sync::Mutex<()>,
    runtime: Mutex<Option<Runtime>>,
    stats: SharedStats,
    reports: broadcast::Sender<DeliveryReport>,
}

impl core::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for `Orchestrator`. A completion client is required.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    completion: Option<Arc<dyn CompletionClient>>,
    cache: Option<Arc<dyn Cache>>,
    table: Option<KeywordTable>,
    catalog: Option<AgentCatalog>,
}

impl OrchestratorBuilder {
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Defaults to an `InMemoryCache`.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Defaults to `KeywordTable::erp_default()`.
    pub fn with_keyword_table(mut self, table: KeywordTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Defaults to `AgentCatalog::erp_default()`.
    pub fn with_catalog(mut self, catalog: AgentCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let completion = self.completion.ok_or_else(|| {
            OrchestratorError::Collaborator("no completion client configured".to_string())
        })?;
        let (reports, _) = broadcast::channel(self.config.report_capacity.max(1));

        Ok(Orchestrator {
            completion,
            cache: self.cache.unwrap_or_else(|| Arc::new(InMemoryCache::new())),
            router: RequestRouter::new(self.table.unwrap_or_else(KeywordTable::erp_default)),
            catalog: self.catalog.unwrap_or_else(AgentCatalog::erp_default),
            registry: Arc::new(AgentRegistry::new()),
            state: RwLock::new(LifecycleState::Uninitialized),
            lifecycle: tokio::sync::Mutex::new(()),
            runtime: Mutex::new(None),
            stats: SharedStats::default(),
            reports,
            config: self.config,
        })
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    fn runtime(&self) -> std::sync::MutexGuard<'_, Option<Runtime>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bring the orchestrator to `ready`.
    ///
    /// Fails only when a shared collaborator is unhealthy; the orchestrator
    /// then stays uninitialized. Individual agents that fail to construct or
    /// initialize are logged and left out. Calling this while ready is a no-op.
    pub async fn initialize(&self) -> Result<(), OrchestratorError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_initialized() {
            info!("orchestrator already initialized");
            return Ok(());
        }
        self.set_state(LifecycleState::Initializing);

        if let Err(err) = self.check_collaborators().await {
            warn!(error = %err, "collaborator health check failed; aborting initialization");
            self.set_state(LifecycleState::Uninitialized);
            return Err(err);
        }

        let collaborators = AgentCollaborators {
            completion: self.completion.clone(),
            cache: self.cache.clone(),
            context_window: self.config.context_window,
            options: self.config.completion,
        };

        for (label, constructor) in self.catalog.iter() {
            let agent = match constructor(&collaborators) {
                Ok(agent) => agent,
                Err(err) => {
                    let err = OrchestratorError::AgentInitialization {
                        agent: label.to_string(),
                        reason: err.to_string(),
                    };
                    warn!(agent = label, error = %err, "agent construction failed; skipping");
                    continue;
                }
            };
            let name = agent.name().clone();

            let init = {
                let agent = agent.clone();
                isolated(self.config.agent_timeout, async move { agent.initialize().await })
            };
            if let Err(err) = init.await {
                warn!(agent = %name, error = %err, "agent failed to initialize; skipping");
                continue;
            }

            if let Err(err) = self.registry.register(agent.clone()) {
                warn!(agent = %name, error = %err, "agent not registered");
                if let Err(err) = agent.cleanup().await {
                    debug!(agent = %name, error = %err, "cleanup of rejected agent failed");
                }
                continue;
            }
            debug!(agent = %name, "agent registered");
        }

        let (sender, receiver) = unbounded();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        *lock_stats(&self.stats) = DrainStats::default();

        let drain = drain::spawn(DrainContext {
            dispatcher: Dispatcher::new(self.registry.clone(), self.config.agent_timeout),
            receiver: receiver.clone(),
            sender: sender.clone(),
            reports: self.reports.clone(),
            stats: self.stats.clone(),
            error_pause: self.config.error_pause,
            max_restarts: self.config.max_drain_restarts,
            restart_backoff: self.config.restart_backoff,
        });
        *self.runtime() = Some(Runtime {
            sender,
            receiver,
            drain,
        });

        self.set_state(LifecycleState::Ready);
        info!(
            agents = self.registry.len(),
            configured = self.catalog.len(),
            "orchestrator initialized"
        );
        Ok(())
    }

    async fn check_collaborators(&self) -> Result<(), OrchestratorError> {
        self.completion
            .health_check()
            .await
            .map_err(|e| OrchestratorError::Collaborator(format!("completion: {e}")))?;
        self.cache.health_check().await?;
        Ok(())
    }

    /// Route a natural-language request to one agent (or the general handler).
    ///
    /// Never fails: every failure is reported as an error outcome.
    pub async fn process_request(&self, request: AgentRequest) -> RequestOutcome {
        if !self.is_initialized() {
            return RequestOutcome::failure(&OrchestratorError::NotInitialized);
        }

        let candidates = self.router.classify(&request.message);
        let Some(primary) = candidates.first().cloned() else {
            debug!("no domain match; using general handler");
            return self.handle_general(&request).await;
        };

        let Some(agent) = self.registry.get(primary.as_str()) else {
            let err = OrchestratorError::UnknownAgent(primary.to_string());
            warn!(agent = %primary, "primary agent is not registered");
            return RequestOutcome::failure(&err).with_candidates(candidates);
        };

        debug!(agent = %primary, candidates = candidates.len(), "dispatching request");
        self.registry.begin_dispatch(primary.as_str());

        let result = {
            let request = request.clone();
            isolated(self.config.agent_timeout, async move {
                agent.process_request(&request).await
            })
            .await
        };

        match result {
            Ok(response) => {
                self.registry.finish_dispatch(primary.as_str(), true);
                let outcome = RequestOutcome::from(response).with_candidates(candidates);
                self.store_cached(&request.message, &outcome).await;
                outcome
            }
            Err(source) => {
                self.registry.finish_dispatch(primary.as_str(), false);
                let err = OrchestratorError::AgentExecution {
                    agent: primary,
                    source,
                };
                warn!(error = %err, "agent request failed");
                RequestOutcome::failure(&err).with_candidates(candidates)
            }
        }
    }

    async fn handle_general(&self, request: &AgentRequest) -> RequestOutcome {
        let messages = [
            ChatMessage::system(GENERAL_PROMPT),
            ChatMessage::user(prompt::with_context(&request.message, &request.context)),
        ];
        let completion = self.completion.complete(&messages, self.config.completion);

        let result = match tokio::time::timeout(self.config.agent_timeout, completion).await {
            Ok(result) => result,
            Err(_) => Err(AiError::unavailable(format!(
                "completion timed out after {:?}",
                self.config.agent_timeout
            ))),
        };

        match result {
            Ok(text) => RequestOutcome::success(GENERAL, text).with_data(json!({"type": GENERAL})),
            Err(err) => {
                let err = OrchestratorError::UpstreamCompletion(err);
                warn!(error = %err, "general handler failed");
                RequestOutcome::failure(&err)
            }
        }
    }

    /// Cache key of a request: `ai_response:<sha256 hex of the request text>`.
    pub fn cache_key(request: &str) -> String {
        let digest = Sha256::digest(request.as_bytes());
        format!("{CACHE_KEY_PREFIX}{}", hex::encode(digest))
    }

    async fn store_cached(&self, request: &str, outcome: &RequestOutcome) {
        let key = Self::cache_key(request);
        let value = match serde_json::to_string(outcome) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "could not encode outcome for cache");
                return;
            }
        };
        if let Err(err) = self.cache.set(&key, value, self.config.cache_ttl).await {
            warn!(key = %key, error = %err, "cache write failed");
        }
    }

    /// Previously cached result of a request, if present and not expired.
    pub async fn cached_response(&self, request: &str) -> Option<RequestOutcome> {
        let key = Self::cache_key(request);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    warn!(key = %key, error = %err, "cached entry is not a request outcome");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed");
                None
            }
        }
    }

    /// Enqueue a message for asynchronous delivery. Never blocks.
    pub fn send_message(&self, message: AgentMessage) -> Result<MessageId, OrchestratorError> {
        if !self.is_initialized() {
            return Err(OrchestratorError::NotInitialized);
        }
        let runtime = self.runtime();
        let runtime = runtime.as_ref().ok_or(OrchestratorError::NotInitialized)?;

        let id = message.id();
        runtime
            .sender
            .enqueue(message)
            .map_err(|_| OrchestratorError::QueueClosed)?;
        debug!(message_id = %id, "message enqueued");
        Ok(id)
    }

    /// Status of one agent (`offline` if unknown) or of every registered agent.
    pub fn get_agent_status(&self, name: Option<&str>) -> BTreeMap<String, AgentStatus> {
        match name {
            Some(name) => BTreeMap::from([(name.to_string(), self.registry.status(name))]),
            None => self
                .registry
                .all_statuses()
                .into_iter()
                .map(|(name, status)| (name.into_string(), status))
                .collect(),
        }
    }

    /// Capabilities of one agent (empty if unknown) or of every registered agent.
    pub fn get_agent_capabilities(&self, name: Option<&str>) -> BTreeMap<String, Vec<String>> {
        match name {
            Some(name) => BTreeMap::from([(
                name.to_string(),
                self.registry.capabilities(name).unwrap_or_default(),
            )]),
            None => self
                .registry
                .all_capabilities()
                .into_iter()
                .map(|(name, caps)| (name.into_string(), caps))
                .collect(),
        }
    }

    pub fn agent_names(&self) -> Vec<AgentName> {
        self.registry.names()
    }

    pub fn queue_depth(&self) -> usize {
        self.runtime()
            .as_ref()
            .map(|rt| rt.sender.depth())
            .unwrap_or(0)
    }

    pub fn drain_stats(&self) -> DrainStats {
        let mut stats = lock_stats(&self.stats).clone();
        stats.queue_depth = self.queue_depth();
        stats
    }

    /// Live feed of delivery reports. Slow subscribers skip reports (lagged).
    pub fn subscribe_reports(&self) -> broadcast::Receiver<DeliveryReport> {
        self.reports.subscribe()
    }

    /// Stop the drain loop, clean up every agent and return to `uninitialized`.
    ///
    /// Pending messages are discarded. Safe to call repeatedly.
    pub async fn cleanup(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() == LifecycleState::Uninitialized {
            debug!("cleanup on uninitialized orchestrator; nothing to do");
            return;
        }
        self.set_state(LifecycleState::CleaningUp);

        let runtime = self.runtime().take();
        let receiver = match runtime {
            Some(Runtime { drain, receiver, .. }) => {
                drain.shutdown().await;
                Some(receiver)
            }
            None => None,
        };

        for agent in self.registry.agents() {
            let name = agent.name().clone();
            let result = isolated(self.config.agent_timeout, async move { agent.cleanup().await });
            if let Err(err) = result.await {
                warn!(agent = %name, error = %err, "agent cleanup failed");
            }
        }

        if let Some(receiver) = receiver {
            let mut receiver = receiver.lock().await;
            receiver.close();
            let discarded = receiver.drain();
            if !discarded.is_empty() {
                info!(discarded = discarded.len(), "discarded undelivered messages");
            }
        }

        self.registry.clear();
        self.set_state(LifecycleState::Uninitialized);
        info!("orchestrator cleaned up");
    }
}

/// Run an agent call in its own task, bounded by `timeout`.
///
/// Panics surface as `AgentError::Failed`, timeouts as `AgentError::TimedOut`
/// (the task is aborted).
async fn isolated<T, F>(timeout: Duration, call: F) -> Result<T, AgentError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AgentError>> + Send + 'static,
{
    let mut handle = tokio::spawn(call);
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => Err(AgentError::failed("agent panicked")),
        Ok(Err(join_err)) => Err(AgentError::failed(format!("agent task aborted: {join_err}"))),
        Err(_) => {
            handle.abort();
            Err(AgentError::TimedOut(timeout))
        }
    }
}
