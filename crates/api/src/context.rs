use std::sync::Arc;

use atlaserp_orchestrator::Orchestrator;

/// Shared state of every handler.
///
/// There is no process-wide orchestrator: `main` builds one, owns its
/// lifecycle and hands it to the router through this context.
#[derive(Debug, Clone)]
pub struct AppContext {
    orchestrator: Arc<Orchestrator>,
}

impl AppContext {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}

/// Caller identity taken from the `x-user-id` header, if present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    user_id: Option<String>,
}

impl UserContext {
    pub fn new(user_id: Option<String>) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}
