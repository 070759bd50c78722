//! Agent catalogue: the constructors `initialize()` runs.

use std::sync::Arc;

use atlaserp_agents::{Agent, AgentCollaborators, AgentError, AgentKind, DomainAgent};

pub type AgentConstructor =
    Arc<dyn Fn(&AgentCollaborators) -> Result<Arc<dyn Agent>, AgentError> + Send + Sync>;

/// Ordered list of labelled agent constructors.
///
/// The label is only used for logging when construction itself fails (the
/// agent name is unknown at that point).
#[derive(Clone, Default)]
pub struct AgentCatalog {
    entries: Vec<(String, AgentConstructor)>,
}

impl core::fmt::Debug for AgentCatalog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(label, _)| label))
            .finish()
    }
}

impl AgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `DomainAgent` per built-in `AgentKind`.
    pub fn erp_default() -> Self {
        AgentKind::ALL
            .into_iter()
            .fold(Self::new(), |catalog, kind| catalog.with_kind(kind))
    }

    pub fn with_kind(self, kind: AgentKind) -> Self {
        self.with_constructor(kind.as_str(), move |collaborators| {
            let agent = DomainAgent::new(kind, collaborators.clone())?;
            Ok(Arc::new(agent) as Arc<dyn Agent>)
        })
    }

    pub fn with_constructor<F>(mut self, label: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&AgentCollaborators) -> Result<Arc<dyn Agent>, AgentError> + Send + Sync + 'static,
    {
        self.entries.push((label.into(), Arc::new(constructor)));
        self
    }

    /// Register an already-built agent instance.
    pub fn with_agent(self, agent: Arc<dyn Agent>) -> Self {
        let label = agent.name().to_string();
        self.with_constructor(label, move |_| Ok(agent.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentConstructor)> {
        self.entries.iter().map(|(label, ctor)| (label.as_str(), ctor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
