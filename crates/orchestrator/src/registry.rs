//! Agent registry & status tracker.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use atlaserp_agents::{Agent, AgentStatus};
use atlaserp_core::AgentName;
use atlaserp_messaging::Source;

use crate::error::OrchestratorError;

#[derive(Default)]
struct Slots {
    agents: BTreeMap<AgentName, Arc<dyn Agent>>,
    statuses: BTreeMap<AgentName, AgentStatus>,
    activity: BTreeMap<AgentName, Activity>,
}

/// Calls currently running on one agent, and whether any of them failed.
#[derive(Debug, Default, Clone, Copy)]
struct Activity {
    in_flight: usize,
    failed: bool,
}

/// Name → agent instance, and name → status.
///
/// Only the orchestrator mutates the registry; the drain loop reads it.
/// Locks are never held across an `.await`.
#[derive(Default)]
pub struct AgentRegistry {
    slots: RwLock<Slots>,
}

impl core::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("statuses", &self.read().statuses)
            .finish()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an initialized agent with status `idle`.
    ///
    /// Names are unique: a second agent with the same name is rejected and the
    /// first registration stays in place.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<(), OrchestratorError> {
        let name = agent.name().clone();
        let mut slots = self.write();
        if slots.agents.contains_key(&name) {
            return Err(OrchestratorError::DuplicateAgent(name));
        }
        slots.statuses.insert(name.clone(), AgentStatus::Idle);
        slots.activity.insert(name.clone(), Activity::default());
        slots.agents.insert(name, agent);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.read().agents.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().agents.contains_key(name)
    }

    /// Update a tracked status. Unknown names are ignored.
    pub fn set_status(&self, name: &str, status: AgentStatus) {
        if let Some(slot) = self.write().statuses.get_mut(name) {
            *slot = status;
        }
    }

    /// A request or delivery started on `name`: status becomes `processing`.
    ///
    /// Calls may overlap; every `begin_dispatch` must be paired with one
    /// `finish_dispatch`. Unknown names are ignored.
    pub fn begin_dispatch(&self, name: &str) {
        let mut slots = self.write();
        let Some(activity) = slots.activity.get_mut(name) else {
            return;
        };
        activity.in_flight += 1;
        if let Some(status) = slots.statuses.get_mut(name) {
            *status = AgentStatus::Processing;
        }
    }

    /// A call on `name` finished. The agent stays `processing` while other
    /// calls are in flight; once the last one ends it becomes `error` if any
    /// call of that busy period failed, `idle` otherwise.
    pub fn finish_dispatch(&self, name: &str, ok: bool) {
        let mut slots = self.write();
        let Some(activity) = slots.activity.get_mut(name) else {
            return;
        };
        activity.in_flight = activity.in_flight.saturating_sub(1);
        activity.failed |= !ok;
        if activity.in_flight > 0 {
            return;
        }
        let settled = if activity.failed {
            AgentStatus::Error
        } else {
            AgentStatus::Idle
        };
        activity.failed = false;
        if let Some(status) = slots.statuses.get_mut(name) {
            *status = settled;
        }
    }

    /// Current status; `offline` for names that are not registered.
    pub fn status(&self, name: &str) -> AgentStatus {
        self.read()
            .statuses
            .get(name)
            .copied()
            .unwrap_or(AgentStatus::Offline)
    }

    pub fn all_statuses(&self) -> BTreeMap<AgentName, AgentStatus> {
        self.read().statuses.clone()
    }

    pub fn capabilities(&self, name: &str) -> Option<Vec<String>> {
        self.read().agents.get(name).map(|agent| agent.capabilities())
    }

    pub fn all_capabilities(&self) -> BTreeMap<AgentName, Vec<String>> {
        self.read()
            .agents
            .iter()
            .map(|(name, agent)| (name.clone(), agent.capabilities()))
            .collect()
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<AgentName> {
        self.read().agents.keys().cloned().collect()
    }

    /// Snapshot of every registered agent.
    pub fn agents(&self) -> Vec<Arc<dyn Agent>> {
        self.read().agents.values().cloned().collect()
    }

    /// Broadcast recipients: every registered agent except the message source.
    pub fn recipients_except(&self, source: &Source) -> Vec<Arc<dyn Agent>> {
        self.read()
            .agents
            .iter()
            .filter(|(name, _)| !source.is_agent(name))
            .map(|(_, agent)| agent.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().agents.is_empty()
    }

    /// Remove every entry from both maps and return the removed agents.
    pub fn clear(&self) -> Vec<Arc<dyn Agent>> {
        let mut slots = self.write();
        slots.statuses.clear();
        slots.activity.clear();
        core::mem::take(&mut slots.agents).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestAgent;

    #[test]
    fn registers_with_idle_status() {
        let registry = AgentRegistry::new();
        registry.register(TestAgent::named("crm").into_dyn()).unwrap();

        assert!(registry.contains("crm"));
        assert_eq!(registry.status("crm"), AgentStatus::Idle);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected_and_first_wins() {
        let registry = AgentRegistry::new();
        let first = TestAgent::named("crm").with_capabilities(&["first"]);
        let second = TestAgent::named("crm").with_capabilities(&["second"]);

        registry.register(first.into_dyn()).unwrap();
        let err = registry.register(second.into_dyn()).unwrap_err();

        assert_eq!(
            err,
            OrchestratorError::DuplicateAgent(AgentName::new("crm").unwrap())
        );
        assert_eq!(registry.capabilities("crm"), Some(vec!["first".to_string()]));
    }

    #[test]
    fn unknown_names_are_offline_and_set_status_is_a_no_op() {
        let registry = AgentRegistry::new();
        registry.set_status("ghost", AgentStatus::Processing);

        assert_eq!(registry.status("ghost"), AgentStatus::Offline);
        assert!(registry.all_statuses().is_empty());
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn set_status_updates_registered_agent() {
        let registry = AgentRegistry::new();
        registry.register(TestAgent::named("hr").into_dyn()).unwrap();

        registry.set_status("hr", AgentStatus::Error);
        assert_eq!(registry.status("hr"), AgentStatus::Error);
    }

    #[test]
    fn overlapping_calls_keep_processing_until_the_last_finishes() {
        let registry = AgentRegistry::new();
        registry.register(TestAgent::named("crm").into_dyn()).unwrap();

        registry.begin_dispatch("crm");
        registry.begin_dispatch("crm");
        registry.finish_dispatch("crm", true);
        assert_eq!(registry.status("crm"), AgentStatus::Processing);

        registry.finish_dispatch("crm", true);
        assert_eq!(registry.status("crm"), AgentStatus::Idle);
    }

    #[test]
    fn failure_while_busy_survives_a_later_success() {
        let registry = AgentRegistry::new();
        registry.register(TestAgent::named("crm").into_dyn()).unwrap();

        registry.begin_dispatch("crm");
        registry.begin_dispatch("crm");
        registry.finish_dispatch("crm", false);
        assert_eq!(registry.status("crm"), AgentStatus::Processing);
        registry.finish_dispatch("crm", true);
        assert_eq!(registry.status("crm"), AgentStatus::Error);

        registry.begin_dispatch("crm");
        registry.finish_dispatch("crm", true);
        assert_eq!(registry.status("crm"), AgentStatus::Idle);
    }

    #[test]
    fn dispatch_tracking_ignores_unknown_names() {
        let registry = AgentRegistry::new();
        registry.begin_dispatch("ghost");
        registry.finish_dispatch("ghost", false);
        assert_eq!(registry.status("ghost"), AgentStatus::Offline);
    }

    #[test]
    fn broadcast_recipients_skip_the_source() {
        let registry = AgentRegistry::new();
        for name in ["crm", "hr", "sales"] {
            registry.register(TestAgent::named(name).into_dyn()).unwrap();
        }

        let source = Source::Agent(AgentName::new("hr").unwrap());
        let names: Vec<_> = registry
            .recipients_except(&source)
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, vec!["crm", "sales"]);

        assert_eq!(registry.recipients_except(&Source::External).len(), 3);
    }

    #[test]
    fn clear_empties_both_maps() {
        let registry = AgentRegistry::new();
        registry.register(TestAgent::named("crm").into_dyn()).unwrap();
        registry.register(TestAgent::named("hr").into_dyn()).unwrap();

        let removed = registry.clear();
        assert_eq!(removed.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.all_statuses().is_empty());
        assert!(registry.all_capabilities().is_empty());
    }
}
