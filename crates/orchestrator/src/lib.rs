//! `atlaserp-orchestrator`
//!
//! **Responsibility:** coordinate the ERP agents.
//!
//! - `AgentRegistry`: registered agents and their live status
//! - `RequestRouter`: deterministic keyword classification of free text
//! - drain loop: supervised consumer of the message queue with per-message
//!   fan-out, failure isolation and fan-in into `DeliveryReport`s
//! - `Orchestrator`: lifecycle, `process_request`, `send_message`, introspection
//!
//! This crate does not talk to the network; completion clients and caches are
//! injected (`atlaserp-infra` provides the real ones).

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod drain;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod registry;
pub mod router;

#[cfg(test)]
mod testing;

pub use catalog::{AgentCatalog, AgentConstructor};
pub use config::{ConfigError, OrchestratorConfig};
pub use dispatch::{Dispatched, Dispatcher};
pub use drain::DrainStats;
pub use error::OrchestratorError;
pub use orchestrator::{CACHE_KEY_PREFIX, LifecycleState, Orchestrator, OrchestratorBuilder};
pub use outcome::{OutcomeStatus, RequestOutcome};
pub use registry::AgentRegistry;
pub use router::{KeywordEntry, KeywordTable, RequestRouter};
