//! `atlaserp-agents`
//!
//! **Responsibility:** the agent contract and the ERP domain agents.
//!
//! - `Agent` is the capability set the orchestrator drives:
//!   `initialize`, `handle_message`, `process_request`, `capabilities`, `cleanup`.
//! - `AgentKind` is the closed list of built-in domains.
//! - `DomainAgent` implements `Agent` for every `AgentKind`.
//!
//! Agents never touch the registry or the queue directly; they answer
//! requests and return reply payloads, and the orchestrator routes the rest.

pub mod agent;
pub mod domain;
pub mod kind;
pub mod prompt;

pub use agent::{
    Agent, AgentCollaborators, AgentError, AgentRequest, AgentResponse, AgentStatus,
};
pub use domain::DomainAgent;
pub use kind::AgentKind;
