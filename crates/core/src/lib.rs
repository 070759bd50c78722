//! `atlaserp-core`: shared building blocks for the agent orchestrator.
//!
//! This crate contains **pure** primitives (no IO, no async): identifiers,
//! validated names and the error model they share.

pub mod agent_name;
pub mod error;
pub mod id;
pub mod value_object;

pub use agent_name::AgentName;
pub use error::{CoreError, CoreResult};
pub use id::MessageId;
pub use value_object::ValueObject;
