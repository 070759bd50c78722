//! `atlaserp-ai`
//!
//! **Responsibility:** the shared AI collaborators every agent depends on.
//!
//! - `CompletionClient`: the only place a language model is called.
//! - `Cache`: key/value store with per-entry TTL.
//! - `ConversationMemory`: bounded per-agent history window.
//!
//! Adapters talking to real services (HTTP model APIs, Redis) live in
//! `atlaserp-infra`; this crate ships the in-process implementations.

pub mod cache;
pub mod completion;
pub mod memory;
pub mod message;
pub mod result;

pub use cache::{Cache, CacheError, InMemoryCache};
pub use completion::{CompletionClient, CompletionOptions, ScriptedCompletion};
pub use memory::ConversationMemory;
pub use message::{ChatMessage, ChatRole};
pub use result::AiError;
