//! Infrastructure adapters: remote model APIs and shared caches.
//!
//! - `OpenAiCompletion`: `CompletionClient` over any OpenAI-compatible
//!   `/chat/completions` endpoint
//! - `RedisCache` (feature `redis`): `Cache` backed by Redis `SET EX` / `GET`

pub mod openai;
#[cfg(feature = "redis")]
pub mod redis_cache;

pub use openai::{OpenAiCompletion, OpenAiConfig};
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
