//! Settings and orchestrator construction for the HTTP server.

use std::sync::Arc;

use tracing::warn;

use atlaserp_ai::{Cache, CompletionClient, InMemoryCache, ScriptedCompletion};
use atlaserp_infra::{OpenAiCompletion, OpenAiConfig};
use atlaserp_orchestrator::{Orchestrator, OrchestratorConfig};

pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_AI_MODEL: &str = "AI_MODEL";
pub const ENV_AI_BASE_URL: &str = "AI_BASE_URL";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

const OFFLINE_REPLY: &str =
    "The AI model is not configured on this server (set OPENAI_API_KEY to enable it).";

/// Process settings outside of `OrchestratorConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl ApiSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            bind_addr: get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            redis_url: get(ENV_REDIS_URL),
            openai_api_key: get(ENV_OPENAI_API_KEY),
            model: get(ENV_AI_MODEL),
            base_url: get(ENV_AI_BASE_URL),
        }
    }
}

/// Completion client for the settings: OpenAI-compatible when a key is set,
/// otherwise an offline scripted client (with a warning).
pub fn completion_client(settings: &ApiSettings) -> anyhow::Result<Arc<dyn CompletionClient>> {
    let Some(api_key) = &settings.openai_api_key else {
        warn!("OPENAI_API_KEY not set; using offline completion client");
        return Ok(Arc::new(ScriptedCompletion::new().with_fallback(OFFLINE_REPLY)));
    };

    let mut config = OpenAiConfig::new(api_key.clone());
    if let Some(model) = &settings.model {
        config = config.with_model(model.clone());
    }
    if let Some(base_url) = &settings.base_url {
        config = config.with_base_url(base_url.clone());
    }
    Ok(Arc::new(OpenAiCompletion::new(config)?))
}

/// Shared cache for the settings: Redis when configured (feature `redis`),
/// otherwise in-process.
pub fn cache(settings: &ApiSettings) -> anyhow::Result<Arc<dyn Cache>> {
    match &settings.redis_url {
        #[cfg(feature = "redis")]
        Some(url) => Ok(Arc::new(atlaserp_infra::RedisCache::new(url)?)),
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("REDIS_URL set but built without the `redis` feature; using in-memory cache");
            Ok(Arc::new(InMemoryCache::new()))
        }
        None => {
            warn!("REDIS_URL not set; using in-memory cache");
            Ok(Arc::new(InMemoryCache::new()))
        }
    }
}

pub fn build_orchestrator(
    settings: &ApiSettings,
    config: OrchestratorConfig,
) -> anyhow::Result<Orchestrator> {
    let orchestrator = Orchestrator::builder()
        .with_config(config)
        .with_completion(completion_client(settings)?)
        .with_cache(cache(settings)?)
        .build()?;
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = ApiSettings::from_lookup(lookup(&[]));
        assert_eq!(settings.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(settings.redis_url, None);
        assert_eq!(settings.openai_api_key, None);
    }

    #[test]
    fn blank_values_are_unset() {
        let settings = ApiSettings::from_lookup(lookup(&[
            (ENV_OPENAI_API_KEY, "  "),
            (ENV_BIND_ADDR, "127.0.0.1:9000"),
            (ENV_AI_MODEL, "gpt-test"),
        ]));
        assert_eq!(settings.openai_api_key, None);
        assert_eq!(settings.bind_addr, "127.0.0.1:9000");
        assert_eq!(settings.model.as_deref(), Some("gpt-test"));
    }

    #[tokio::test]
    async fn offline_client_answers_without_a_key() {
        let settings = ApiSettings::from_lookup(lookup(&[]));
        let client = completion_client(&settings).unwrap();
        let reply = client
            .complete(
                &[atlaserp_ai::ChatMessage::user("hi")],
                atlaserp_ai::CompletionOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(reply, OFFLINE_REPLY);
    }
}
