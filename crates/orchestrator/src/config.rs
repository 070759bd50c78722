//! Orchestrator configuration (environment driven).

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use atlaserp_ai::CompletionOptions;

pub const ENV_CONTEXT_WINDOW: &str = "AI_CONTEXT_WINDOW";
pub const ENV_CACHE_TTL_SECS: &str = "AI_CACHE_TTL_SECS";
pub const ENV_AGENT_TIMEOUT_SECS: &str = "AI_AGENT_TIMEOUT_SECS";
pub const ENV_TEMPERATURE: &str = "AI_TEMPERATURE";
pub const ENV_MAX_TOKENS: &str = "AI_MAX_TOKENS";
pub const ENV_ERROR_PAUSE_MS: &str = "AI_ERROR_PAUSE_MS";
pub const ENV_MAX_DRAIN_RESTARTS: &str = "AI_MAX_DRAIN_RESTARTS";
pub const ENV_RESTART_BACKOFF_MS: &str = "AI_RESTART_BACKOFF_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Conversation-memory window handed to every agent.
    pub context_window: usize,
    /// TTL of cached request results.
    pub cache_ttl: Duration,
    /// Upper bound for every agent call (`initialize`, `process_request`,
    /// `handle_message`, `cleanup`) and for general-handler completions.
    pub agent_timeout: Duration,
    pub completion: CompletionOptions,
    /// Pause of the drain loop after a message whose delivery failed.
    pub error_pause: Duration,
    /// Drain-loop restarts allowed before the supervisor gives up.
    pub max_drain_restarts: u32,
    /// Base delay of the drain-loop restart backoff (doubles per restart).
    pub restart_backoff: Duration,
    /// Buffered delivery reports per subscriber before lagging ones miss reports.
    pub report_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            context_window: 10,
            cache_ttl: Duration::from_secs(3600),
            agent_timeout: Duration::from_secs(30),
            completion: CompletionOptions::default(),
            error_pause: Duration::from_secs(1),
            max_drain_restarts: 5,
            restart_backoff: Duration::from_millis(250),
            report_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Missing keys keep their defaults; present but malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let context_window = parse_or(&lookup, ENV_CONTEXT_WINDOW, defaults.context_window)?;
        let cache_ttl = Duration::from_secs(parse_or(
            &lookup,
            ENV_CACHE_TTL_SECS,
            defaults.cache_ttl.as_secs(),
        )?);
        let agent_timeout_secs: u64 =
            parse_or(&lookup, ENV_AGENT_TIMEOUT_SECS, defaults.agent_timeout.as_secs())?;
        if agent_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_AGENT_TIMEOUT_SECS,
                value: "0".to_string(),
                reason: "timeout must be at least one second".to_string(),
            });
        }

        let temperature: f32 =
            parse_or(&lookup, ENV_TEMPERATURE, defaults.completion.temperature)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                key: ENV_TEMPERATURE,
                value: temperature.to_string(),
                reason: "temperature must be within 0.0..=2.0".to_string(),
            });
        }
        let max_tokens = parse_or(&lookup, ENV_MAX_TOKENS, defaults.completion.max_tokens)?;

        let error_pause = Duration::from_millis(parse_or(
            &lookup,
            ENV_ERROR_PAUSE_MS,
            defaults.error_pause.as_millis() as u64,
        )?);
        let max_drain_restarts =
            parse_or(&lookup, ENV_MAX_DRAIN_RESTARTS, defaults.max_drain_restarts)?;
        let restart_backoff = Duration::from_millis(parse_or(
            &lookup,
            ENV_RESTART_BACKOFF_MS,
            defaults.restart_backoff.as_millis() as u64,
        )?);

        Ok(Self {
            context_window,
            cache_ttl,
            agent_timeout: Duration::from_secs(agent_timeout_secs),
            completion: CompletionOptions {
                temperature,
                max_tokens,
            },
            error_pause,
            max_drain_restarts,
            restart_backoff,
            report_capacity: defaults.report_capacity,
        })
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_error_pause(mut self, pause: Duration) -> Self {
        self.error_pause = pause;
        self
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
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
    fn empty_environment_yields_defaults() {
        let config = OrchestratorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            (ENV_CONTEXT_WINDOW, "4"),
            (ENV_CACHE_TTL_SECS, "60"),
            (ENV_AGENT_TIMEOUT_SECS, "5"),
            (ENV_TEMPERATURE, "0.2"),
            (ENV_MAX_TOKENS, "256"),
            (ENV_ERROR_PAUSE_MS, "10"),
            (ENV_MAX_DRAIN_RESTARTS, "2"),
            (ENV_RESTART_BACKOFF_MS, "50"),
        ]))
        .unwrap();

        assert_eq!(config.context_window, 4);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.agent_timeout, Duration::from_secs(5));
        assert_eq!(config.completion.temperature, 0.2);
        assert_eq!(config.completion.max_tokens, 256);
        assert_eq!(config.error_pause, Duration::from_millis(10));
        assert_eq!(config.max_drain_restarts, 2);
        assert_eq!(config.restart_backoff, Duration::from_millis(50));
    }

    #[test]
    fn malformed_values_are_reported_with_their_key() {
        let err = OrchestratorConfig::from_lookup(lookup(&[(ENV_CONTEXT_WINDOW, "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_CONTEXT_WINDOW, .. }));
    }

    #[test]
    fn rejects_zero_timeout_and_out_of_range_temperature() {
        assert!(
            OrchestratorConfig::from_lookup(lookup(&[(ENV_AGENT_TIMEOUT_SECS, "0")])).is_err()
        );
        assert!(OrchestratorConfig::from_lookup(lookup(&[(ENV_TEMPERATURE, "3.5")])).is_err());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            OrchestratorConfig::from_lookup(lookup(&[(ENV_MAX_TOKENS, "  ")])).unwrap();
        assert_eq!(config.completion.max_tokens, 1000);
    }
}
