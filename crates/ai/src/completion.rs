//! Completion capability: `complete(messages) -> text`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, ChatRole};
use crate::result::AiError;

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Opaque language-model call.
///
/// Implementations must be safe for concurrent use: one client is shared by
/// the orchestrator's general handler and every agent.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run a chat completion over an ordered, role-tagged conversation.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, AiError>;

    /// Verify the backend is usable. Called once while the orchestrator starts.
    async fn health_check(&self) -> Result<(), AiError> {
        Ok(())
    }
}

/// Deterministic in-process client for tests and offline development.
///
/// Replies are served from a FIFO script; once it is exhausted the client
/// falls back to a fixed text, or echoes the last user message when no
/// fallback is set. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, AiError>>>,
    fallback: Option<String>,
    healthy: Option<AiError>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `text` once the script runs out.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Queue one successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(text.into()));
        self
    }

    /// Queue one failing call.
    pub fn with_failure(self, error: AiError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Make `health_check` fail with `error`.
    pub fn unhealthy(mut self, error: AiError) -> Self {
        self.healthy = Some(error);
        self
    }

    /// Every conversation passed to `complete`, in call order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: CompletionOptions,
    ) -> Result<String, AiError> {
        if messages.is_empty() {
            return Err(AiError::InvalidInput("conversation is empty".to_string()));
        }
        lock(&self.calls).push(messages.to_vec());

        if let Some(next) = lock(&self.script).pop_front() {
            return next;
        }

        if let Some(text) = &self.fallback {
            return Ok(text.clone());
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("echo: {last_user}"))
    }

    async fn health_check(&self) -> Result<(), AiError> {
        match &self.healthy {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_script_then_echoes() {
        let client = ScriptedCompletion::new()
            .with_reply("first")
            .with_failure(AiError::inference("rate limited"));

        let convo = [ChatMessage::system("be brief"), ChatMessage::user("hello")];
        let opts = CompletionOptions::default();

        assert_eq!(client.complete(&convo, opts).await.unwrap(), "first");
        assert_eq!(
            client.complete(&convo, opts).await,
            Err(AiError::InferenceFailed("rate limited".to_string()))
        );
        assert_eq!(client.complete(&convo, opts).await.unwrap(), "echo: hello");
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn fallback_wins_over_echo() {
        let client = ScriptedCompletion::new().with_fallback("fixed");
        let out = client
            .complete(&[ChatMessage::user("hi")], CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "fixed");
    }

    #[tokio::test]
    async fn empty_conversation_is_rejected_and_not_recorded() {
        let client = ScriptedCompletion::new();
        let err = client
            .complete(&[], CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn health_check_reports_configured_failure() {
        assert!(ScriptedCompletion::new().health_check().await.is_ok());

        let sick = ScriptedCompletion::new().unhealthy(AiError::unavailable("no key"));
        assert!(matches!(sick.health_check().await, Err(AiError::Unavailable(_))));
    }
}
