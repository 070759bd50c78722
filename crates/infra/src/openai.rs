//! OpenAI-compatible chat completion client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use atlaserp_ai::{AiError, ChatMessage, CompletionClient, CompletionOptions};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn mask_api_key(key: &str) -> String {
    match key.char_indices().nth(4) {
        Some((idx, _)) => format!("{}…", &key[..idx]),
        None => "…".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct OpenAiCompletion {
    client: Client,
    config: OpenAiConfig,
}

impl fmt::Debug for OpenAiCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompletion")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompletion {
    pub fn new(config: OpenAiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    #[instrument(skip(self, messages, options), fields(model = %self.config.model))]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, AiError> {
        if messages.is_empty() {
            return Err(AiError::InvalidInput("conversation is empty".to_string()));
        }

        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(messages = messages.len(), "sending completion request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AiError::unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        parse_content(&text)
    }

    async fn health_check(&self) -> Result<(), AiError> {
        if self.config.api_key.trim().is_empty() {
            return Err(AiError::unavailable("API key is empty"));
        }
        Ok(())
    }
}

fn status_error(status: StatusCode, body: &str) -> AiError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(300).collect());

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AiError::unavailable(format!("{status}: {message}"))
    } else {
        AiError::inference(format!("{status}: {message}"))
    }
}

fn parse_content(body: &str) -> Result<String, AiError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AiError::inference(format!("malformed completion response: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AiError::inference("completion response has no content"))
}
