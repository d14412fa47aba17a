//! OpenAI-compatible Chat Completions client.
//!
//! One non-streaming `POST {base_url}/chat/completions` per turn. Only
//! `choices[0].message.content` is read from the response.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_types::{ApiKey, ChatMessage, Role};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{
    ModelClient, ModelError, ModelFut, OPENAI_API_BASE_URL, http_client_with_timeout,
    read_capped_error_body,
};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection and sampling settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: String,
    api_key: ApiKey,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout: Duration,
    retry: RetryConfig,
}

impl ApiConfig {
    #[must_use]
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            base_url: OPENAI_API_BASE_URL.to_string(),
            api_key,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    /// Trailing slashes are dropped.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ModelClient`] over the Chat Completions API.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl OpenAiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ModelError> {
        let http = http_client_with_timeout(config.timeout)?;
        Ok(Self { http, config })
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role(),
                    content: m.content(),
                })
                .collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };
        let url = self.config.completions_url();
        let auth_header = format!("Bearer {}", self.config.api_key.expose_secret());

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "Sending chat completion request"
        );

        let outcome = send_with_retry(
            || {
                self.http
                    .post(&url)
                    .header("Authorization", &auth_header)
                    .header("content-type", "application/json")
                    .json(&body)
            },
            &self.config.retry,
        )
        .await;

        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let body = read_capped_error_body(response).await;
                return Err(ModelError::Status { status, body });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(ModelError::Transport {
                    attempts,
                    message: source.to_string(),
                });
            }
        };

        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;
        parse_completion(&text)
    }
}

impl ModelClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ModelFut<'a> {
        Box::pin(self.send(messages))
    }
}

fn parse_completion(text: &str) -> Result<String, ModelError> {
    let parsed: CompletionResponse =
        serde_json::from_str(text).map_err(|e| ModelError::Decode(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ModelError::EmptyCompletion);
    }
    Ok(content)
}
