//! Model clients for Warden.
//!
//! # Architecture
//!
//! The engine talks to a model only through [`ModelClient`]: an ordered list
//! of role-tagged messages goes in, one completion string (or a
//! [`ModelError`]) comes out. There is no streaming and no structured
//! function-calling; tool use is carried in the completion text.
//!
//! - [`openai`] - OpenAI-compatible Chat Completions client
//! - [`retry`] - exponential backoff shared by HTTP clients
//!
//! # Error Handling
//!
//! Every failure is a [`ModelError`]. The engine never shows its text to the
//! user; it logs it and replaces the assistant message with a fixed notice.

pub mod openai;
pub mod retry;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use warden_types::ChatMessage;

pub use openai::{ApiConfig, OpenAiClient};

/// Default OpenAI API base; any compatible server works.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

pub type ModelFut<'a> = Pin<Box<dyn Future<Output = Result<String, ModelError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("request failed after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode model response: {0}")]
    Decode(String),
    #[error("model returned an empty completion")]
    EmptyCompletion,
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Prompt in, completion out.
pub trait ModelClient: Send + Sync {
    fn model(&self) -> &str;
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ModelFut<'a>;
}

/// Shared client settings: bounded connect time, keepalive, no redirects.
pub fn http_client_with_timeout(timeout: Duration) -> Result<reqwest::Client, ModelError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .build()
        .map_err(|e| ModelError::Client(e.to_string()))
}

/// Read an error body, keeping at most [`MAX_ERROR_BODY_BYTES`].
pub async fn read_capped_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
