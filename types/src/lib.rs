//! Core domain types for Warden.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

#![allow(clippy::missing_errors_doc)]

mod message;
mod tool;

pub use message::{ChatMessage, Role, Transcript};
pub use tool::{ConsentDecision, ToolInvocation, ToolName};

use thiserror::Error;

// ============================================================================
// API Key Types
// ============================================================================

/// Bearer credential for the model endpoint.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

#[derive(Debug, Error)]
#[error("API key must not be empty")]
pub struct EmptyApiKeyError;

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyApiKeyError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(EmptyApiKeyError);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}
