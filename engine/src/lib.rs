//! Conversation engine for Warden.
//!
//! Owns the session transcript and drives each turn through the model and
//! the tool pipeline. Hosts supply the model client, the consent gate and
//! the trusted root; the engine never talks to the terminal itself.

mod config;
mod session;

pub use config::{
    API_KEY_ENV, ApiSection, AppConfig, ConfigError, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
    WardenConfig, config_path, expand_env_vars,
};
pub use session::{MODEL_FAILURE_MESSAGE, Session, TOOL_OUTCOME_DELIMITER, Toolbox};

pub use warden_providers::{self, ApiConfig, ModelClient, ModelError, ModelFut, OpenAiClient};
pub use warden_tools::{
    self, ConsentFut, ConsentGate, ConsentRequest, ToolSettings,
};
pub use warden_types::{
    ApiKey, ChatMessage, ConsentDecision, Role, ToolInvocation, ToolName, Transcript,
};
