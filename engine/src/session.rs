//! One conversation and its turn loop.
//!
//! A turn is strictly sequential: model call, then at most one tool call
//! (validate, consent, execute), then one assistant message. The protocol
//! preamble travels with every request but never enters the transcript, and
//! tool outcomes are shown to the user without being sent back to the model
//! as a separate turn.

use std::path::Path;

use warden_providers::ModelClient;
use warden_tools::{
    ConsentGate, ToolError, ToolRegistry, ToolSettings, build_protocol_instructions,
    parse_invocation, register_builtins, run_invocation,
};
use warden_types::{ChatMessage, Transcript};

use crate::config::AppConfig;

/// Shown in place of the assistant message when the model call fails.
pub const MODEL_FAILURE_MESSAGE: &str =
    "Sorry, the language model could not be reached or returned nothing usable. Please try again.";

/// Separates the model's prose from the tool outcome in one assistant message.
pub const TOOL_OUTCOME_DELIMITER: &str = "\n\n---\n";

/// Registered tools, their settings and the preamble describing them.
pub struct Toolbox {
    registry: ToolRegistry,
    settings: ToolSettings,
    preamble: Option<String>,
}

impl Toolbox {
    /// Built-in `read_file` and `write_file` with the default protocol preamble.
    pub fn builtin(settings: ToolSettings) -> Result<Self, ToolError> {
        let mut registry = ToolRegistry::default();
        register_builtins(&mut registry, settings.read_limits)?;
        let preamble = Some(build_protocol_instructions(&registry.definitions()));
        Ok(Self {
            registry,
            settings,
            preamble,
        })
    }

    /// Apply `[app]` preamble settings.
    #[must_use]
    pub fn with_app_config(mut self, app: &AppConfig) -> Self {
        if !app.send_system_prompt {
            self.preamble = None;
            return self;
        }
        if let Some(extra) = app.system_prompt.as_deref().map(str::trim)
            && !extra.is_empty()
        {
            let protocol = build_protocol_instructions(&self.registry.definitions());
            self.preamble = Some(format!("{extra}\n\n{protocol}"));
        }
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    #[must_use]
    pub fn preamble(&self) -> Option<&str> {
        self.preamble.as_deref()
    }
}

/// One logical conversation.
#[derive(Debug, Default)]
pub struct Session {
    transcript: Transcript,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn reset(&mut self) {
        self.transcript.clear();
    }

    /// Run one turn and return the assistant message to display.
    ///
    /// On model failure the user message stays in the transcript and
    /// [`MODEL_FAILURE_MESSAGE`] is returned without recording an assistant
    /// entry.
    pub async fn turn(
        &mut self,
        user_text: &str,
        trusted_root: Option<&Path>,
        model: &dyn ModelClient,
        gate: &dyn ConsentGate,
        tools: &Toolbox,
    ) -> String {
        self.transcript.push(ChatMessage::user(user_text));
        let request = self.transcript.with_preamble(tools.preamble());

        let completion = match model.complete(&request).await {
            Ok(completion) => completion,
            Err(err) => {
                tracing::error!(model = model.model(), error = %err, "Model call failed");
                return MODEL_FAILURE_MESSAGE.to_string();
            }
        };

        let reply = match parse_invocation(&completion) {
            None => completion,
            Some(invocation) => {
                tracing::info!(
                    tool = invocation.name(),
                    path = invocation.target_path(),
                    "Tool call detected"
                );
                let outcome = run_invocation(
                    &invocation,
                    trusted_root,
                    tools.registry(),
                    tools.settings(),
                    gate,
                )
                .await;
                format!("{completion}{TOOL_OUTCOME_DELIMITER}{outcome}")
            }
        };

        self.transcript.push(ChatMessage::assistant(reply.clone()));
        reply
    }
}
