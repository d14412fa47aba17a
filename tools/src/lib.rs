//! Tool Executor Framework - core types, the invocation pipeline, and built-in tools.
//!
//! One invocation moves through a fixed sequence:
//!
//! ```text
//! parse -> lookup -> resolve path -> consent -> execute -> outcome string
//! ```
//!
//! Every failure along the way is a [`ToolError`]; [`run_invocation`] renders
//! it as the outcome string so the conversation can continue.

pub mod builtins;
pub mod config;
pub mod consent;
pub mod protocol;
pub mod sandbox;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use warden_types::{ToolInvocation, ToolName};

pub use builtins::register_builtins;
pub use config::{ReadFileLimits, ToolSettings};
pub use consent::{ConsentFut, ConsentGate, ConsentRequest};
pub use protocol::{build_protocol_instructions, parse_invocation};
pub use sandbox::{ResolvedPath, Sandbox, SymlinkPolicy};

/// Tool execution future type alias.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

/// Error types for tool execution.
///
/// The `Display` text of each variant is the user-visible outcome string.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool call rejected: no project folder is open, so file operations are unavailable.")]
    NoSandboxRoot,
    #[error("Tool call rejected: {0}")]
    SandboxViolation(DenialReason),
    #[error("Permission denied: the user declined {tool} on {}. Nothing was changed.", path.display())]
    ConsentDenied { tool: String, path: PathBuf },
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to {action} {}: {message}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        message: String,
    },
    #[error(
        "Unrecognized operation '{name}'. Supported operations: {}.",
        supported_operations()
    )]
    UnrecognizedOperation { name: String },
    #[error("Invalid tool call: {message}")]
    BadArgs { message: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

impl ToolError {
    pub(crate) fn io(action: &'static str, path: &Path, err: &std::io::Error) -> Self {
        ToolError::Io {
            action,
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

fn supported_operations() -> String {
    ToolName::ALL
        .iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Denial reason for the path sandbox.
#[derive(Debug, Clone)]
pub enum DenialReason {
    PathOutsideSandbox {
        attempted: String,
        resolved: PathBuf,
    },
    SymlinkEscape {
        attempted: String,
        resolved: PathBuf,
    },
    UnsafeCharacters {
        attempted: String,
    },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::PathOutsideSandbox {
                attempted,
                resolved,
            } => write!(
                f,
                "path '{attempted}' is outside the project folder (resolved: {})",
                resolved.display()
            ),
            DenialReason::SymlinkEscape {
                attempted,
                resolved,
            } => write!(
                f,
                "path '{attempted}' leaves the project folder through a symbolic link (resolved: {})",
                resolved.display()
            ),
            DenialReason::UnsafeCharacters { attempted } => write!(
                f,
                "path '{}' contains control characters",
                attempted.escape_debug()
            ),
        }
    }
}

/// A built-in capability the model can invoke by name.
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> ToolName;
    fn description(&self) -> &'static str;
    /// Example invocation block shown to the model in the system preamble.
    fn usage(&self) -> &'static str;
    fn approval_summary(&self, invocation: &ToolInvocation, target: &ResolvedPath) -> String;
    fn execute<'a>(&'a self, invocation: &'a ToolInvocation, target: &'a ResolvedPath)
    -> ToolFut<'a>;
}

/// Name, description and usage of a registered tool, for prompt building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
}

#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<ToolName, Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn register(&mut self, executor: Box<dyn ToolExecutor>) -> Result<(), ToolError> {
        let name = executor.name();
        if self.executors.contains_key(&name) {
            return Err(ToolError::DuplicateTool {
                name: name.to_string(),
            });
        }
        self.executors.insert(name, executor);
        Ok(())
    }

    /// Executor for the invocation's operation name.
    pub fn lookup(&self, invocation: &ToolInvocation) -> Result<&dyn ToolExecutor, ToolError> {
        invocation
            .tool()
            .and_then(|tool| self.executors.get(&tool))
            .map(AsRef::as_ref)
            .ok_or_else(|| ToolError::UnrecognizedOperation {
                name: invocation.name().to_string(),
            })
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .executors
            .values()
            .map(|exec| ToolDefinition {
                name: exec.name().as_str(),
                description: exec.description(),
                usage: exec.usage(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(b.name));
        defs
    }
}

/// Validate, gate and execute one invocation.
///
/// The lookup happens first so an unknown operation never touches the
/// filesystem or prompts the user. Consent is requested only after the path
/// resolved inside the trusted root.
pub async fn execute_invocation(
    invocation: &ToolInvocation,
    trusted_root: Option<&Path>,
    registry: &ToolRegistry,
    settings: &ToolSettings,
    gate: &dyn ConsentGate,
) -> Result<String, ToolError> {
    let executor = registry.lookup(invocation)?;
    let target = resolve_target(trusted_root, invocation.target_path(), settings.symlink_policy)
        .await?;

    let request = ConsentRequest {
        tool_name: executor.name(),
        path: target.as_path().to_path_buf(),
        summary: redact_distillate(&executor.approval_summary(invocation, &target)),
    };
    if !gate.request(&request).await.is_granted() {
        tracing::info!(tool = %request.tool_name, path = %target, "Tool call denied by user");
        return Err(ToolError::ConsentDenied {
            tool: request.tool_name.to_string(),
            path: request.path,
        });
    }

    executor.execute(invocation, &target).await
}

/// Canonicalization touches the filesystem, so resolution runs on the
/// blocking pool.
async fn resolve_target(
    trusted_root: Option<&Path>,
    path: &str,
    symlink_policy: SymlinkPolicy,
) -> Result<ResolvedPath, ToolError> {
    let root = trusted_root.ok_or(ToolError::NoSandboxRoot)?.to_path_buf();
    let attempted = path.to_string();
    tokio::task::spawn_blocking(move || {
        Sandbox::new(Some(root.as_path()), symlink_policy)?.resolve(&attempted)
    })
    .await
    .map_err(|e| ToolError::Io {
        action: "resolve",
        path: PathBuf::from(path),
        message: e.to_string(),
    })?
}

/// Run one invocation and render its terminal state as an outcome string.
pub async fn run_invocation(
    invocation: &ToolInvocation,
    trusted_root: Option<&Path>,
    registry: &ToolRegistry,
    settings: &ToolSettings,
    gate: &dyn ConsentGate,
) -> String {
    match execute_invocation(invocation, trusted_root, registry, settings, gate).await {
        Ok(output) => {
            tracing::info!(tool = invocation.name(), "Tool call completed");
            output
        }
        Err(err) => {
            match &err {
                ToolError::ConsentDenied { .. } => {}
                ToolError::NotFound { .. } | ToolError::Io { .. } => {
                    tracing::warn!(tool = invocation.name(), error = %err, "Tool call failed");
                }
                _ => {
                    tracing::warn!(tool = invocation.name(), error = %err, "Tool call rejected");
                }
            }
            redact_distillate(&err.to_string())
        }
    }
}

/// Shortest run after `sk-` treated as a key.
const MIN_SECRET_BODY_CHARS: usize = 16;

/// Redact obvious secrets in outcome text (best-effort).
///
/// Masks `sk-` followed by at least [`MIN_SECRET_BODY_CHARS`] key characters
/// (`[A-Za-z0-9_-]`), starting at a word boundary. Paths like
/// `task-list.md` or `sk-notes.txt` pass through.
#[must_use]
pub fn redact_distillate(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut prev: Option<char> = None;

    while let Some(ch) = rest.chars().next() {
        let at_boundary = prev.is_none_or(|p| !is_key_char(p));
        if at_boundary && let Some(body) = rest.strip_prefix("sk-") {
            let body_len = body
                .find(|c: char| !is_key_char(c))
                .unwrap_or(body.len());
            if body[..body_len].chars().count() >= MIN_SECRET_BODY_CHARS {
                output.push_str("sk-*******");
                rest = &body[body_len..];
                prev = Some('*');
                continue;
            }
        }
        output.push(ch);
        prev = Some(ch);
        rest = &rest[ch.len_utf8()..];
    }
    output
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
