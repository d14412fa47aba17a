//! User consent for pending tool calls.
//!
//! The gate is an injected capability so hosts can prompt however they like
//! and tests can answer deterministically. Decisions are never remembered:
//! the pipeline asks once per invocation, including repeats.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use warden_types::{ConsentDecision, ToolName};

pub type ConsentFut<'a> = Pin<Box<dyn Future<Output = ConsentDecision> + Send + 'a>>;

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub tool_name: ToolName,
    /// Already validated against the trusted root.
    pub path: PathBuf,
    /// One-line description, e.g. `write_file /p/notes/a.txt (5 bytes)`.
    pub summary: String,
}

pub trait ConsentGate: Send + Sync {
    /// Suspend until the user answers.
    fn request<'a>(&'a self, request: &'a ConsentRequest) -> ConsentFut<'a>;
}
