use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use super::{DenialReason, ToolError};

/// How far path validation goes beyond lexical normalization.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SymlinkPolicy {
    /// Join, collapse `.`/`..`, compare prefixes. Symlinks are not followed.
    #[default]
    Lexical,
    /// Additionally canonicalize the nearest existing ancestor and require it
    /// to stay under the root.
    Strict,
}

/// A path proven to lie under the trusted root.
///
/// Only [`Sandbox::resolve`] constructs one, so executors never re-validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Filesystem sandbox for one turn.
///
/// Built fresh per invocation from whatever root the host reports; nothing
/// about a previous turn's root is retained.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    symlink_policy: SymlinkPolicy,
}

impl Sandbox {
    pub fn new(root: Option<&Path>, symlink_policy: SymlinkPolicy) -> Result<Self, ToolError> {
        let root = root.ok_or(ToolError::NoSandboxRoot)?;
        let canonical = std::fs::canonicalize(root).map_err(|e| {
            tracing::warn!(root = %root.display(), "Trusted root is unavailable: {e}");
            ToolError::NoSandboxRoot
        })?;
        Ok(Self {
            root: canonical,
            symlink_policy,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an untrusted path against the root.
    pub fn resolve(&self, path: &str) -> Result<ResolvedPath, ToolError> {
        if path.trim().is_empty() {
            return Err(ToolError::BadArgs {
                message: "path must not be empty".to_string(),
            });
        }
        if contains_unsafe_path_chars(path) {
            return Err(ToolError::SandboxViolation(
                DenialReason::UnsafeCharacters {
                    attempted: path.to_string(),
                },
            ));
        }

        let resolved = normalize_lexically(&self.root.join(path));
        if !resolved.starts_with(&self.root) {
            return Err(ToolError::SandboxViolation(
                DenialReason::PathOutsideSandbox {
                    attempted: path.to_string(),
                    resolved,
                },
            ));
        }

        if self.symlink_policy == SymlinkPolicy::Strict {
            let canonical = canonicalize_for_create(&resolved)
                .map_err(|e| ToolError::io("resolve", &resolved, &e))?;
            if !canonical.starts_with(&self.root) {
                return Err(ToolError::SandboxViolation(DenialReason::SymlinkEscape {
                    attempted: path.to_string(),
                    resolved: canonical,
                }));
            }
        }

        tracing::debug!(attempted = path, resolved = %resolved.display(), "Path resolved");
        Ok(ResolvedPath(resolved))
    }
}

/// Collapse `.` and `..` without touching the filesystem.
///
/// `..` at the filesystem root stays at the root, matching how the kernel
/// resolves it.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
        }
    }
    out
}

/// Canonicalize for creation: walk up to the nearest existing ancestor.
fn canonicalize_for_create(resolved: &Path) -> std::io::Result<PathBuf> {
    if resolved.exists() {
        return std::fs::canonicalize(resolved);
    }

    let mut existing_ancestor = resolved.parent();
    let mut non_existent_parts: Vec<&std::ffi::OsStr> = Vec::new();

    if let Some(file_name) = resolved.file_name() {
        non_existent_parts.push(file_name);
    }

    while let Some(ancestor) = existing_ancestor {
        if ancestor.exists() {
            break;
        }
        if let Some(dir_name) = ancestor.file_name() {
            non_existent_parts.push(dir_name);
        }
        existing_ancestor = ancestor.parent();
    }

    let existing = existing_ancestor.unwrap_or_else(|| Path::new("/"));
    let mut result = std::fs::canonicalize(existing)?;
    // Collected bottom-up
    for part in non_existent_parts.into_iter().rev() {
        result.push(part);
    }
    Ok(result)
}

fn contains_unsafe_path_chars(input: &str) -> bool {
    input.chars().any(is_unsafe_path_char)
}

/// C0/C1 control characters and DEL.
fn is_unsafe_path_char(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001f}' | '\u{007f}' | '\u{0080}'..='\u{009f}')
}
