//! Built-in tool executors.

use std::io::{ErrorKind, Write as _};
use std::path::Path;

use tempfile::NamedTempFile;
use warden_types::{ToolInvocation, ToolName};

use super::{ReadFileLimits, ResolvedPath, ToolError, ToolExecutor, ToolFut, ToolRegistry};

#[derive(Debug)]
pub struct ReadFileTool {
    limits: ReadFileLimits,
}

impl ReadFileTool {
    #[must_use]
    pub fn new(limits: ReadFileLimits) -> Self {
        Self { limits }
    }
}

#[derive(Debug, Default)]
pub struct WriteFileTool;

impl ToolExecutor for ReadFileTool {
    fn name(&self) -> ToolName {
        ToolName::ReadFile
    }

    fn description(&self) -> &'static str {
        "Read a UTF-8 text file and show its contents."
    }

    fn usage(&self) -> &'static str {
        "<tool_use><tool_name>read_file</tool_name><path>src/main.rs</path></tool_use>"
    }

    fn approval_summary(&self, _invocation: &ToolInvocation, target: &ResolvedPath) -> String {
        format!("read_file {target}")
    }

    fn execute<'a>(
        &'a self,
        _invocation: &'a ToolInvocation,
        target: &'a ResolvedPath,
    ) -> ToolFut<'a> {
        Box::pin(async move {
            let path = target.as_path();
            let meta = tokio::fs::metadata(path)
                .await
                .map_err(|e| read_error(path, &e))?;
            if meta.is_dir() {
                return Err(ToolError::Io {
                    action: "read",
                    path: path.to_path_buf(),
                    message: "path is a directory".to_string(),
                });
            }
            if meta.len() > self.limits.max_file_read_bytes {
                return Err(ToolError::Io {
                    action: "read",
                    path: path.to_path_buf(),
                    message: format!(
                        "file is {} bytes, over the {}-byte read limit",
                        meta.len(),
                        self.limits.max_file_read_bytes
                    ),
                });
            }

            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| read_error(path, &e))?;
            Ok(format_file_contents(target, &content))
        })
    }
}

impl ToolExecutor for WriteFileTool {
    fn name(&self) -> ToolName {
        ToolName::WriteFile
    }

    fn description(&self) -> &'static str {
        "Write text to a file, replacing any existing content. Parent directories are created as needed."
    }

    fn usage(&self) -> &'static str {
        "<tool_use><tool_name>write_file</tool_name><path>notes/todo.md</path><content>- ship it</content></tool_use>"
    }

    fn approval_summary(&self, invocation: &ToolInvocation, target: &ResolvedPath) -> String {
        format!(
            "write_file {target} ({} bytes)",
            invocation.payload().len()
        )
    }

    fn execute<'a>(
        &'a self,
        invocation: &'a ToolInvocation,
        target: &'a ResolvedPath,
    ) -> ToolFut<'a> {
        Box::pin(async move {
            let path = target.as_path();
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ToolError::io("write", path, &e))?;
            }

            let bytes = invocation.payload().as_bytes().to_vec();
            let byte_len = bytes.len();
            let write_path = path.to_path_buf();
            tokio::task::spawn_blocking(move || atomic_write(&write_path, &bytes))
                .await
                .map_err(|e| ToolError::Io {
                    action: "write",
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?
                .map_err(|e| ToolError::io("write", path, &e))?;

            Ok(format!("Wrote {byte_len} bytes to {target}"))
        })
    }
}

/// Register the built-in tools.
pub fn register_builtins(
    registry: &mut ToolRegistry,
    read_limits: ReadFileLimits,
) -> Result<(), ToolError> {
    registry.register(Box::new(ReadFileTool::new(read_limits)))?;
    registry.register(Box::new(WriteFileTool))?;
    Ok(())
}

fn read_error(path: &Path, err: &std::io::Error) -> ToolError {
    if err.kind() == ErrorKind::NotFound {
        ToolError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        ToolError::io("read", path, err)
    }
}

fn format_file_contents(target: &ResolvedPath, content: &str) -> String {
    let fence = if content.contains("```") { "````" } else { "```" };
    let body = content.strip_suffix('\n').unwrap_or(content);
    format!("Contents of {target}:\n{fence}\n{body}\n{fence}")
}

/// Temp file in the target directory, then rename over the target.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
