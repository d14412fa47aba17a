//! Configuration types used by tool executors.
//!
//! Kept here rather than in `warden-engine` so the engine's TOML model can
//! embed `[tools]` directly without the tools crate depending on the engine.

use serde::Deserialize;

use crate::sandbox::SymlinkPolicy;

/// Default cap on the size of a file `read_file` will return.
pub const DEFAULT_MAX_FILE_READ_BYTES: u64 = 1024 * 1024;

/// `[tools]` section of the config file.
///
/// ```toml
/// [tools]
/// max_read_bytes = 1048576
/// symlink_policy = "strict"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ToolsConfig {
    pub max_read_bytes: Option<u64>,
    #[serde(default)]
    pub symlink_policy: SymlinkPolicy,
}

/// Tool-specific limits for `read_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFileLimits {
    pub max_file_read_bytes: u64,
}

impl Default for ReadFileLimits {
    fn default() -> Self {
        Self {
            max_file_read_bytes: DEFAULT_MAX_FILE_READ_BYTES,
        }
    }
}

/// Aggregated tool settings derived from config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolSettings {
    pub read_limits: ReadFileLimits,
    pub symlink_policy: SymlinkPolicy,
}

impl ToolSettings {
    #[must_use]
    pub fn from_config(config: Option<&ToolsConfig>) -> Self {
        let Some(config) = config else {
            return Self::default();
        };
        Self {
            read_limits: ReadFileLimits {
                max_file_read_bytes: config
                    .max_read_bytes
                    .unwrap_or(DEFAULT_MAX_FILE_READ_BYTES),
            },
            symlink_policy: config.symlink_policy,
        }
    }
}
