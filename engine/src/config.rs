use serde::Deserialize;
use std::{env, path::Path, path::PathBuf, time::Duration};

use warden_providers::retry::RetryConfig;
use warden_providers::{ApiConfig, OPENAI_API_BASE_URL};
use warden_tools::config::ToolsConfig;
use warden_types::ApiKey;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

// Default value function for serde (bool::default() is false, so only true needs a fn)
pub(crate) const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct WardenConfig {
    pub app: Option<AppConfig>,
    pub api: Option<ApiSection>,
    pub tools: Option<ToolsConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no API key: set api.api_key in the config file or {API_KEY_ENV}")]
    MissingApiKey,
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::MissingApiKey => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub model: Option<String>,
    /// Extra instructions placed ahead of the built-in protocol preamble.
    pub system_prompt: Option<String>,
    /// Send the protocol preamble with each request.
    #[serde(default = "default_true")]
    pub send_system_prompt: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            send_system_prompt: true,
        }
    }
}

/// `[api]` section.
#[derive(Default, Deserialize)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSection")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &self.api_key.as_ref().map_or("<none>", |_| "<redacted>"),
            )
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(pos) = rest.find("${") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[pos..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl WardenConfig {
    /// Load from `path`, or from [`config_path`] when `None`.
    ///
    /// A missing file is `Ok(None)`.
    pub fn load(path: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        let path = match path.map(Path::to_path_buf).or_else(config_path) {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match Self::parse(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.app
            .as_ref()
            .and_then(|app| app.model.as_deref())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api
            .as_ref()
            .and_then(|api| api.base_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(OPENAI_API_BASE_URL)
    }

    /// Config `api.api_key` (with `${VAR}` expansion), then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<ApiKey, ConfigError> {
        self.resolve_api_key_with(|| env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key_with(
        &self,
        env_key: impl FnOnce() -> Option<String>,
    ) -> Result<ApiKey, ConfigError> {
        let from_config = self
            .api
            .as_ref()
            .and_then(|api| api.api_key.as_deref())
            .map(expand_env_vars);

        from_config
            .and_then(|raw| ApiKey::new(raw).ok())
            .or_else(|| env_key().and_then(|raw| ApiKey::new(raw).ok()))
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Model client settings, with command-line overrides for model and base URL.
    pub fn api_config(
        &self,
        model: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<ApiConfig, ConfigError> {
        let api_key = self.resolve_api_key()?;
        let api = self.api.as_ref();

        let mut retry = RetryConfig::default();
        if let Some(max_retries) = api.and_then(|api| api.max_retries) {
            retry.max_retries = max_retries;
        }
        let timeout_secs = api
            .and_then(|api| api.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(ApiConfig::new(api_key, model.unwrap_or_else(|| self.model()))
            .with_base_url(base_url.unwrap_or_else(|| self.base_url()))
            .with_temperature(api.and_then(|api| api.temperature))
            .with_max_tokens(api.and_then(|api| api.max_tokens))
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_retry(retry))
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".warden").join("config.toml"))
}
