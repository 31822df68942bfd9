//! Configuration loading, validation, and management for docbridge.
//!
//! Loads configuration from `~/.docbridge/config.toml`, then a `.env` file in
//! the working directory, then environment variables (highest priority).
//! A missing credential or endpoint is not a startup error: the completion
//! calls fail later with an authentication or connection diagnostic.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the completion endpoint credential.
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
/// Fallback credential variable for plain OpenAI-compatible endpoints.
pub const ENV_API_KEY_FALLBACK: &str = "OPENAI_API_KEY";
/// Environment variable holding the completion endpoint base URL.
pub const ENV_API_URL: &str = "AZURE_OPENAI_ENDPOINT";
/// Environment variable holding the model or deployment name.
pub const ENV_MODEL: &str = "AZURE_OPENAI_MODEL";
/// Environment variable holding the tool server SSE URL.
pub const ENV_MCP_URL: &str = "DOCBRIDGE_MCP_URL";

/// The root configuration structure.
///
/// Maps directly to `~/.docbridge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential for the completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the completion endpoint (e.g. `https://my-proxy/openai/v1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model or deployment identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature; kept low for grounded answers
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional cap on generated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// How many search results are fetched into the context
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,

    /// Tool server settings
    #[serde(default)]
    pub mcp: McpConfig,

    /// HTTP client settings for the completion endpoint
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_articles() -> usize {
    3
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_articles", &self.max_articles)
            .field("mcp", &self.mcp)
            .field("http", &self.http)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// SSE URL of the documentation tool server
    #[serde(default = "default_mcp_url")]
    pub url: String,

    /// Time allowed for the SSE handshake and `initialize`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// First searches can trigger indexing on the server side
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,

    #[serde(default = "default_view_timeout")]
    pub view_timeout_secs: u64,

    /// The server-side agent may run several tool rounds
    #[serde(default = "default_ask_timeout")]
    pub ask_timeout_secs: u64,
}

fn default_mcp_url() -> String {
    "http://localhost:8000/sse".into()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_search_timeout() -> u64 {
    180
}
fn default_view_timeout() -> u64 {
    60
}
fn default_ask_timeout() -> u64 {
    300
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: default_mcp_url(),
            connect_timeout_secs: default_connect_timeout(),
            search_timeout_secs: default_search_timeout(),
            view_timeout_secs: default_view_timeout(),
            ask_timeout_secs: default_ask_timeout(),
        }
    }
}

impl McpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn view_timeout(&self) -> Duration {
        Duration::from_secs(self.view_timeout_secs)
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_secs(self.ask_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout applied by the HTTP client
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_http_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.docbridge/config.toml),
    /// a `.env` file in the working directory, and the environment.
    ///
    /// Environment variables (highest priority):
    /// - `AZURE_OPENAI_API_KEY`, falling back to `OPENAI_API_KEY`
    /// - `AZURE_OPENAI_ENDPOINT`
    /// - `AZURE_OPENAI_MODEL`
    /// - `DOCBRIDGE_MCP_URL`
    pub fn load() -> Result<Self, ConfigError> {
        load_dotenv();

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY).or_else(|| get(ENV_API_KEY_FALLBACK)) {
            self.api_key = Some(key);
        }
        if let Some(url) = get(ENV_API_URL) {
            self.api_url = Some(url);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(url) = get(ENV_MCP_URL) {
            self.mcp.url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docbridge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_articles == 0 {
            return Err(ConfigError::ValidationError(
                "max_articles must be at least 1".into(),
            ));
        }

        let timeouts = [
            ("mcp.connect_timeout_secs", self.mcp.connect_timeout_secs),
            ("mcp.search_timeout_secs", self.mcp.search_timeout_secs),
            ("mcp.view_timeout_secs", self.mcp.view_timeout_secs),
            ("mcp.ask_timeout_secs", self.mcp.ask_timeout_secs),
            ("http.timeout_secs", self.http.timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        Ok(())
    }

    /// Check if a credential is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The endpoint base URL, or an empty string when unset.
    pub fn api_url_or_empty(&self) -> &str {
        self.api_url.as_deref().unwrap_or("")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            max_articles: default_max_articles(),
            mcp: McpConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Load `.env` from the working directory; a missing file is not an error.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
