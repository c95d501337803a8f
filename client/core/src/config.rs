//! TOML Configuration File Support
//!
//! Centralized configuration loading for the chat client, supporting a TOML
//! configuration file at `~/.config/chat-client/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! endpoint_url = "https://agents.example.com/api/v1"
//! request_timeout_ms = 10000
//! stream_timeout_ms = 120000
//!
//! [auth]
//! token = "..."
//! session_cookie = "..."
//! require_session = true
//!
//! [identity]
//! storage_path = "/home/me/.local/share/chat-client/storage.json"
//! id_strategy = "uuid"
//!
//! [chat]
//! history_limit = 50
//! progress_label = "Thinking..."
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{FileStore, IdStrategy, IdentityStore, MemoryStore};

/// Default agent API base
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:8000/api/v1";

/// Default progress label while no content has streamed
pub const DEFAULT_PROGRESS_LABEL: &str = "Thinking...";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// API section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Agent API base URL
    pub endpoint_url: Option<String>,

    /// Single-shot request timeout in milliseconds
    pub request_timeout_ms: Option<u64>,

    /// Longest silence between stream chunks, in milliseconds
    pub stream_timeout_ms: Option<u64>,
}

/// Auth section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthToml {
    /// Bearer credential
    pub token: Option<String>,

    /// Session cookie for profile lookup
    pub session_cookie: Option<String>,

    /// Refuse to start without a session cookie
    pub require_session: Option<bool>,
}

/// Identity section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityToml {
    /// Client-local storage file
    pub storage_path: Option<PathBuf>,

    /// Fixed participant ID
    pub participant_id: Option<String>,

    /// How conversation IDs are minted
    pub id_strategy: Option<IdStrategy>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Maximum history entries sent per turn
    pub history_limit: Option<usize>,

    /// Default progress label
    pub progress_label: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// API section
    pub api: ApiToml,

    /// Auth section
    pub auth: AuthToml,

    /// Identity section
    pub identity: IdentityToml,

    /// Chat section
    pub chat: ChatToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved API settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    /// Agent API base URL
    pub endpoint_url: String,
    /// Single-shot request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Longest silence between stream chunks, in milliseconds
    pub stream_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            request_timeout_ms: 10_000,
            stream_timeout_ms: 120_000,
        }
    }
}

/// Resolved auth settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthConfig {
    /// Bearer credential; falls back to storage, then a demo placeholder
    pub token: Option<String>,
    /// Session cookie for profile lookup
    pub session_cookie: Option<String>,
    /// Refuse to start without a session cookie
    pub require_session: bool,
}

/// Resolved identity settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Client-local storage file; `None` uses the XDG data directory
    pub storage_path: Option<PathBuf>,
    /// Fixed participant ID; `None` generates one per process
    pub participant_id: Option<String>,
    /// How conversation IDs are minted
    pub id_strategy: IdStrategy,
}

/// Resolved chat settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    /// Maximum history entries sent per turn (`None` = all)
    pub history_limit: Option<usize>,
    /// Default progress label
    pub progress_label: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: None,
            progress_label: DEFAULT_PROGRESS_LABEL.to_string(),
        }
    }
}

/// Centralized configuration for the chat client
///
/// Consolidates configuration from multiple sources and tracks where it came
/// from. Use [`load_config`] to load configuration with proper priority
/// handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API settings
    pub api: ApiConfig,

    /// Auth settings
    pub auth: AuthConfig,

    /// Identity settings
    pub identity: IdentityConfig,

    /// Chat settings
    pub chat: ChatConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            identity: IdentityConfig::default(),
            chat: ChatConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would only fail later at request time
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.api.endpoint_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint_url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.api.request_timeout_ms == 0 || self.api.stream_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.chat.history_limit == Some(0) {
            return Err(ConfigError::ValidationError(
                "history_limit must be at least 1 (omit it to send everything)".to_string(),
            ));
        }
        Ok(())
    }

    /// Open the client-local store described by this configuration
    ///
    /// Falls back to an in-memory store when there is no data directory.
    #[must_use]
    pub fn identity_store(&self) -> Arc<dyn IdentityStore> {
        match self
            .identity
            .storage_path
            .clone()
            .or_else(FileStore::default_path)
        {
            Some(path) => Arc::new(FileStore::new(path)),
            None => {
                tracing::warn!("No data directory available, identity will not persist");
                Arc::new(MemoryStore::new())
            }
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/chat-client/config.toml` or
/// `~/.config/chat-client/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chat-client").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_with(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Load defaults plus the TOML file, without consulting the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_file_config(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.api.endpoint_url {
        config.api.endpoint_url = url.clone();
    }
    if let Some(timeout) = toml.api.request_timeout_ms {
        config.api.request_timeout_ms = timeout;
    }
    if let Some(timeout) = toml.api.stream_timeout_ms {
        config.api.stream_timeout_ms = timeout;
    }

    if toml.auth.token.is_some() {
        config.auth.token = toml.auth.token.clone();
    }
    if toml.auth.session_cookie.is_some() {
        config.auth.session_cookie = toml.auth.session_cookie.clone();
    }
    if let Some(required) = toml.auth.require_session {
        config.auth.require_session = required;
    }

    if toml.identity.storage_path.is_some() {
        config.identity.storage_path = toml.identity.storage_path.clone();
    }
    if toml.identity.participant_id.is_some() {
        config.identity.participant_id = toml.identity.participant_id.clone();
    }
    if let Some(strategy) = toml.identity.id_strategy {
        config.identity.id_strategy = strategy;
    }

    if toml.chat.history_limit.is_some() {
        config.chat.history_limit = toml.chat.history_limit;
    }
    if let Some(ref label) = toml.chat.progress_label {
        config.chat.progress_label = label.clone();
    }
}

/// Apply environment overrides read through `lookup`
///
/// `load_config` passes `std::env::var`; tests pass a map.
pub fn apply_env_with<F>(config: &mut ClientConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("CHAT_API_ENDPOINT_URL") {
        config.api.endpoint_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(token) = lookup("CHAT_API_TOKEN") {
        config.auth.token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(cookie) = lookup("CHAT_SESSION_COOKIE") {
        config.auth.session_cookie = Some(cookie);
        config.source = ConfigSource::Env;
    }
    if let Some(user) = lookup("CHAT_USER_ID") {
        config.identity.participant_id = Some(user);
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup("CHAT_STORAGE_PATH") {
        config.identity.storage_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup("CHAT_REQUEST_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.api.request_timeout_ms = ms;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring non-numeric CHAT_REQUEST_TIMEOUT");
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub endpoint_url: Option<String>,

    /// Session cookie override
    pub session_cookie: Option<String>,

    /// Participant ID override
    pub participant_id: Option<String>,

    /// Storage file override
    pub storage_path: Option<PathBuf>,

    /// Bearer credential override
    pub token: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_endpoint_url(mut self, url: String) -> Self {
        self.endpoint_url = Some(url);
        self
    }

    /// Set session cookie override
    #[must_use]
    pub fn with_session_cookie(mut self, cookie: String) -> Self {
        self.session_cookie = Some(cookie);
        self
    }

    /// Set participant ID override
    #[must_use]
    pub fn with_participant_id(mut self, id: String) -> Self {
        self.participant_id = Some(id);
        self
    }

    /// Set storage file override
    #[must_use]
    pub fn with_storage_path(mut self, path: PathBuf) -> Self {
        self.storage_path = Some(path);
        self
    }

    /// Set bearer credential override
    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.endpoint_url.is_some()
            || self.session_cookie.is_some()
            || self.participant_id.is_some()
            || self.storage_path.is_some()
            || self.token.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.endpoint_url {
            config.api.endpoint_url = url.clone();
        }
        if let Some(ref cookie) = self.session_cookie {
            config.auth.session_cookie = Some(cookie.clone());
        }
        if let Some(ref id) = self.participant_id {
            config.identity.participant_id = Some(id.clone());
        }
        if let Some(ref path) = self.storage_path {
            config.identity.storage_path = Some(path.clone());
        }
        if let Some(ref token) = self.token {
            config.auth.token = Some(token.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
