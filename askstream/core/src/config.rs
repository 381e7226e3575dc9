//! TOML Configuration File Support
//!
//! Engine configuration loaded from `$XDG_CONFIG_HOME/askstream/askstream.toml`
//! (typically `~/.config/askstream/askstream.toml`).
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
//! [endpoint]
//! api_url = "https://agents.example.com"
//! ask_path = "/api/v1/agents/ask"
//! auth_token = "..."
//!
//! [stream]
//! framing = "event_stream"
//! connect_timeout_ms = 10000
//! read_timeout_ms = 0
//! max_record_bytes = 1048576
//! marker = "PREQUESTIONEND"
//!
//! [pacing]
//! policy = "char-rate:3/50"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::SessionSettings;
use crate::decoder::{DecoderOptions, Framing, DEFAULT_MARKER, DEFAULT_MAX_RECORD_BYTES};
use crate::pacing::PacingPolicy;

/// Backend used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Path of the ask endpoint below the API URL
pub const DEFAULT_ASK_PATH: &str = "/api/v1/agents/ask";

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Environment variables read by [`load_config_from_path`]
pub const ENV_VARS: [&str; 8] = [
    "ASKSTREAM_API_URL",
    "ASKSTREAM_ASK_PATH",
    "ASKSTREAM_TOKEN",
    "ASKSTREAM_SESSION_KEY",
    "ASKSTREAM_FRAMING",
    "ASKSTREAM_PACING",
    "ASKSTREAM_CONNECT_TIMEOUT",
    "ASKSTREAM_READ_TIMEOUT",
];

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

/// Endpoint section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointToml {
    /// Backend base URL
    pub api_url: Option<String>,

    /// Ask endpoint path
    pub ask_path: Option<String>,

    /// Bearer token
    pub auth_token: Option<String>,

    /// Fixed conversation key
    pub session_key: Option<String>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Requested framing (`event_stream` or `raw`)
    pub framing: Option<Framing>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Read timeout in milliseconds (0 = no timeout)
    pub read_timeout_ms: Option<u64>,

    /// Largest unterminated event-stream record
    pub max_record_bytes: Option<usize>,

    /// Raw-framed preamble marker
    pub marker: Option<String>,
}

/// Pacing section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingToml {
    /// Policy in compact form, e.g. `chunk:4` or `char-rate:3/50`
    pub policy: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AskstreamToml {
    /// Endpoint configuration section
    pub endpoint: EndpointToml,

    /// Stream configuration section
    pub stream: StreamToml,

    /// Pacing configuration section
    pub pacing: PacingToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved engine configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Backend base URL
    pub api_url: String,

    /// Ask endpoint path
    pub ask_path: String,

    /// Bearer token
    pub auth_token: Option<String>,

    /// Fixed conversation key; generated per conversation when unset
    pub session_key: Option<String>,

    /// Requested framing
    pub framing: Framing,

    /// Pacing policy
    pub pacing: PacingPolicy,

    /// Connection timeout in milliseconds (0 = none)
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds (0 = none)
    pub read_timeout_ms: u64,

    /// Largest unterminated event-stream record
    pub max_record_bytes: usize,

    /// Raw-framed preamble marker
    pub marker: String,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    pub(crate) source: ConfigSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ask_path: DEFAULT_ASK_PATH.to_string(),
            auth_token: None,
            session_key: None,
            framing: Framing::default(),
            pacing: PacingPolicy::default(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: 0,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            marker: DEFAULT_MARKER.to_string(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl EngineConfig {
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

    /// Full ask URL
    #[must_use]
    pub fn ask_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            self.ask_path.trim_start_matches('/')
        )
    }

    /// Connection timeout, if any
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    /// Read timeout, if any
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    /// Per-session settings derived from this configuration
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            framing: self.framing,
            pacing: self.pacing,
            decoder: DecoderOptions {
                marker: self.marker.clone(),
                max_record_bytes: self.max_record_bytes,
            },
        }
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        self.pacing.validate().map_err(ConfigError::ValidationError)?;
        if self.max_record_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_record_bytes must be at least 1".to_string(),
            ));
        }
        if self.marker.is_empty() {
            return Err(ConfigError::ValidationError(
                "marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/askstream/askstream.toml` or
/// `~/.config/askstream/askstream.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("askstream").join("askstream.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if a
/// value fails validation. A missing config file is not an error.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<EngineConfig, ConfigError> {
    let mut config = EngineConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: AskstreamToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
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

    apply_env_config(&mut config)?;
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut EngineConfig, toml: &AskstreamToml) -> Result<(), ConfigError> {
    // Endpoint settings
    if let Some(url) = &toml.endpoint.api_url {
        config.api_url.clone_from(url);
    }
    if let Some(path) = &toml.endpoint.ask_path {
        config.ask_path.clone_from(path);
    }
    if toml.endpoint.auth_token.is_some() {
        config.auth_token.clone_from(&toml.endpoint.auth_token);
    }
    if toml.endpoint.session_key.is_some() {
        config.session_key.clone_from(&toml.endpoint.session_key);
    }

    // Stream settings
    if let Some(framing) = toml.stream.framing {
        config.framing = framing;
    }
    if let Some(timeout) = toml.stream.connect_timeout_ms {
        config.connect_timeout_ms = timeout;
    }
    if let Some(timeout) = toml.stream.read_timeout_ms {
        config.read_timeout_ms = timeout;
    }
    if let Some(max) = toml.stream.max_record_bytes {
        config.max_record_bytes = max;
    }
    if let Some(marker) = &toml.stream.marker {
        config.marker.clone_from(marker);
    }

    // Pacing settings
    if let Some(policy) = &toml.pacing.policy {
        config.pacing = policy.parse().map_err(ConfigError::ValidationError)?;
    }
    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut EngineConfig) -> Result<(), ConfigError> {
    if let Ok(url) = std::env::var("ASKSTREAM_API_URL") {
        config.api_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(path) = std::env::var("ASKSTREAM_ASK_PATH") {
        config.ask_path = path;
        config.source = ConfigSource::Env;
    }
    if let Ok(token) = std::env::var("ASKSTREAM_TOKEN") {
        config.auth_token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Ok(key) = std::env::var("ASKSTREAM_SESSION_KEY") {
        config.session_key = Some(key);
        config.source = ConfigSource::Env;
    }
    if let Ok(framing) = std::env::var("ASKSTREAM_FRAMING") {
        config.framing = framing.parse().map_err(ConfigError::ValidationError)?;
        config.source = ConfigSource::Env;
    }
    if let Ok(policy) = std::env::var("ASKSTREAM_PACING") {
        config.pacing = policy.parse().map_err(ConfigError::ValidationError)?;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("ASKSTREAM_CONNECT_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.connect_timeout_ms = ms;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(timeout) = std::env::var("ASKSTREAM_READ_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.read_timeout_ms = ms;
            config.source = ConfigSource::Env;
        }
    }
    Ok(())
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// API URL override
    pub api_url: Option<String>,

    /// Bearer token override
    pub auth_token: Option<String>,

    /// Framing override
    pub framing: Option<Framing>,

    /// Pacing policy override
    pub pacing: Option<PacingPolicy>,

    /// Read timeout override (milliseconds)
    pub read_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API URL override
    #[must_use]
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = Some(url);
        self
    }

    /// Set bearer token override
    #[must_use]
    pub fn with_auth_token(mut self, token: String) -> Self {
        self.auth_token = Some(token);
        self
    }

    /// Set framing override
    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = Some(framing);
        self
    }

    /// Set pacing policy override
    #[must_use]
    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Set read timeout override
    #[must_use]
    pub fn with_read_timeout_ms(mut self, ms: u64) -> Self {
        self.read_timeout_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the result is invalid.
    pub fn apply(&self, config: &mut EngineConfig) -> Result<(), ConfigError> {
        if self.api_url.is_some()
            || self.auth_token.is_some()
            || self.framing.is_some()
            || self.pacing.is_some()
            || self.read_timeout_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.api_url {
            config.api_url.clone_from(url);
        }
        if self.auth_token.is_some() {
            config.auth_token.clone_from(&self.auth_token);
        }
        if let Some(framing) = self.framing {
            config.framing = framing;
        }
        if let Some(pacing) = self.pacing {
            config.pacing = pacing;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout_ms = ms;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
