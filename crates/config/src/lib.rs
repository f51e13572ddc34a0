//! Configuration loading, validation, and management for InboxPilot.
//!
//! Loads configuration from an optional TOML file (`INBOXPILOT_CONFIG`, or
//! `./inboxpilot.toml`) and overlays environment variables on top. The
//! result is validated once at startup: a deployment whose default provider
//! has no credential never starts serving.

use inboxpilot_core::ProviderKind;
use inboxpilot_core::email::MAX_CONTEXT_CHARS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "INBOXPILOT_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "inboxpilot.toml";

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider used when a request carries no override ("openai" or "claude")
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Upstream model settings
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// HTTP server settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Bearer token verification
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-client request quota on the suggestion endpoint
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Output contract settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_provider() -> String {
    "openai".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_provider", &self.default_provider)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("auth", &self.auth)
            .field("rate_limit", &self.rate_limit)
            .field("validation", &self.validation)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Upper bound on a single upstream call.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reject unknown `X-AI-Provider` values instead of falling back.
    #[serde(default)]
    pub strict_names: bool,

    #[serde(default)]
    pub openai: ProviderConfig,

    #[serde(default)]
    pub claude: ProviderConfig,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            strict_names: false,
            openai: ProviderConfig::default(),
            claude: ProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.claude,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderConfig {
    /// The API key, if set to something other than whitespace.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Default model identifier per provider family.
pub fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "gpt-4o-mini",
        ProviderKind::Anthropic => "claude-sonnet-4.5",
    }
}

/// Environment variable holding the credential for a provider family.
pub fn credential_env(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "CLAUDE_API_KEY",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body size limit in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

/// Worst case JSON escaping is a surrogate pair, `\uXXXX\uXXXX`, 12 bytes a char.
fn default_max_body_bytes() -> usize {
    (MAX_CONTEXT_CHARS * 12).next_power_of_two()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for HS256 bearer tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &redact(&self.jwt_secret))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: usize,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_requests_per_window() -> usize {
    5
}
fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Require `action` and `send_permission` to be known values.
    #[serde(default = "default_true")]
    pub strict_enums: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { strict_enums: true }
    }
}

impl AppConfig {
    /// Load configuration from the file named by `INBOXPILOT_CONFIG` (or
    /// `./inboxpilot.toml`), overlay the process environment, and validate.
    ///
    /// Environment variables:
    /// - `AI_PROVIDER`: default provider name
    /// - `OPENAI_API_KEY`, `OPENAI_API_BASE`, `OPENAI_MODEL`
    /// - `CLAUDE_API_KEY`, `CLAUDE_API_BASE`, `CLAUDE_MODEL`
    /// - `JWT_SECRET`
    /// - `INBOXPILOT_HOST`, `INBOXPILOT_PORT`
    /// - `RATE_LIMIT_PER_MINUTE`
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::load_unchecked()?;
        config.validate()?;
        Ok(config)
    }

    /// File plus environment, without validation. For diagnostics and
    /// commands that need only part of the configuration.
    pub fn load_unchecked() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// The config file location: `INBOXPILOT_CONFIG` or `./inboxpilot.toml`.
    pub fn config_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Like [`AppConfig::load`] but with an explicit file and variable lookup.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from(path)?;
        config.apply_env_with(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file. A missing file yields defaults; no validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Overlay environment variables. Set variables win over file values.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = var("AI_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(key) = var("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_API_BASE") {
            self.providers.openai.api_url = Some(url);
        }
        if let Some(model) = var("OPENAI_MODEL") {
            self.providers.openai.model = Some(model);
        }

        if let Some(key) = var("CLAUDE_API_KEY") {
            self.providers.claude.api_key = Some(key);
        }
        if let Some(url) = var("CLAUDE_API_BASE") {
            self.providers.claude.api_url = Some(url);
        }
        if let Some(model) = var("CLAUDE_MODEL") {
            self.providers.claude.model = Some(model);
        }

        if let Some(secret) = var("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }

        if let Some(host) = var("INBOXPILOT_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = var("INBOXPILOT_PORT") {
            self.gateway.port = parse_var("INBOXPILOT_PORT", &port)?;
        }
        if let Some(limit) = var("RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.requests_per_window = parse_var("RATE_LIMIT_PER_MINUTE", &limit)?;
            self.rate_limit.window_secs = 60;
        }

        Ok(())
    }

    /// The default provider family. Fails on names outside the known set.
    pub fn default_provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        ProviderKind::parse(&self.default_provider)
            .ok_or_else(|| ConfigError::UnsupportedProvider(self.default_provider.clone()))
    }

    /// The model to request from `kind`, falling back to the family default.
    pub fn model_for(&self, kind: ProviderKind) -> &str {
        self.providers
            .get(kind)
            .model
            .as_deref()
            .unwrap_or(default_model(kind))
    }

    /// Validate the configuration. Every failure here is startup-fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = self.default_provider_kind()?;

        if self.providers.get(kind).credential().is_none() {
            return Err(ConfigError::MissingCredential {
                provider: kind.to_string(),
                env_var: credential_env(kind),
            });
        }

        if self
            .auth
            .jwt_secret
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET must be set to verify bearer tokens".into(),
            ));
        }

        if self.rate_limit.requests_per_window == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.requests_per_window and rate_limit.window_secs must be > 0".into(),
            ));
        }

        if self.providers.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "providers.request_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: ProvidersConfig::default(),
            gateway: GatewayConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Unsupported default provider '{0}' (expected 'openai' or 'claude')")]
    UnsupportedProvider(String),

    #[error("{env_var} missing for default provider '{provider}'")]
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
