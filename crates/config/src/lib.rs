//! Configuration loading, validation, and management for ChatPTK.
//!
//! Loads configuration from `./chatptk.toml` (or the file named by
//! `CHATPTK_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `chatptk.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream API key (usually supplied through `PTK_API_K`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Secret used to sign session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_secret: Option<String>,

    /// Completion provider name
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model id sent with every completion request
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per completion (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Lesson and student tables
    #[serde(default)]
    pub data: DataConfig,

    /// Tutor behavior
    #[serde(default)]
    pub tutor: TutorConfig,

    /// Session store configuration
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".into()
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
            .field("api_key", &redact(&self.api_key))
            .field("session_secret", &redact(&self.session_secret))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("gateway", &self.gateway)
            .field("data", &self.data)
            .field("tutor", &self.tutor)
            .field("session", &self.session)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS. Empty = mirror the request origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_lessons_path")]
    pub lessons_path: PathBuf,

    #[serde(default = "default_students_path")]
    pub students_path: PathBuf,
}

fn default_lessons_path() -> PathBuf {
    PathBuf::from("data/knowledge.json")
}
fn default_students_path() -> PathBuf {
    PathBuf::from("data/students.json")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            lessons_path: default_lessons_path(),
            students_path: default_students_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    /// Student id used when a request does not carry one
    #[serde(default = "default_student_id")]
    pub default_student_id: String,

    /// Per-mode temperature overrides (mode name → temperature)
    #[serde(default)]
    pub temperatures: HashMap<String, f32>,
}

fn default_student_id() -> String {
    "2024-0001".into()
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            default_student_id: default_student_id(),
            temperatures: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle minutes before a session is forgotten
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    /// Upper bound on live sessions; the stalest is evicted beyond it
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_ttl_minutes() -> u64 {
    60
}
fn default_max_sessions() -> usize {
    10_000
}
fn default_cookie_name() -> String {
    "chatptk_session".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            max_sessions: default_max_sessions(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// The two credentials the gateway refuses to start without.
#[derive(Clone)]
pub struct Secrets {
    pub api_key: String,
    pub session_secret: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &"[REDACTED]")
            .field("session_secret", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path.
    ///
    /// Environment overrides (highest priority):
    /// - `PTK_API_K` or `CHATPTK_API_KEY` for the upstream credential
    /// - `CHATPTK_SESSION_SECRET` or `SECRET_KEY` for the cookie secret
    /// - `CHATPTK_MODEL` for the model id
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
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

    /// Path of the config file: `$CHATPTK_CONFIG` or `./chatptk.toml`.
    pub fn config_path() -> PathBuf {
        std::env::var("CHATPTK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("chatptk.toml"))
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("PTK_API_K").or_else(|| lookup("CHATPTK_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(secret) = lookup("CHATPTK_SESSION_SECRET").or_else(|| lookup("SECRET_KEY")) {
            self.session_secret = Some(secret);
        }
        if let Some(model) = lookup("CHATPTK_MODEL") {
            self.model = model;
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (mode, temperature) in &self.tutor.temperatures {
            if !(0.0..=2.0).contains(temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "temperature for mode '{mode}' must be between 0.0 and 2.0"
                )));
            }
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be non-zero".into()));
        }

        if self.session.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_sessions must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Both credentials, or the first one missing.
    pub fn require_secrets(&self) -> Result<Secrets, ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("PTK_API_K"))?;
        let session_secret = self
            .session_secret
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("CHATPTK_SESSION_SECRET"))?;
        Ok(Secrets {
            api_key,
            session_secret,
        })
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            session_secret: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            max_tokens: None,
            gateway: GatewayConfig::default(),
            data: DataConfig::default(),
            tutor: TutorConfig::default(),
            session: SessionConfig::default(),
        }
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

    #[error("Missing required secret: set {0}")]
    MissingSecret(&'static str),
}
