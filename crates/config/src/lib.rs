//! Configuration loading, validation, and management for Mercy.
//!
//! Loads configuration from `~/.mercy/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use mercy_core::identity::Identity;
use mercy_core::provider::GenerationOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mercy/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Companion persona
    #[serde(default)]
    pub bot: Identity,

    /// Model backend configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Telegram transport configuration
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Record storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Conversation window and memory digest sizes
    #[serde(default)]
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Full URL of the chat endpoint
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Upper bound on one generation call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub options: GenerationOptions,
}

fn default_ollama_url() -> String {
    "http://localhost:11434/api/chat".into()
}
fn default_model() -> String {
    "qwen2.5".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            options: GenerationOptions::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,

    /// Long-polling timeout for `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".into()]
}
fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: default_allowed_users(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &redact(&self.bot_token))
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `~/.mercy/data/mercy_memory.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StorageConfig {
    /// The effective database path.
    pub fn database_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| AppConfig::data_dir().join("mercy_memory.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Turns kept per user (user and assistant turns each count as one)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Facts injected into the prompt
    #[serde(default = "default_digest_items")]
    pub digest_facts: usize,

    /// Pending tasks injected into the prompt
    #[serde(default = "default_digest_items")]
    pub digest_tasks: usize,
}

fn default_max_turns() -> usize {
    10
}
fn default_digest_items() -> usize {
    3
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            digest_facts: default_digest_items(),
            digest_tasks: default_digest_items(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.mercy/config.toml).
    ///
    /// Environment variables override the file:
    /// - `TELEGRAM_TOKEN`
    /// - `OLLAMA_URL`
    /// - `MODEL_NAME`
    /// - `MERCY_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("TELEGRAM_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(url) = non_empty("OLLAMA_URL") {
            self.ollama.url = url;
        }
        if let Some(model) = non_empty("MODEL_NAME") {
            self.ollama.model = model;
        }
        if let Some(path) = non_empty("MERCY_DB_PATH") {
            self.storage.path = Some(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mercy")
    }

    /// Get the data directory path (database lives here).
    pub fn data_dir() -> PathBuf {
        Self::config_dir().join("data")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let options = &self.ollama.options;
        if !(0.0..=2.0).contains(&options.temperature) {
            return Err(ConfigError::ValidationError(
                "ollama.options.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if options.top_p <= 0.0 || options.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "ollama.options.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.ollama.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ollama.timeout_secs must be > 0".into(),
            ));
        }

        if self.ollama.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("ollama.model must not be empty".into()));
        }

        // User/assistant turns are committed in pairs; an odd cap would
        // split a pair at the window edge.
        let turns = self.conversation.max_turns;
        if turns < 2 || turns % 2 != 0 {
            return Err(ConfigError::ValidationError(
                "conversation.max_turns must be an even number >= 2".into(),
            ));
        }

        Ok(())
    }

    /// Check if a Telegram token is available (from config or environment).
    pub fn has_telegram_token(&self) -> bool {
        self.telegram
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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
