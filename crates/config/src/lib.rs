//! Configuration loading, validation, and management for Conclave.
//!
//! Loads configuration from a TOML file with `CONCLAVE_*` environment
//! variable overrides for the common scalar settings. Validates all
//! settings at load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConclaveConfig {
    /// Session identifier; conversations persist under this key.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Which selection strategy the coordinator uses.
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Whether the continuity heuristic runs before the strategy.
    #[serde(default = "default_true")]
    pub continuity: bool,

    /// Conversation log settings.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Persistence backend settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ConclaveConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            strategy: StrategyKind::default(),
            continuity: true,
            conversation: ConversationConfig::default(),
            persistence: PersistenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Selection strategy choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Rotating,
    Capability,
    Performance,
    Conditional,
}

impl std::str::FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotating" => Ok(Self::Rotating),
            "capability" => Ok(Self::Capability),
            "performance" => Ok(Self::Performance),
            "conditional" => Ok(Self::Conditional),
            other => Err(ConfigError::Invalid(format!("unknown strategy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum messages kept in the log; oldest evicted first. `None`
    /// keeps everything.
    #[serde(default)]
    pub max_log_messages: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// "memory" or "file".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Root directory for the file backend.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            root: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. "info" or "conclave=debug".
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl ConclaveConfig {
    /// Load from a TOML file, apply env overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse from a TOML string without env overrides or validation.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Environment variables win over file values for scalar settings.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("CONCLAVE_SESSION_ID") {
            self.session_id = id;
        }
        if let Ok(strategy) = std::env::var("CONCLAVE_STRATEGY") {
            if let Ok(kind) = strategy.parse() {
                self.strategy = kind;
            }
        }
        if let Ok(backend) = std::env::var("CONCLAVE_PERSISTENCE_BACKEND") {
            self.persistence.backend = backend;
        }
        if let Ok(level) = std::env::var("CONCLAVE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Reject configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_id.trim().is_empty() {
            return Err(ConfigError::Invalid("session_id must not be empty".into()));
        }
        match self.persistence.backend.as_str() {
            "memory" => {}
            "file" => {
                if self.persistence.root.is_none() {
                    return Err(ConfigError::Invalid(
                        "persistence.root is required for the file backend".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown persistence backend '{other}'"
                )));
            }
        }
        if let Some(max) = self.conversation.max_log_messages {
            if max == 0 {
                return Err(ConfigError::Invalid(
                    "conversation.max_log_messages must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Initialize tracing from the configured filter level. Call once at
/// process startup.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
