//! Configuration for the feature calculator
//!
//! Configuration is layered: built-in defaults, then an optional YAML
//! file under the `feature_calculator` key, then environment variable
//! overrides.
//!
//! ```yaml
//! feature_calculator:
//!   cache_enabled: true
//!   log_level: INFO
//!   batch_size: 1000
//!   max_workers: 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid value '{value}' for environment variable {var}")]
    Env { var: String, value: String },
}

/// Supported environment types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
    Testing,
}

impl Environment {
    /// Get the environment name
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            "testing" => Ok(Environment::Testing),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Entry time-to-live in seconds (0 disables expiry)
    pub ttl_seconds: u64,
    /// Maximum number of cached feature columns
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_entries: 10_000,
        }
    }
}

/// Calculator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalcConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Whether to cache computed feature columns
    pub cache_enabled: bool,
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: String,
    /// Number of rows per processing batch
    pub batch_size: usize,
    /// Number of worker threads
    pub max_workers: usize,
    /// Cache settings
    pub cache: CacheSettings,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            cache_enabled: true,
            log_level: "INFO".to_string(),
            batch_size: 1000,
            max_workers: 4,
            cache: CacheSettings::default(),
        }
    }
}

/// YAML file wrapper: everything lives under `feature_calculator`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    feature_calculator: CalcConfig,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl CalcConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(file.feature_calculator)
    }

    /// Load configuration from a YAML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Build configuration from defaults plus environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply overrides from process environment variables
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an environment lookup function
    pub fn apply_env_from<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = get("ENVIRONMENT") {
            self.environment = value.parse().map_err(|_| ConfigError::Env {
                var: "ENVIRONMENT".to_string(),
                value,
            })?;
        }
        if let Some(value) = get("CACHE_ENABLED") {
            self.cache_enabled = value.eq_ignore_ascii_case("true");
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = get("BATCH_SIZE") {
            self.batch_size = parse_env("BATCH_SIZE", &value)?;
        }
        if let Some(value) = get("MAX_WORKERS") {
            self.max_workers = parse_env("MAX_WORKERS", &value)?;
        }
        if let Some(value) = get("CACHE_TTL") {
            self.cache.ttl_seconds = parse_env("CACHE_TTL", &value)?;
        }
        if let Some(value) = get("CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse_env("CACHE_MAX_ENTRIES", &value)?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "max_workers must be positive".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level '{}' (expected one of {:?})",
                self.log_level, LOG_LEVELS
            )));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}
