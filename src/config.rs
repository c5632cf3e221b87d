//! Configuration management for studydash
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, StudyError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for studydash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hosted backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend-as-a-service connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the hosted backend (REST, auth and realtime live below it)
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Public (anonymous) API key sent as the `apikey` header
    #[serde(default)]
    pub anon_key: String,

    /// Table holding study sessions
    #[serde(default = "default_sessions_table")]
    pub sessions_table: String,

    /// Join table linking users to sessions
    #[serde(default = "default_participants_table")]
    pub participants_table: String,

    /// Path of the server-sent change feed, relative to `url`
    #[serde(default = "default_realtime_path")]
    pub realtime_path: String,

    /// Timeout for each REST or auth request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_sessions_table() -> String {
    "study_sessions".to_string()
}

fn default_participants_table() -> String {
    "session_participants".to_string()
}

fn default_realtime_path() -> String {
    "/realtime/v1/sse".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            anon_key: String::new(),
            sessions_table: default_sessions_table(),
            participants_table: default_participants_table(),
            realtime_path: default_realtime_path(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Build an absolute URL below the configured backend base
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Config` if the base URL or joined path is invalid
    pub fn endpoint(&self, path: &str) -> Result<url::Url> {
        let base = url::Url::parse(&self.url)
            .map_err(|e| StudyError::Config(format!("Invalid backend url: {}", e)))?;
        base.join(path)
            .map_err(|e| StudyError::Config(format!("Invalid endpoint path {}: {}", path, e)).into())
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Persist the signed-in session in the OS keyring between runs
    #[serde(default = "default_persist_session")]
    pub persist_session: bool,

    /// Keyring service name used for the persisted session
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

fn default_persist_session() -> bool {
    true
}

fn default_keyring_service() -> String {
    "studydash".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            persist_session: default_persist_session(),
            keyring_service: default_keyring_service(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON formatted logs instead of human-readable lines
    #[serde(default)]
    pub json_format: bool,

    /// Optional file that receives a copy of every log line
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StudyError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| StudyError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("STUDYDASH_BACKEND_URL") {
            self.backend.url = url;
        }

        if let Ok(anon_key) = std::env::var("STUDYDASH_ANON_KEY") {
            self.backend.anon_key = anon_key;
        }

        if let Ok(timeout) = std::env::var("STUDYDASH_REQUEST_TIMEOUT_SECONDS") {
            match timeout.parse::<u64>() {
                Ok(v) => {
                    self.backend.request_timeout_seconds = v;
                    tracing::debug!(
                        request_timeout_seconds = v,
                        "Env override: STUDYDASH_REQUEST_TIMEOUT_SECONDS"
                    );
                }
                Err(_) => {
                    tracing::warn!("Invalid STUDYDASH_REQUEST_TIMEOUT_SECONDS: {}", timeout);
                }
            }
        }

        if let Ok(persist) = std::env::var("STUDYDASH_PERSIST_SESSION") {
            match persist.parse::<bool>() {
                Ok(v) => self.auth.persist_session = v,
                Err(_) => {
                    tracing::warn!("Invalid value for STUDYDASH_PERSIST_SESSION: {}", persist);
                }
            }
        }

        if let Ok(level) = std::env::var("STUDYDASH_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("STUDYDASH_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json_format = v,
                Err(_) => {
                    tracing::warn!("Invalid value for STUDYDASH_JSON_LOGS: {}", json_logs);
                }
            }
        }

        if let Ok(log_file) = std::env::var("STUDYDASH_LOG_FILE") {
            self.logging.file_path = Some(PathBuf::from(log_file));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Config` describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.backend.url).map_err(|e| {
            StudyError::Config(format!("Invalid backend url {}: {}", self.backend.url, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(StudyError::Config(format!(
                "Invalid backend url scheme: {}. Must be http or https",
                url.scheme()
            ))
            .into());
        }

        if self.backend.sessions_table.trim().is_empty() {
            return Err(
                StudyError::Config("backend.sessions_table cannot be empty".to_string()).into(),
            );
        }

        if self.backend.participants_table.trim().is_empty() {
            return Err(StudyError::Config(
                "backend.participants_table cannot be empty".to_string(),
            )
            .into());
        }

        if self.backend.request_timeout_seconds == 0 {
            return Err(StudyError::Config(
                "backend.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(StudyError::Config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
