//! Configuration management for filemcp
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.filemcp/config.toml

use crate::cli::args::Args;
use crate::errors::{Result, ServerError};
use crate::tools::security::ConfinementStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration for filemcp
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub confinement: ConfinementConfig,
    pub logging: LoggingConfig,
}

/// Identity advertised during protocol initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

/// Path confinement configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfinementConfig {
    pub strategy: ConfinementStrategy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Log file; empty logs to stderr
    pub file: String,
    pub level: String,
    /// Raw protocol traffic log; empty disables it
    pub protocol_log: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "filemcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: String::new(),
            level: "info".to_string(),
            protocol_log: String::new(),
        }
    }
}

impl LoggingConfig {
    pub fn log_file(&self) -> Option<PathBuf> {
        non_empty_path(&self.file)
    }

    pub fn protocol_log_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.protocol_log)
    }
}

fn non_empty_path(path: &str) -> Option<PathBuf> {
    if path.is_empty() {
        None
    } else {
        Some(Config::expand_path(path))
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServerError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ServerError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".filemcp").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Command-line flags take precedence over file values
    pub fn apply_args(&mut self, args: &Args) {
        if args.log {
            self.logging.enabled = true;
        }
        // Only takes effect together with --log or `enabled = true`
        if let Some(logfile) = &args.logfile {
            self.logging.file = logfile.display().to_string();
        }
        if let Some(logproto) = &args.logproto {
            self.logging.protocol_log = logproto.display().to_string();
        }
        if let Some(strategy) = args.strategy {
            self.confinement.strategy = strategy;
        }
        match args.verbose {
            0 => {}
            1 => self.logging.level = "debug".to_string(),
            _ => self.logging.level = "trace".to_string(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.name.trim().is_empty() {
            return Err(ServerError::ConfigError(
                "server name must not be empty".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ServerError::ConfigError(format!(
                    "Invalid log level: {}",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}
