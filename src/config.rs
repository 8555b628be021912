//! Configuration system for the Tork worker
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (TORK_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::broker::MAX_MAILBOX_CAPACITY;
use crate::error::{Error, Result};

/// Main worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TorkConfig {
    /// Worker identity
    pub worker: WorkerSettings,

    /// Message broker settings
    pub broker: BrokerSettings,

    /// Runtime backend settings
    pub runtime: RuntimeSettings,

    /// Host stats sampling
    pub stats: StatsSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Worker identity settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Fixed mailbox name (a fresh `worker-<uuid>` is generated if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form tags, logged at startup
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Undelivered messages a mailbox holds before `send` is rejected
    pub mailbox_capacity: usize,
}

/// Runtime backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Containers through the docker CLI
    #[default]
    Docker,
    /// Records calls without running anything
    Mock,
}

impl FromStr for RuntimeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(RuntimeKind::Docker),
            "mock" => Ok(RuntimeKind::Mock),
            other => Err(Error::config_field_invalid(
                "runtime.kind",
                format!("Unknown runtime '{}'. Must be one of: docker, mock", other),
            )),
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Docker => write!(f, "docker"),
            RuntimeKind::Mock => write!(f, "mock"),
        }
    }
}

/// Runtime backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Which backend runs tasks
    pub kind: RuntimeKind,

    /// Docker client binary
    pub docker_binary: String,

    /// Upper bound on a container removal, in seconds
    pub stop_timeout_secs: u64,
}

/// Stats sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    /// Seconds between host stats samples
    pub interval_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            kind: RuntimeKind::Docker,
            docker_binary: "docker".to_string(),
            stop_timeout_secs: 10,
        }
    }
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl TorkConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");

            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = Self::from_toml_str(&content)?;

            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("tork.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("tork").join("worker.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".tork").join("worker.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/tork/worker.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Worker settings
        if let Ok(val) = std::env::var("TORK_WORKER_NAME") {
            self.worker.name = Some(val);
        }
        if let Ok(val) = std::env::var("TORK_WORKER_TAGS") {
            self.worker.tags = val
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }

        // Broker settings
        if let Ok(val) = std::env::var("TORK_MAILBOX_CAPACITY") {
            if let Ok(n) = val.parse() {
                self.broker.mailbox_capacity = n;
            }
        }

        // Runtime settings
        if let Ok(val) = std::env::var("TORK_RUNTIME") {
            match val.parse() {
                Ok(kind) => self.runtime.kind = kind,
                Err(e) => warn!(value = %val, error = %e, "Ignoring TORK_RUNTIME"),
            }
        }
        if let Ok(val) = std::env::var("TORK_DOCKER_BINARY") {
            self.runtime.docker_binary = val;
        }
        if let Ok(val) = std::env::var("TORK_STOP_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.runtime.stop_timeout_secs = n;
            }
        }

        // Stats settings
        if let Ok(val) = std::env::var("TORK_STATS_INTERVAL_SECS") {
            if let Ok(n) = val.parse() {
                self.stats.interval_secs = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("TORK_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TORK_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("TORK_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
        self.runtime.docker_binary = expand_path(&self.runtime.docker_binary);
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.worker.name {
            if name.trim().is_empty() {
                return Err(Error::config_field_invalid(
                    "worker.name",
                    "Worker name cannot be empty",
                ));
            }
        }

        if self.broker.mailbox_capacity == 0 {
            return Err(Error::config_field_invalid(
                "broker.mailbox_capacity",
                "mailbox_capacity must be greater than 0",
            ));
        }

        if self.broker.mailbox_capacity > MAX_MAILBOX_CAPACITY {
            return Err(Error::config_field_invalid(
                "broker.mailbox_capacity",
                format!("mailbox_capacity must be at most {}", MAX_MAILBOX_CAPACITY),
            ));
        }

        if self.runtime.docker_binary.is_empty() {
            return Err(Error::config_field_invalid(
                "runtime.docker_binary",
                "docker_binary cannot be empty",
            ));
        }

        if self.stats.interval_secs == 0 {
            return Err(Error::config_field_invalid(
                "stats.interval_secs",
                "interval_secs must be greater than 0",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location written by `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tork")
        .join("worker.toml")
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# Tork Worker Configuration

[worker]
# Fixed mailbox name (a fresh "worker-<uuid>" is generated if not set)
# name = "worker-1"

# Free-form tags, logged at startup
tags = []

[broker]
# Undelivered messages a mailbox holds before sends are rejected
mailbox_capacity = 1024

[runtime]
# Backend that runs tasks: docker, mock
kind = "docker"

# Docker client binary
docker_binary = "docker"

# Upper bound on a container removal, in seconds
stop_timeout_secs = 10

[stats]
# Seconds between host stats samples
interval_secs = 5

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.tork/logs/worker.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
