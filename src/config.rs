//! Configuration management for adb-pty.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::pty::{BridgeCommand, DEFAULT_BRIDGE};
use crate::session::{
    SessionConfig, DEFAULT_ESCALATION_COMMAND, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bridge configuration.
    pub bridge: BridgeSection,
    /// Session protocol configuration.
    pub session: SessionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Bridge configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Bridge executable.
    pub program: String,
    /// Target device serial.
    pub serial: Option<String>,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            program: DEFAULT_BRIDGE.to_string(),
            serial: None,
        }
    }
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Deadline for each protocol step, in seconds.
    pub timeout_secs: u64,
    /// Interval between termination polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Command used to become root.
    pub escalation_command: String,
    /// Check `id -u` after escalating.
    pub verify_escalation: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            escalation_command: DEFAULT_ESCALATION_COMMAND.to_string(),
            verify_escalation: true,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = var("ADB_PTY_BRIDGE").filter(|p| !p.is_empty()) {
            self.bridge.program = program;
        }

        if let Some(serial) = var("ADB_PTY_SERIAL").filter(|s| !s.is_empty()) {
            self.bridge.serial = Some(serial);
        }

        if let Some(secs) = var("ADB_PTY_TIMEOUT").and_then(|t| t.parse().ok()) {
            self.session.timeout_secs = secs;
        }

        if let Some(level) = var("ADB_PTY_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref program) = args.bridge {
            self.bridge.program = program.clone();
        }

        if let Some(ref serial) = args.serial {
            self.bridge.serial = Some(serial.clone());
        }

        if let Some(secs) = args.timeout_secs {
            self.session.timeout_secs = secs;
        }

        if args.no_verify {
            self.session.verify_escalation = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject values the session cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.program.trim().is_empty() {
            return Err(ConfigError::Invalid("bridge.program is empty"));
        }
        if self.session.timeout_secs == 0 {
            return Err(ConfigError::Invalid("session.timeout_secs must be positive"));
        }
        if self.session.escalation_command.contains(['\r', '\n']) {
            return Err(ConfigError::Invalid(
                "session.escalation_command must be a single line",
            ));
        }
        Ok(())
    }

    /// Convert to the session engine's configuration.
    pub fn to_session_config(&self) -> SessionConfig {
        let bridge = BridgeCommand::for_device(&self.bridge.program, self.bridge.serial.as_deref());

        SessionConfig::new(bridge)
            .timeout(Duration::from_secs(self.session.timeout_secs))
            .poll_interval(Duration::from_millis(self.session.poll_interval_ms))
            .escalation_command(self.session.escalation_command.clone())
            .verify_escalation(self.session.verify_escalation)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A value is out of range.
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::Invalid(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}
