//! Logging configuration (`njconsole/log.toml`)
//!
//! Settings are stored in TOML format in the platform-specific config
//! directory. Missing keys fall back to their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LogError;
use crate::history::{DEFAULT_BACKLOG_SHRINK_THRESHOLD, DEFAULT_HISTORY_CAPACITY};
use crate::level::LogLevel;

/// Largest history capacity accepted from configuration
pub const MAX_HISTORY_CAPACITY: usize = 65536;

const CONFIG_FILE_NAME: &str = "log.toml";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Ring slots kept in memory (default: 1024, range: 1-65536)
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Minimum level that captures a stack trace (default: Error)
    #[serde(default = "default_stack_trace_level")]
    pub stack_trace_level: LogLevel,
    /// Backlog capacity above which it is shrunk when released (default: 4096)
    #[serde(default = "default_backlog_shrink_threshold")]
    pub backlog_shrink_threshold: usize,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_stack_trace_level() -> LogLevel {
    LogLevel::Error
}
fn default_backlog_shrink_threshold() -> usize {
    DEFAULT_BACKLOG_SHRINK_THRESHOLD
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            stack_trace_level: default_stack_trace_level(),
            backlog_shrink_threshold: default_backlog_shrink_threshold(),
        }
    }
}

impl LogConfig {
    /// History capacity clamped to `1..=MAX_HISTORY_CAPACITY`
    pub fn clamped_history_capacity(&self) -> usize {
        self.history_capacity.clamp(1, MAX_HISTORY_CAPACITY)
    }

    /// Check the values a caller may have set by hand.
    pub fn validate(&self) -> Result<(), LogError> {
        if self.history_capacity == 0 {
            return Err(LogError::InvalidConfig(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(LogError::InvalidConfig(format!(
                "history_capacity {} exceeds the maximum of {MAX_HISTORY_CAPACITY}",
                self.history_capacity
            )));
        }
        Ok(())
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\njconsole\config`
/// On macOS: `~/Library/Application Support/io.njconsole.njconsole`
/// On Linux: `~/.config/njconsole`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.njconsole", "", "njconsole")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Path of the config file inside [`config_dir`]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from disk.
///
/// Returns default values if the file doesn't exist. A file that exists
/// but cannot be read or parsed is reported and replaced by defaults.
pub fn load() -> LogConfig {
    let Some(path) = config_path() else {
        return LogConfig::default();
    };
    if !path.exists() {
        return LogConfig::default();
    }
    match load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default log config: {e}");
            LogConfig::default()
        }
    }
}

/// Loads the configuration from an explicit path.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or holds
/// out-of-range values.
pub fn load_from(path: &Path) -> Result<LogConfig, LogError> {
    let content = std::fs::read_to_string(path).map_err(|source| LogError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config: LogConfig = toml::from_str(&content).map_err(|source| LogError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Saves the configuration to an explicit path.
///
/// Creates the parent directory if it doesn't exist.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file
/// cannot be written.
pub fn save_to(config: &LogConfig, path: &Path) -> Result<(), LogError> {
    let write_error = |source| LogError::ConfigWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(write_error)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(write_error)
}
