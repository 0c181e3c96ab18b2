//! Tracing setup: JSON lines to a rolling file, optional human-readable stderr.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub max_log_files: usize,
    pub rotation: LogRotation,
    /// Mirror log lines to stderr in the compact text format
    pub stderr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("clipq"),
            log_level: CompactString::const_new("info"),
            max_log_files: 10,
            rotation: LogRotation::Daily,
            stderr: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub struct Logger;

impl Logger {
    /// Install the global subscriber. Keep the guard alive for the whole run,
    /// dropping it flushes and stops the background writer.
    pub fn init(config: &LoggerConfig) -> Result<WorkerGuard, LoggingError> {
        validate_config(config)?;
        std::fs::create_dir_all(&config.log_dir)?;

        let rotation = match config.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
        };

        let file_appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(config.log_file_prefix.as_str())
            .filename_suffix("jsonl")
            .max_log_files(config.max_log_files)
            .build(&config.log_dir)
            .map_err(|e| LoggingError::ConfigError(e.to_string()))?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let level = config.log_level.clone();
        let make_filter = move || {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
        };

        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(non_blocking)
            .with_filter(make_filter());

        let stderr_layer = config.stderr.then(|| {
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(make_filter())
        });

        tracing_subscriber::registry()
            .with(json_layer)
            .with(stderr_layer)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }
}

fn validate_config(config: &LoggerConfig) -> Result<(), LoggingError> {
    if config.log_dir.as_os_str().is_empty() {
        return Err(LoggingError::InvalidLogDirectory(
            "log directory path is empty".to_string(),
        ));
    }

    if is_existing_file(&config.log_dir) {
        return Err(LoggingError::InvalidLogDirectory(format!(
            "{} is a file",
            config.log_dir.display()
        )));
    }

    if config.log_file_prefix.is_empty() {
        return Err(LoggingError::ConfigError(
            "log file prefix must not be empty".to_string(),
        ));
    }

    if config.max_log_files == 0 {
        return Err(LoggingError::ConfigError(
            "max_log_files must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn is_existing_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
