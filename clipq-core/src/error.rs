//! src/error.rs
//! ============================================================================
//! # AppError: Unified Error Type for the Queue Application
//!
//! Every controller entry point returns `Result<T, AppError>`. Cursor failures
//! arrive wrapped from [`QueueError`]; effector failures and timeouts are
//! produced by the effector operator.

use clipq::{ClipError, QueueError};
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Paste-queue cursor refused or detected a desynchronised transition.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Engine-level configuration failure.
    #[error("Queue configuration error: {0}")]
    Clip(#[from] ClipError),

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Config file I/O error with path.
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The foreground application could not be driven.
    #[error("Effector {operation} failed: {reason}")]
    Effector {
        operation: &'static str, // "copy" or "paste"
        reason: String,
    },

    #[error("Task {task_type} timed out after {timeout_ms}ms")]
    TaskTimeout { task_type: String, timeout_ms: u64 },

    /// Another copy or paste is still in flight.
    #[error("Busy: {activity} in progress")]
    Busy { activity: &'static str },

    #[error("Accessibility permission not granted")]
    PermissionDenied,

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl AppError {
    pub fn invalid_input<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn effector<S: Into<String>>(operation: &'static str, reason: S) -> Self {
        Self::Effector {
            operation,
            reason: reason.into(),
        }
    }

    /// Cursor and log disagree; this is a bug, not a user mistake.
    pub fn is_desync(&self) -> bool {
        matches!(self, Self::Queue(err) if err.is_desync())
    }

    /// A request refused because its precondition did not hold.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::Queue(QueueError::NoSuchItem)
                | Self::Busy { .. }
                | Self::PermissionDenied
                | Self::InvalidInput { .. }
        )
    }
}
