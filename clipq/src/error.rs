//! Error types for the history log and the paste-queue cursor

use compact_str::CompactString;
use std::io::ErrorKind;
use thiserror::Error;

pub type ClipResult<T> = Result<T, ClipError>;

pub type QueueResult<T> = Result<T, QueueError>;

/// Failures raised by [`QueueCursor`](crate::cursor::QueueCursor) transitions.
///
/// Given correct call ordering these are unreachable; they are still typed so
/// callers can tell a refused precondition from a desynchronised cursor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue invariant violated: {0}")]
    LogicError(&'static str),

    #[error("No such item in the paste queue")]
    NoSuchItem,

    #[error("Queue position {index} is outside the history log ({len} items)")]
    SizeExceedsHistory { index: usize, len: usize },
}

impl QueueError {
    /// True when the error means the cursor and the log disagree,
    /// as opposed to a caller asking for an item that is not queued.
    #[inline(always)]
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            QueueError::LogicError(_) | QueueError::SizeExceedsHistory { .. }
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum ClipError {
    #[error("Queue configuration error: {0}")]
    ConfigError(CompactString),

    #[error("File system error: {kind:?}")]
    FileSystemError { kind: ErrorKind },

    #[error("Serialization error: {0}")]
    SerializationError(CompactString),
}

impl ClipError {
    #[inline]
    pub fn config_error(message: impl Into<CompactString>) -> Self {
        Self::ConfigError(message.into())
    }
}

impl From<std::io::Error> for ClipError {
    fn from(err: std::io::Error) -> Self {
        ClipError::FileSystemError { kind: err.kind() }
    }
}

impl From<toml::de::Error> for ClipError {
    fn from(err: toml::de::Error) -> Self {
        ClipError::SerializationError(CompactString::from(err.to_string()))
    }
}

impl From<toml::ser::Error> for ClipError {
    fn from(err: toml::ser::Error) -> Self {
        ClipError::SerializationError(CompactString::from(err.to_string()))
    }
}
