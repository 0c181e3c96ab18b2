use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EffectorError {
    #[error("Foreground application rejected the keystroke: {0}")]
    Rejected(String),

    #[error("Effector unavailable: {0}")]
    Unavailable(String),
}

/// Drives copy and paste in the foreground application.
///
/// Completion means the action was issued, not that the target application
/// has finished handling it.
#[async_trait]
pub trait ClipboardEffector: Send + Sync {
    async fn invoke_copy(&self) -> Result<(), EffectorError>;

    async fn invoke_paste(&self) -> Result<(), EffectorError>;
}
