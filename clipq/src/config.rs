use crate::cursor::PinMode;
use crate::error::{ClipError, ClipResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Which history item the clipboard mirrors while queueing
    pub pin_mode: PinMode,

    /// Pause between two synthetic pastes of a bulk paste
    #[serde(with = "humantime_serde")]
    pub bulk_paste_delay: Duration,

    /// Upper bound on a single copy/paste round trip through the effector
    #[serde(with = "humantime_serde")]
    pub effector_timeout: Duration,

    /// How long a queued copy waits for its capture before it stops
    /// claiming the next clipboard change
    #[serde(with = "humantime_serde")]
    pub capture_window: Duration,

    /// Maximum number of history entries kept (queued entries are never evicted)
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pin_mode: PinMode::Latest,
            bulk_paste_delay: Duration::from_millis(333),
            effector_timeout: Duration::from_secs(5),
            capture_window: Duration::from_millis(500),
            history_limit: 200,
        }
    }
}

impl QueueConfig {
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> ClipResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> ClipResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn validate(&self) -> ClipResult<()> {
        if self.history_limit == 0 {
            return Err(ClipError::config_error("history_limit must be at least 1"));
        }

        if self.effector_timeout.is_zero() {
            return Err(ClipError::config_error("effector_timeout must be non-zero"));
        }

        if self.capture_window.is_zero() {
            return Err(ClipError::config_error("capture_window must be non-zero"));
        }

        Ok(())
    }
}
