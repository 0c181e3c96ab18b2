//! src/config.rs
//! ============================================================================
//! # Config: Application Configuration Loader and Saver
//!
//! Loads and saves settings as TOML from the platform config directory using
//! the [`directories`](https://docs.rs/directories) crate. A default file is
//! written on first run.
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! config.save().await?;
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clipq::QueueConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::error::AppError;
use crate::logging::LoggerConfig;

/// Main configuration struct for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            logging: default_logging(),
        }
    }
}

/// Logs go under the platform data directory when one is known.
fn default_logging() -> LoggerConfig {
    let mut logging = LoggerConfig::default();
    if let Some(dirs) = project_dirs() {
        logging.log_dir = dirs.data_local_dir().join("logs");
    }
    logging
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "clipq", "clipq")
}

impl Config {
    /// Loads config from the platform config dir, creating a default file if missing.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            info!("Loading config from {}", path.display());
            Ok(Self::load_from(&path).await?)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save().await?;

            Ok(default_config)
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self, AppError> {
        let text = TokioFs::read_to_string(path)
            .await
            .map_err(|source| AppError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;

        let cfg: Self = toml::from_str(&text)?;
        cfg.queue.validate()?;
        Ok(cfg)
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;
        info!("Saving config to {}", path.display());
        self.save_to(&path).await
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(path, toml_str)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let dirs = project_dirs().context("Could not determine a config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}
