use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs::{create_dir_all, read_to_string, write};

use crate::{
    constants::{
        DEFAULT_REQUEST_TIMEOUT, DEFAULT_START_REPOLL_DELAY, DEFAULT_STATUS_POLL_INTERVAL,
        DEFAULT_STOP_REPOLL_DELAY, DEFAULT_TERMINAL_POLL_INTERVAL, DEFAULT_VIEWER_PATH,
    },
    session::VmSessionConfig,
};

/// Process-level settings of the client, kept in `config.toml`.
///
/// The endpoint and user preferences are not here: they live in the store
/// at `store-path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing, skip_deserializing)]
    pub config_path: PathBuf,

    #[serde(rename = "store-path")]
    pub store_path: PathBuf,

    #[serde(rename = "status-poll-interval", with = "humantime_serde")]
    pub status_poll_interval: Duration,

    #[serde(rename = "terminal-poll-interval", with = "humantime_serde")]
    pub terminal_poll_interval: Duration,

    #[serde(rename = "start-repoll-delay", with = "humantime_serde")]
    pub start_repoll_delay: Duration,

    #[serde(rename = "stop-repoll-delay", with = "humantime_serde")]
    pub stop_repoll_delay: Duration,

    #[serde(rename = "request-timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(rename = "viewer-path")]
    pub viewer_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            store_path: PathBuf::from("store"),
            status_poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
            terminal_poll_interval: DEFAULT_TERMINAL_POLL_INTERVAL,
            start_repoll_delay: DEFAULT_START_REPOLL_DELAY,
            stop_repoll_delay: DEFAULT_STOP_REPOLL_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            viewer_path: DEFAULT_VIEWER_PATH.to_string(),
        }
    }
}

impl Config {
    /// Loads the file named by `PHOENIX_CONFIG`, or the platform default,
    /// writing a default one first if it does not exist yet.
    pub async fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("PHOENIX_CONFIG") {
            let path = PathBuf::from(path);
            let store_path = path
                .parent()
                .map(|dir| dir.join("store"))
                .unwrap_or_else(|| PathBuf::from("store"));
            return Self::load_from(&path, store_path).await;
        }

        let Some(project_dirs) = ProjectDirs::from("dev", "phoenix", "phoenix") else {
            bail!("Failed to get config dir");
        };

        let config_dir = project_dirs.config_dir();
        if !config_dir.exists() {
            create_dir_all(config_dir).await?;
        }

        Self::load_from(
            &config_dir.join("config.toml"),
            project_dirs.data_dir().join("store"),
        )
        .await
    }

    /// Reads `path`, or creates it with defaults pointing the store at `default_store_path`.
    pub async fn load_from(path: &Path, default_store_path: PathBuf) -> Result<Self> {
        if !path.exists() {
            let config = Self {
                config_path: path.to_path_buf(),
                store_path: default_store_path,
                ..Self::default()
            };

            config.save().await?;

            return Ok(config);
        }

        let config_str = read_to_string(path).await?;
        let mut config: Self = toml::from_str(&config_str)?;
        config.config_path = path.to_path_buf();
        if config.store_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.store_path = dir.join(&config.store_path);
            }
        }
        config.validate()?;

        Ok(config)
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(dir) = self.config_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                create_dir_all(dir).await?;
            }
        }

        let config_str = toml::to_string_pretty(&self)?;
        write(&self.config_path, config_str).await?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.status_poll_interval.is_zero() {
            bail!("status-poll-interval must be greater than zero");
        }
        if self.terminal_poll_interval.is_zero() {
            bail!("terminal-poll-interval must be greater than zero");
        }
        if self.request_timeout.is_zero() {
            bail!("request-timeout must be greater than zero");
        }
        Ok(())
    }

    pub fn session(&self) -> VmSessionConfig {
        VmSessionConfig {
            status_poll_interval: self.status_poll_interval,
            start_repoll_delay: self.start_repoll_delay,
            stop_repoll_delay: self.stop_repoll_delay,
        }
    }
}
