//! Application configuration management.
//!
//! Stored at `<config_dir>/favswap/config.json`. Every field is optional in
//! the file; missing ones take their defaults, so an old or hand-written
//! file keeps loading as fields are added.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;
use crate::sync::{SyncOptions, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_PAGE_SIZE};

/// Application name used for config/data directory paths
const APP_NAME: &str = "favswap";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment overrides for the login credentials
pub const USERNAME_ENV: &str = "FAVSWAP_USERNAME";
pub const PASSWORD_ENV: &str = "FAVSWAP_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub last_username: Option<String>,
    pub api_base_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub page_size: usize,
    pub max_concurrent_requests: usize,
    /// Seconds a validated token is trusted without re-checking. 0 checks
    /// before every call.
    pub validation_window_secs: u64,
    pub include_offline: bool,
    /// Keep the password in the OS keychain so expired sessions can renew
    /// across restarts.
    pub remember_password: bool,

    /// File this config was loaded from; `save` writes back there.
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_username: None,
            api_base_url: None,
            data_dir: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            validation_window_secs: 0,
            include_offline: true,
            remember_password: false,
            source: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = match self.source {
            Some(ref path) => path.clone(),
            None => Self::config_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where groups and the session token live.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            page_size: self.page_size.max(1),
            max_concurrent_requests: self.max_concurrent_requests.max(1),
            include_offline: self.include_offline,
        }
    }

    pub fn validity_window(&self) -> chrono::Duration {
        let secs = self.validation_window_secs.min(i64::MAX as u64 / 1000) as i64;
        chrono::Duration::seconds(secs)
    }

    /// Username and password from the environment, when both are set.
    pub fn env_credentials() -> Option<(String, String)> {
        let username = std::env::var(USERNAME_ENV).ok().filter(|u| !u.is_empty())?;
        let password = std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty())?;
        Some((username, password))
    }
}
