//! Application configuration management.
//!
//! Holds the API base URL, push platform, last used email and session
//! options. Stored at `~/.config/staffdesk/config.json`; the base URL can be
//! overridden per environment with `STAFFDESK_API_BASE`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::REQUEST_TIMEOUT_SECS;
use crate::auth::SessionOptions;
use crate::models::Platform;

/// Application name used for config directory paths
const APP_NAME: &str = "staffdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "STAFFDESK_API_BASE";

pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";

/// Endpoint used to confirm a restored session.
pub const DEFAULT_PROFILE_PATH: &str = "/hotel/profile";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: Option<String>,
    pub platform: Platform,
    pub last_email: Option<String>,
    pub request_timeout_secs: u64,
    pub profile_path: String,
    pub validate_restored_session: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: None,
            platform: Platform::default(),
            last_email: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            profile_path: DEFAULT_PROFILE_PATH.to_string(),
            validate_restored_session: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// API base URL: environment, then config file, then the default.
    pub fn resolve_api_base(&self) -> String {
        self.api_base_with(std::env::var(API_BASE_ENV).ok())
    }

    fn api_base_with(&self, env_value: Option<String>) -> String {
        env_value
            .into_iter()
            .chain(self.api_base.clone())
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .find(|base| !base.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            profile_path: self
                .validate_restored_session
                .then(|| self.profile_path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_resolution_order() {
        let mut config = Config::default();
        assert_eq!(config.api_base_with(None), DEFAULT_API_BASE);

        config.api_base = Some("http://10.0.0.5:3000/api/".into());
        assert_eq!(config.api_base_with(None), "http://10.0.0.5:3000/api");
        assert_eq!(
            config.api_base_with(Some("https://staff.example.com/api/".into())),
            "https://staff.example.com/api"
        );
        assert_eq!(config.api_base_with(Some("  ".into())), "http://10.0.0.5:3000/api");
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"platform":"ios"}"#).unwrap();
        assert_eq!(config.platform, Platform::Ios);
        assert_eq!(config.request_timeout(), Duration::from_secs(REQUEST_TIMEOUT_SECS));
        assert_eq!(
            config.session_options().profile_path.as_deref(),
            Some(DEFAULT_PROFILE_PATH)
        );
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let config = Config {
            validate_restored_session: false,
            ..Config::default()
        };
        assert_eq!(config.session_options().profile_path, None);
    }

    #[test]
    fn test_save_and_load_roundtrip_through_file() {
        let path = std::env::temp_dir()
            .join(format!("staffdesk-config-test-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config {
            last_email: Some("frontdesk@hotel.test".into()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.last_email.as_deref(), Some("frontdesk@hotel.test"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
