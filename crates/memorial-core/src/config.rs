//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, display locale, storage backend and
//! last used email.
//!
//! Configuration is stored at `~/.config/memorial/config.json`.
//! `MEMORIAL_API_URL` and `MEMORIAL_LOCALE` override the file at load time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{ClientConfig, DEFAULT_API_URL};
use crate::messages::Locale;
use crate::storage::{FileStorage, KeyringStorage, Storage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "memorial";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_URL_ENV: &str = "MEMORIAL_API_URL";
pub const LOCALE_ENV: &str = "MEMORIAL_LOCALE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file under the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub locale: Locale,
    pub clock_skew_secs: i64,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            locale: Locale::default(),
            clock_skew_secs: 0,
            storage: StorageBackend::default(),
            last_email: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
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

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Apply environment overrides. Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(LOCALE_ENV) {
            match Locale::parse(&raw) {
                Some(locale) => self.locale = locale,
                None => warn!(value = %raw, "Ignoring unknown {}", LOCALE_ENV),
            }
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(&self.api_url);
        client.timeout = Duration::from_secs(self.request_timeout_secs.max(1));
        client.locale = self.locale;
        client
    }

    pub fn open_storage(&self) -> Result<Arc<dyn Storage>> {
        match self.storage {
            StorageBackend::File => {
                let dir = self.data_dir()?;
                let storage = FileStorage::open(&dir)
                    .with_context(|| format!("Failed to open storage in {}", dir.display()))?;
                Ok(Arc::new(storage))
            }
            StorageBackend::Keyring => Ok(Arc::new(KeyringStorage::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8002/api");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.locale, Locale::Vi);
        assert_eq!(config.storage, StorageBackend::File);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"locale":"en"}"#).unwrap();
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = Config {
            api_url: "https://memorial.example/api".to_string(),
            storage: StorageBackend::Keyring,
            last_email: Some("lan@example.com".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (API_URL_ENV, "https://api.example.org/api"),
            (LOCALE_ENV, "English"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_url, "https://api.example.org/api");
        assert_eq!(config.locale, Locale::En);
    }

    #[test]
    fn test_bad_locale_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|key| (key == LOCALE_ENV).then(|| "klingon".to_string()));
        assert_eq!(config.locale, Locale::Vi);
    }

    #[test]
    fn test_client_config() {
        let config = Config {
            api_url: "http://localhost:9000/api/".to_string(),
            request_timeout_secs: 5,
            locale: Locale::En,
            ..Config::default()
        };
        let client = config.client_config();
        assert_eq!(client.base_url, "http://localhost:9000/api");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(client.locale, Locale::En);
    }
}
