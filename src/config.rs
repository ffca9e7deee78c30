use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::models::Priority;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding saved tasks. Empty means the profile default.
    #[serde(default)]
    pub storage_path: String,
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default)]
    pub default_priority: Priority,
    /// Alarm time (HH:MM) for tasks without a due time
    #[serde(default = "default_due_time")]
    pub default_due_time: String,
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    /// How often `watch` re-reads saved tasks
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: String::new(),
            default_category: default_category(),
            default_priority: Priority::default(),
            default_due_time: default_due_time(),
            toast_duration_ms: default_toast_duration_ms(),
            notifications_enabled: default_notifications_enabled(),
            reload_interval_secs: default_reload_interval_secs(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_category() -> String {
    "Work".to_string()
}

fn default_due_time() -> String {
    "09:00".to_string()
}

fn default_toast_duration_ms() -> u64 {
    3000
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_reload_interval_secs() -> u64 {
    5
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine the config location
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from an explicit file, writing defaults there if
    /// it does not exist yet
    pub fn load_from_path(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            Ok(toml::from_str(&contents)?)
        } else {
            let mut config = Config::default();
            if let Err(e) = config.save_to_path(config_path) {
                warn!("Failed to save config file {:?}: {}", config_path, e);
                return Err(e);
            }
            Ok(config)
        }
    }

    pub fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get the expanded storage path, falling back to the profile's data dir
    pub fn get_storage_path(&self, profile: utils::Profile) -> PathBuf {
        if !self.storage_path.trim().is_empty() {
            return utils::expand_path(self.storage_path.trim());
        }
        match utils::get_data_dir(profile) {
            Some(data_dir) => data_dir.join("tasks.db"),
            None => match profile {
                utils::Profile::Dev => utils::expand_path("~/.local/share/taskdeck-dev/tasks.db"),
                utils::Profile::Prod => utils::expand_path("~/.local/share/taskdeck/tasks.db"),
            },
        }
    }

    /// Alarm time for tasks without their own; 09:00 if the setting is malformed
    pub fn default_due_time(&self) -> NaiveTime {
        utils::parse_time(&self.default_due_time).unwrap_or_else(|_| {
            warn!("Invalid default_due_time '{}', using 09:00", self.default_due_time);
            NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
        })
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    /// Never zero, `tokio::time::interval` rejects that
    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str("default_category = \"Home\"\ndefault_priority = \"High\"\n").unwrap();
        assert_eq!(config.default_category, "Home");
        assert_eq!(config.default_priority, Priority::High);
        assert_eq!(config.toast_duration(), Duration::from_millis(3000));
        assert_eq!(config.default_due_time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert!(config.notifications_enabled);
    }

    #[test]
    fn malformed_due_time_falls_back() {
        let config = Config { default_due_time: "noon".to_string(), ..Config::default() };
        assert_eq!(config.default_due_time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_from_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, Config::default());

        let reread = Config::load_from_path(&path).unwrap();
        assert_eq!(reread, created);
    }

    #[test]
    fn explicit_storage_path_wins() {
        let config = Config { storage_path: "/var/tmp/tasks.db".to_string(), ..Config::default() };
        assert_eq!(config.get_storage_path(utils::Profile::Dev), PathBuf::from("/var/tmp/tasks.db"));
        assert_eq!(Config::default().reload_interval(), Duration::from_secs(5));
    }
}
