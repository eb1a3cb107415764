//! Configuration management for Pixelpipe.
//!
//! Configuration is loaded from the platform config directory
//! (`~/.pixelpipe/config.toml` as a fallback) with sensible defaults.
//! Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Pixelpipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pixel processing settings
    pub processing: ProcessingConfig,

    /// Script admission control
    pub admission: AdmissionConfig,

    /// Decode cache settings
    pub cache: CacheConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Snapshot server settings
    pub server: ServerConfig,

    /// Configured streams
    pub streams: Vec<StreamEntry>,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.pixelpipe.pixelpipe/config.toml
    /// - Linux: ~/.config/pixelpipe/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\pixelpipe\config\config.toml
    ///
    /// Falls back to ~/.pixelpipe/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pixelpipe", "pixelpipe")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".pixelpipe").join("config.toml")
            })
    }

    /// Get the resolved artifact root for streams (with ~ expansion).
    ///
    /// An empty setting means `<os temp dir>/pixelpipe`.
    pub fn artifact_dir(&self) -> PathBuf {
        if self.server.artifact_dir.trim().is_empty() {
            return std::env::temp_dir().join("pixelpipe");
        }
        let expanded = shellexpand::tilde(&self.server.artifact_dir);
        PathBuf::from(expanded.into_owned())
    }

    /// Resolve a stream's script path (with ~ expansion).
    pub fn script_path(entry: &StreamEntry) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&entry.script).into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
