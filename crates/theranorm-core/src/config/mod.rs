//! Configuration management for TheraNorm.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `theranorm.toml` file
//! 3. User config `~/.config/theranorm/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store configuration.
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./theranorm.toml` (project local)
    /// 2. `~/.config/theranorm/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("theranorm.toml").exists() {
            return Self::from_file("theranorm.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("theranorm").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("THERANORM_DATA_DIR") {
            self.store.data_dir = dir;
        }
        if let Ok(url) = std::env::var("THERANORM_DB_URL") {
            self.store.db_url = Some(url);
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for theranorm data (default: ".theranorm").
    pub data_dir: String,

    /// Remote store endpoint. When unset, an embedded store under
    /// `data_dir` is used.
    pub db_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            db_url: None,
        }
    }
}

impl StoreConfig {
    /// Get the full path to the embedded store directory.
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DEFAULT_STORE_DIR)
    }
}
