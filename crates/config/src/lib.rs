// Configuration Management
//
// This crate handles configuration loading for the database layer.
// It provides:
// - Configuration structs and deserialization
// - Environment and file loading logic
// - Default configuration values
//
// Values here are plain data; the database crate turns them into runtime policy.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found. Tried paths: {paths}")]
    FileNotFound { paths: String },

    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },
}

/// Locations tried by [`AppConfig::load`], in order
const CONFIG_PATHS: [&str; 3] = ["config/config.yaml", "config.yaml", "config/default.yaml"];

/// Main configuration loading interface
impl AppConfig {
    /// Load configuration from YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations relative to the working directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_dir(".")
    }

    /// Load the first config file found under `base`
    pub fn load_from_dir<P: AsRef<Path>>(base: P) -> Result<Self, ConfigError> {
        let base = base.as_ref();

        for path in CONFIG_PATHS {
            let candidate = base.join(path);
            if candidate.exists() {
                return Self::load_from_file(candidate);
            }
        }

        // If no config file found, fail with descriptive error
        Err(ConfigError::FileNotFound {
            paths: CONFIG_PATHS.join(", "),
        })
    }
}
