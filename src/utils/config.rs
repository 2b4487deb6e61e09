//! Crate-level configuration (C11, ambient): a `toml`-backed settings file
//! loaded once via `OnceLock`, mirroring the reference's own
//! `utils/config.rs` shape and error handling.

use serde::Deserialize;
use std::sync::OnceLock;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigLoadingError {
    #[error("failed to read the config (./config.toml): {0}")]
    FailedToReadConfig(String),

    #[error("failed to parse the config: {0}")]
    FailedToParseConfig(String),
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub database: DatabaseConfig,
    pub detection: DetectionConfig,
}

#[derive(Debug, Deserialize)]
pub struct LibraryConfig {
    /// Root folder scanned by `index`.
    pub root_path: PathBuf,
    /// Where `plan execute` copies files before deleting them.
    pub backup_root: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_true")]
    pub use_fuzzy: bool,
    #[serde(default = "default_true")]
    pub use_content_hash: bool,
}

fn default_fuzzy_threshold() -> f64 {
    crate::vetter::DEFAULT_THRESHOLD
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self, ConfigLoadingError> {
        let config_str = fs::read_to_string("config.toml").map_err(|err| ConfigLoadingError::FailedToReadConfig(err.to_string()))?;
        let config: Config = toml::from_str(&config_str).map_err(|err| ConfigLoadingError::FailedToParseConfig(err.to_string()))?;

        Ok(config)
    }
}

pub fn get_config() -> Result<&'static Config, ConfigLoadingError> {
    static CONFIG: OnceLock<Result<Config, ConfigLoadingError>> = OnceLock::new();

    let result = CONFIG.get_or_init(Config::load);

    match result {
        Ok(config) => Ok(config),
        Err(err) => Err(err.clone()),
    }
}
