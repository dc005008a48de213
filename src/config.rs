//! Runtime configuration.
//!
//! Read from `~/.orientamento/config.json` when it exists; every field has a
//! default so a missing file is not an error. `ORIENTAMENTO_DB` and
//! `ORIENTAMENTO_DATASET` override the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DB_ENV: &str = "ORIENTAMENTO_DB";
pub const DATASET_ENV: &str = "ORIENTAMENTO_DATASET";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Explicit database file. `None` means `~/.orientamento/orientamento.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// External dataset replacing the embedded one.
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,
    /// How long a second batch waits for the write lock before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            dataset_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Resolve the effective database path.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(state_dir()?.join("orientamento.db")),
        }
    }

    /// Apply environment overrides on top of the file values.
    fn apply_env(&mut self, db: Option<String>, dataset: Option<String>) {
        if let Some(db) = db.filter(|v| !v.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(dataset) = dataset.filter(|v| !v.trim().is_empty()) {
            self.dataset_path = Some(PathBuf::from(dataset));
        }
    }
}

/// Get the state directory (~/.orientamento)
fn state_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".orientamento"))
}

/// Get the canonical config file path (~/.orientamento/config.json)
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(state_dir()?.join("config.json"))
}

/// Load configuration from `~/.orientamento/config.json` plus env overrides.
pub fn load_config() -> Result<Config, ConfigError> {
    let mut config = load_config_from(&config_path()?)?;
    config.apply_env(std::env::var(DB_ENV).ok(), std::env::var(DATASET_ENV).ok());
    Ok(config)
}

/// Load a config file, falling back to defaults when it does not exist.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
