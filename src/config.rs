use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the database location
pub const DATABASE_ENV: &str = "PHRASEBOARD_DB";

/// Runtime settings, read from an optional JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding categories, phrases and favorites
    pub database_path: PathBuf,
    /// Load the hierarchy as soon as the cache is created
    pub refresh_on_start: bool,
    /// Keep reconciling in the background
    pub auto_refresh: bool,
    /// Seconds between background reconciliations
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/phraseboard.db"),
            refresh_on_start: true,
            auto_refresh: false,
            refresh_interval_secs: 300,
        }
    }
}

impl Config {
    /// Loads settings from `path` when given and present, then applies
    /// environment overrides. Missing fields keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            Some(path) => {
                debug!("Config file {} not found, using defaults", path.display());
                Config::default()
            }
            None => Config::default(),
        };

        if let Ok(database_path) = env::var(DATABASE_ENV) {
            if !database_path.is_empty() {
                config.database_path = PathBuf::from(database_path);
            }
        }

        Ok(config)
    }
}
