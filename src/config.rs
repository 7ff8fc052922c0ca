// Configuration loaded from goldtasks.yml

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::models::{Category, Task, User};
use crate::record::Record;
use crate::storage::storage_key;
use crate::store::Store;

const APP_DIR: &str = "goldtasks";
const CONFIG_FILE: &str = "goldtasks.yml";
const SESSION_NAME: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the SQLite database
    pub data_dir: PathBuf,
    /// Prefix for storage keys, e.g. goldtasks_todos
    pub key_prefix: String,
    /// Where exported calendar files are written
    pub export_dir: PathBuf,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".goldtasks")),
            key_prefix: APP_DIR.to_string(),
            export_dir: PathBuf::from("."),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// ~/.config/goldtasks/goldtasks.yml (platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, which must exist, or from the default
    /// location, falling back to defaults when that file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(eyre!("key_prefix cannot be empty"));
        }
        for name in [
            Task::collection_name(),
            Category::collection_name(),
            User::collection_name(),
            SESSION_NAME,
        ] {
            Store::validate_key(&self.key(name))
                .with_context(|| format!("Invalid key_prefix: {}", self.key_prefix))?;
        }
        self.level()?;
        Ok(())
    }

    /// Storage key for a collection name under this config's prefix
    pub fn key(&self, name: &str) -> String {
        storage_key(&self.key_prefix, name)
    }

    /// Storage key holding the logged-in user
    pub fn session_key(&self) -> String {
        self.key(SESSION_NAME)
    }

    pub fn level(&self) -> Result<Level> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| eyre!("Invalid log_level: {}", self.log_level))
    }
}
