use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::SqliteStore;
use crate::rest::RestStore;
use crate::schema::ValidationMessages;
use crate::store::RecordStore;

const FILE_NAME: &str = "seekr.toml";
const DB_FILE_NAME: &str = "seekr.db";

pub const STORE_URL_ENV: &str = "SEEKR_STORE_URL";
pub const STORE_KEY_ENV: &str = "SEEKR_STORE_ANON_KEY";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "seekr")
}

// Platform directories, falling back to the working directory.

pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_path() -> PathBuf {
    config_dir().join(FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Local SQLite file; defaults to `seekr.db` in the data directory.
    Sqlite {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// PostgREST/Supabase-style data API.
    Rest { url: String, anon_key: String },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite { path: None }
    }
}

/// Settings read from `seekr.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub messages: ValidationMessages,
}

impl Config {
    /// Loads `path` (or the default location), then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        let config = Self::load_from(&path)?;
        Ok(config.with_env_overrides(
            std::env::var(STORE_URL_ENV).ok(),
            std::env::var(STORE_KEY_ENV).ok(),
        ))
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    fn with_env_overrides(mut self, url: Option<String>, anon_key: Option<String>) -> Self {
        if url.is_some() || anon_key.is_some() {
            let (current_url, current_key) = match &self.store {
                StoreConfig::Rest { url, anon_key } => (url.clone(), anon_key.clone()),
                StoreConfig::Sqlite { .. } => (String::new(), String::new()),
            };
            self.store = StoreConfig::Rest {
                url: url.unwrap_or(current_url),
                anon_key: anon_key.unwrap_or(current_key),
            };
        }
        self
    }

    pub fn open_store(&self) -> Result<Box<dyn RecordStore>> {
        match &self.store {
            StoreConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| data_dir().join(DB_FILE_NAME));
                Ok(Box::new(SqliteStore::open(&path)?))
            }
            StoreConfig::Rest { url, anon_key } => {
                if url.trim().is_empty() || anon_key.trim().is_empty() {
                    return Err(anyhow!(
                        "Missing store url or anon key. Set {STORE_URL_ENV} and {STORE_KEY_ENV}, \
                         or fill in [store] in {}",
                        default_config_path().display()
                    ));
                }
                let store = RestStore::new(url, anon_key)
                    .with_context(|| format!("Invalid store url: {url}"))?;
                Ok(Box::new(store))
            }
        }
    }
}
