//! Configuration loading for orchd.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Get the orchd home directory (~/.orchd).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".orchd"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.orchd/settings.json, falling back to defaults when
/// the file does not exist.
pub fn load_settings() -> Result<Settings> {
    let path = get_settings_path()?;

    if !path.exists() {
        tracing::debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    load_settings_from(&path)
}

/// Load and validate settings from an explicit path.
pub fn load_settings_from(path: &std::path::Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.indexing.batch_size == 0 {
        return Err(Error::Config("indexing.batch_size must be at least 1".to_string()));
    }
    if settings.retrieval.top_k == 0 {
        return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
    }
    if settings.backend.timeout_seconds == 0 {
        return Err(Error::Config(
            "backend.timeout_seconds must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// HTTP server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Inference backend configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Backend {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used when the backend reports no installed models.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_fallback_model() -> String {
    "llama2".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fallback_model: default_fallback_model(),
            embedding_model: default_embedding_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Vector store configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Store {
    /// Index file location. Defaults to ~/.orchd/vector_db.sqlite.
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(p) => Ok(p.clone()),
            None => Ok(get_home_dir()?.join("vector_db.sqlite")),
        }
    }
}

/// Indexing configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Indexing {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    100
}

impl Default for Indexing {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Retrieval configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Retrieval {
    /// Number of chunks fed to agents as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

impl Default for Retrieval {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// orchd settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub store: Store,

    #[serde(default)]
    pub indexing: Indexing,

    #[serde(default)]
    pub retrieval: Retrieval,
}
