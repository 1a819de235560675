//! Completion backend trait for orchd.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// A model installed on the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub size_gb: f64,
}

/// How long the backend should keep a model resident after a call.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum KeepAlive {
    /// Backend default.
    Default,
    /// Keep loaded until told otherwise.
    Forever,
    /// Unload as soon as the call returns.
    Unload,
}

impl Default for KeepAlive {
    fn default() -> Self {
        KeepAlive::Default
    }
}

/// Per-call generation options.
#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
    pub keep_alive: KeepAlive,
    pub system: Option<String>,
}

impl GenerateOptions {
    pub fn keep_alive(keep_alive: KeepAlive) -> Self {
        Self {
            keep_alive,
            ..Default::default()
        }
    }
}

/// Text-generation service invoked with a model name and prompt.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check whether the inference server answers at all.
    async fn is_running(&self) -> bool;

    /// List installed models, in the order the backend reports them.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Generate a completion.
    async fn generate(&self, model: &str, prompt: &str, options: &GenerateOptions)
        -> Result<String>;

    /// Download a model. Progress output is drained, not interpreted.
    async fn pull(&self, model: &str) -> Result<()>;
}

impl BackendError {
    /// Whether this failure means the server could not be reached.
    pub fn is_unreachable(&self) -> bool {
        match self {
            BackendError::NotAvailable(_) | BackendError::Timeout => true,
            BackendError::HttpError(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
