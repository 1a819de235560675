//! Inference backends.

use std::sync::Arc;

pub mod ollama;
pub mod provider;

pub use ollama::OllamaBackend;
pub use provider::{BackendError, CompletionBackend, GenerateOptions, KeepAlive, ModelInfo, Result};

use crate::config::Settings;

/// Build the backend configured in settings.
pub fn create_backend(settings: &Settings) -> Arc<dyn CompletionBackend> {
    Arc::new(OllamaBackend::with_base_url(settings.backend.base_url.clone()))
}

/// Warm a model so the next generation does not pay the load cost.
pub async fn load_model(backend: &dyn CompletionBackend, model: &str) -> Result<()> {
    tracing::info!("Loading model {}", model);
    backend
        .generate(model, "", &GenerateOptions::keep_alive(KeepAlive::Forever))
        .await
        .map(|_| ())
}

/// Ask the backend to unload a model.
pub async fn stop_model(backend: &dyn CompletionBackend, model: &str) -> Result<()> {
    tracing::info!("Stopping model {}", model);
    backend
        .generate(model, "", &GenerateOptions::keep_alive(KeepAlive::Unload))
        .await
        .map(|_| ())
}

/// Pick the model agents should use: the first installed one, else the fallback.
pub async fn select_model(backend: &dyn CompletionBackend, fallback: &str) -> String {
    match backend.list_models().await {
        Ok(models) => models
            .into_iter()
            .next()
            .map(|m| m.name)
            .unwrap_or_else(|| fallback.to_string()),
        Err(e) => {
            tracing::warn!("Listing models failed, using fallback {}: {}", fallback, e);
            fallback.to_string()
        }
    }
}
