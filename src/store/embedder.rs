//! Embedding functions used by the store.

use async_trait::async_trait;

use crate::providers::{BackendError, OllamaBackend};

/// Turns texts into vectors. One output vector per input, same order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError>;
}

/// Embeddings computed by an Ollama embedding model.
#[derive(Clone)]
pub struct OllamaEmbedder {
    backend: OllamaBackend,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(backend: OllamaBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.embed(&self.model, texts).await
    }
}
