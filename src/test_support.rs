//! In-process fakes for the embedding and completion collaborators.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use crate::providers::{BackendError, CompletionBackend, GenerateOptions, ModelInfo};
use crate::store::Embedder;

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
pub struct KeywordEmbedder {
    dims: usize,
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self { dims: 1024 }
    }
}

impl KeywordEmbedder {
    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() as usize) % self.dims] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Embedder whose server is always down.
pub struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        Err(BackendError::NotAvailable("connection refused".to_string()))
    }
}

/// Completion backend that records prompts and answers from a script.
pub struct RecordingBackend {
    pub models: Vec<ModelInfo>,
    pub reply: Result<String, String>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<(String, String)>>,
    pub systems: Mutex<Vec<Option<String>>>,
}

impl RecordingBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            models: vec![ModelInfo {
                name: "llama3:8b".to_string(),
                size_gb: 4.34,
            }],
            reply: Ok(reply.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
            systems: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn without_models(mut self) -> Self {
        self.models.clear();
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// System prompts seen, one per generate call.
    pub fn systems(&self) -> Vec<Option<String>> {
        self.systems.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn is_running(&self) -> bool {
        self.reply.is_ok()
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        Ok(self.models.clone())
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));
        self.systems.lock().unwrap().push(options.system.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(BackendError::NotAvailable)
    }

    async fn pull(&self, _model: &str) -> Result<(), BackendError> {
        Ok(())
    }
}
