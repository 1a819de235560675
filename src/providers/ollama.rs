//! Ollama HTTP backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::{BackendError, CompletionBackend, GenerateOptions, KeepAlive, ModelInfo, Result};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

const STATUS_TIMEOUT: Duration = Duration::from_secs(1);
const LIST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<i64>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagInfo>,
}

#[derive(Deserialize)]
struct TagInfo {
    #[serde(default = "unknown_name")]
    name: String,
    #[serde(default)]
    size: u64,
}

fn unknown_name() -> String {
    "unknown".to_string()
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullLine {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

fn keep_alive_value(keep_alive: KeepAlive) -> Option<i64> {
    match keep_alive {
        KeepAlive::Default => None,
        KeepAlive::Forever => Some(-1),
        KeepAlive::Unload => Some(0),
    }
}

impl OllamaBackend {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Embed a batch of texts with the given embedding model.
    pub async fn embed(&self, model: &str, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest { model, input })
            .send()
            .await
            .map_err(unreachable_or_http)?;

        let status = response.status();
        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(classify_api_error(model, error));
        }
        if !status.is_success() {
            return Err(BackendError::ApiError(format!("embed returned {}", status)));
        }
        if body.embeddings.len() != input.len() {
            return Err(BackendError::ParseError(format!(
                "expected {} embeddings, got {}",
                input.len(),
                body.embeddings.len()
            )));
        }

        Ok(body.embeddings)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn unreachable_or_http(e: reqwest::Error) -> BackendError {
    if e.is_connect() {
        BackendError::NotAvailable(e.to_string())
    } else if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::HttpError(e)
    }
}

fn classify_api_error(model: &str, error: String) -> BackendError {
    if error.contains("not found") {
        BackendError::ModelNotFound(model.to_string())
    } else {
        BackendError::ApiError(error)
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_running(&self) -> bool {
        match self
            .client
            .get(format!("{}/", self.base_url))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama status probe failed: {}", e);
                false
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(unreachable_or_http)?;

        if !response.status().is_success() {
            return Err(BackendError::ApiError(format!(
                "tags returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size_gb: (m.size as f64 / 1024f64.powi(3) * 100.0).round() / 100.0,
            })
            .collect())
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            system: options.system.as_deref(),
            keep_alive: keep_alive_value(options.keep_alive),
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(unreachable_or_http)?;

        let status = response.status();
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(classify_api_error(model, error));
        }
        if !status.is_success() {
            return Err(BackendError::ApiError(format!("generate returned {}", status)));
        }

        Ok(body.response)
    }

    async fn pull(&self, model: &str) -> Result<()> {
        tracing::info!("Pulling model: {}", model);

        let mut response = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&PullRequest {
                model,
                stream: true,
            })
            .send()
            .await
            .map_err(unreachable_or_http)?;

        if !response.status().is_success() {
            return Err(BackendError::ApiError(format!(
                "pull returned {}",
                response.status()
            )));
        }

        let mut lines = LineBuffer::default();
        while let Some(chunk) = response.chunk().await? {
            for line in lines.push(&chunk) {
                check_pull_line(model, &line)?;
            }
        }
        check_pull_line(model, &lines.finish())?;

        tracing::info!("Pulled model: {}", model);
        Ok(())
    }
}

/// Splits a byte stream into trimmed lines. Bytes are held until a newline
/// arrives, so a chunk may end inside a UTF-8 sequence.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }

    fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).trim().to_string()
    }
}

fn check_pull_line(model: &str, line: &str) -> Result<()> {
    if line.is_empty() {
        return Ok(());
    }
    tracing::debug!(model, "{}", line);
    if let Ok(PullLine { error: Some(error) }) = serde_json::from_str::<PullLine>(line) {
        return Err(classify_api_error(model, error));
    }
    Ok(())
}
