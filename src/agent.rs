//! Agents: prompt templates run against a completion backend under a timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::routing::AgentKind;
use crate::providers::{select_model, BackendError, CompletionBackend, GenerateOptions};

/// Role text and output tag for one agent variant. `role` goes out as the
/// system prompt, `instruction` heads the user prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub kind: AgentKind,
    pub name: &'static str,
    pub role: &'static str,
    pub instruction: &'static str,
    pub output_kind: &'static str,
}

pub const READER: AgentProfile = AgentProfile {
    kind: AgentKind::Reader,
    name: "CodeReader",
    role: "Explains code and project structure",
    instruction: "You are a code reader agent. Explain the following code or project structure request.",
    output_kind: "explanation",
};

pub const REFACTOR: AgentProfile = AgentProfile {
    kind: AgentKind::Refactor,
    name: "RefactorAgent",
    role: "Suggests code improvements",
    instruction: "You are a code refactoring expert. Suggest improvements for the following code.",
    output_kind: "refactor_plan",
};

pub const TEST_WRITER: AgentProfile = AgentProfile {
    kind: AgentKind::Test,
    name: "TestWriterAgent",
    role: "Generates test cases",
    instruction: "You are a QA automation engineer. Write a test case for the following scenario.",
    output_kind: "test_code",
};

pub const DOC_WRITER: AgentProfile = AgentProfile {
    kind: AgentKind::Doc,
    name: "DocWriterAgent",
    role: "Generates documentation",
    instruction: "You are a technical writer. Write documentation for the following code.",
    output_kind: "documentation",
};

impl AgentProfile {
    pub fn for_kind(kind: AgentKind) -> &'static AgentProfile {
        match kind {
            AgentKind::Reader => &READER,
            AgentKind::Refactor => &REFACTOR,
            AgentKind::Test => &TEST_WRITER,
            AgentKind::Doc => &DOC_WRITER,
        }
    }

    pub fn all() -> [&'static AgentProfile; 4] {
        [&READER, &REFACTOR, &TEST_WRITER, &DOC_WRITER]
    }

    pub fn build_prompt(&self, task: &str, context: &str) -> String {
        format!(
            "{}\nContext:\n{}\n\nRequest: {}\n",
            self.instruction, context, task
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResponseMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgentResponse {
    pub agent_name: String,
    pub content: String,
    pub metadata: Option<ResponseMetadata>,
}

/// Failure classes for a single generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    Timeout,
    BackendUnavailable,
    ModelNotFound,
    Unknown,
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCode::Timeout => write!(f, "timeout"),
            FailureCode::BackendUnavailable => write!(f, "backend_unavailable"),
            FailureCode::ModelNotFound => write!(f, "model_not_found"),
            FailureCode::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionError {
    pub code: FailureCode,
    pub message: String,
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ExecutionError {}

/// Generate once, bounded by `timeout`. No retries.
pub async fn generate_with_timeout(
    backend: &dyn CompletionBackend,
    model: &str,
    prompt: &str,
    options: &GenerateOptions,
    timeout: Duration,
) -> Result<String, ExecutionError> {
    match tokio::time::timeout(timeout, backend.generate(model, prompt, options)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(classify_error(&e)),
        Err(_) => Err(ExecutionError {
            code: FailureCode::Timeout,
            message: format!("generation exceeded timeout of {}s", timeout.as_secs()),
        }),
    }
}

fn classify_error(e: &BackendError) -> ExecutionError {
    let code = match e {
        BackendError::ModelNotFound(_) => FailureCode::ModelNotFound,
        BackendError::Timeout => FailureCode::Timeout,
        e if e.is_unreachable() => FailureCode::BackendUnavailable,
        _ => FailureCode::Unknown,
    };
    ExecutionError {
        code,
        message: e.to_string(),
    }
}

/// Settings shared by every agent invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContract {
    pub fallback_model: String,
    pub timeout: Duration,
}

impl Default for ExecutionContract {
    fn default() -> Self {
        Self {
            fallback_model: "llama2".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Run one agent. Backend failures come back as response content, never as
/// an error.
pub async fn execute(
    profile: &AgentProfile,
    backend: &dyn CompletionBackend,
    task: &str,
    context: &str,
    contract: &ExecutionContract,
) -> AgentResponse {
    let model = select_model(backend, &contract.fallback_model).await;
    let prompt = profile.build_prompt(task, context);
    let options = GenerateOptions {
        system: Some(profile.role.to_string()),
        ..Default::default()
    };

    tracing::debug!(agent = profile.name, model = %model, "Executing agent");

    let content = match generate_with_timeout(backend, &model, &prompt, &options, contract.timeout)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("{} failed: {}", profile.name, e);
            format!("Error responding to prompt: {}", e.message)
        }
    };

    AgentResponse {
        agent_name: profile.name.to_string(),
        content,
        metadata: Some(ResponseMetadata {
            kind: profile.output_kind.to_string(),
            model,
        }),
    }
}
