//! Coordinator: classify a task, pull context from the store, run the agent.

use std::sync::Arc;

use super::routing::classify;
use crate::agent::{execute, AgentProfile, AgentResponse, ExecutionContract};
use crate::providers::CompletionBackend;
use crate::store::{RetrievalMatch, RetrievalStore};

pub struct Coordinator {
    store: Arc<dyn RetrievalStore>,
    backend: Arc<dyn CompletionBackend>,
    top_k: usize,
    contract: ExecutionContract,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn RetrievalStore>,
        backend: Arc<dyn CompletionBackend>,
        top_k: usize,
        contract: ExecutionContract,
    ) -> Self {
        Self {
            store,
            backend,
            top_k,
            contract,
        }
    }

    /// Answer a task end to end. Never fails: retrieval errors mean no
    /// context, generation errors end up in the response content.
    pub async fn route(&self, task: &str) -> AgentResponse {
        let kind = classify(task);
        let profile = AgentProfile::for_kind(kind);
        tracing::info!("Routing task to {} ({})", profile.name, kind);

        let context = match self.store.query(task, self.top_k).await {
            Ok(matches) => build_context(&matches),
            Err(e) => {
                tracing::warn!("Context retrieval failed, continuing without: {}", e);
                String::new()
            }
        };

        execute(profile, self.backend.as_ref(), task, &context, &self.contract).await
    }
}

/// Join matches in rank order, one "File:/Content:" block each.
pub fn build_context(matches: &[RetrievalMatch]) -> String {
    matches
        .iter()
        .map(|m| format!("File: {}\nContent:\n{}", m.metadata.filepath, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
