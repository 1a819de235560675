//! Shared application state: the composition root for the daemon.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::agent::ExecutionContract;
use crate::config::Settings;
use crate::core::Coordinator;
use crate::error::Result;
use crate::hardware::HardwareProfiler;
use crate::indexing::IndexJobs;
use crate::providers::{CompletionBackend, OllamaBackend};
use crate::store::{OllamaEmbedder, RetrievalStore, SqliteStore};

pub struct AppState {
    pub settings: Settings,
    pub profiler: Arc<HardwareProfiler>,
    pub backend: Arc<dyn CompletionBackend>,
    pub store: Arc<dyn RetrievalStore>,
    pub coordinator: Coordinator,
    pub jobs: IndexJobs,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the daemon from explicit collaborators.
    pub fn new(
        settings: Settings,
        profiler: HardwareProfiler,
        backend: Arc<dyn CompletionBackend>,
        store: Arc<dyn RetrievalStore>,
    ) -> Self {
        let contract = ExecutionContract {
            fallback_model: settings.backend.fallback_model.clone(),
            timeout: Duration::from_secs(settings.backend.timeout_seconds),
        };
        let coordinator = Coordinator::new(
            store.clone(),
            backend.clone(),
            settings.retrieval.top_k,
            contract,
        );
        let jobs = IndexJobs::new(store.clone(), settings.indexing.batch_size);

        Self {
            settings,
            profiler: Arc::new(profiler),
            backend,
            store,
            coordinator,
            jobs,
            start_time: Instant::now(),
        }
    }

    /// Wire the daemon against Ollama and the on-disk store named in settings.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let ollama = OllamaBackend::with_base_url(settings.backend.base_url.clone());
        let embedder = Arc::new(OllamaEmbedder::new(
            ollama.clone(),
            settings.backend.embedding_model.clone(),
        ));
        let store = Arc::new(SqliteStore::open(&settings.store.resolved_path()?, embedder)?);

        Ok(Self::new(
            settings,
            HardwareProfiler::new(),
            Arc::new(ollama),
            store,
        ))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
