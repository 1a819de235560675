//! orchd library root.

pub mod agent;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod hardware;
pub mod indexing;
pub mod logging;
pub mod providers;
pub mod store;
pub mod web;

#[cfg(test)]
mod test_support;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use crate::core::{classify, AgentKind, Coordinator};
pub use error::{Error, Result};
pub use hardware::{select_model_tier, HardwareProfile, HardwareProfiler, ModelRecommendation, ModelTier};
pub use indexing::{index_project, ProjectCrawler, TextChunk};
pub use providers::{CompletionBackend, OllamaBackend};
pub use store::{RetrievalMatch, RetrievalStore, SqliteStore};
pub use web::{create_app_router, AppState};
