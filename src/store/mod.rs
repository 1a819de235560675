//! Retrieval store: upsert chunk texts and query them by similarity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub mod embedder;
pub mod sqlite;

pub use embedder::{Embedder, OllamaEmbedder};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::indexing::TextChunk;

/// Where a stored chunk came from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub filepath: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// One upsert unit.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreItem {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl From<TextChunk> for StoreItem {
    fn from(chunk: TextChunk) -> Self {
        Self {
            id: chunk.id(),
            metadata: ChunkMetadata {
                filepath: chunk.filepath,
                start_line: chunk.start_line,
                end_line: chunk.end_line,
            },
            text: chunk.content,
        }
    }
}

/// A query hit; lower distance means more similar.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RetrievalMatch {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// Insert or overwrite items by id.
    async fn upsert(&self, items: &[StoreItem]) -> Result<()>;

    /// Up to `k` nearest items, most similar first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalMatch>>;

    /// Number of stored items.
    async fn count(&self) -> Result<usize>;

    /// Delete items whose file lies under `root` and whose id is not in
    /// `keep`. Returns how many were removed.
    async fn remove_stale(&self, root: &Path, keep: HashSet<String>) -> Result<usize>;
}
