//! SQLite-backed retrieval store.
//!
//! Chunks and their embeddings live in a single table; queries embed the
//! query text and rank stored vectors by cosine distance. Database work runs
//! on the blocking pool.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ChunkMetadata, Embedder, RetrievalMatch, RetrievalStore, StoreItem};
use crate::error::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    filepath TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_filepath ON chunks(filepath);
"#;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteStore {
    /// Open (or create) the index file at `path`.
    pub fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        tracing::info!("Opened vector store at {}", path.display());
        Self::with_connection(conn, embedder)
    }

    /// Non-persistent store, mainly for tests.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, embedder)
    }

    fn with_connection(conn: Connection, embedder: Arc<dyn Embedder>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock_conn(&self.conn)
    }

    /// Run `work` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock_conn(&shared)?;
            work(&mut conn)
        })
        .await
        .map_err(|e| Error::Other(format!("vector store task failed: {}", e)))?
    }

    /// Ids of every stored chunk, sorted.
    pub fn ids(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM chunks ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::Other("vector store lock poisoned".to_string()))
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// 1 - cosine similarity; zero vectors are maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl RetrievalStore for SqliteStore {
    async fn upsert(&self, items: &[StoreItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = items.iter().map(|i| i.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != items.len() {
            return Err(Error::BackendUnavailable(format!(
                "embedder returned {} vectors for {} items",
                embeddings.len(),
                items.len()
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        let rows: Vec<(StoreItem, Vec<u8>)> = items
            .iter()
            .cloned()
            .zip(embeddings.iter().map(|e| encode_vector(e)))
            .collect();
        let upserted = rows.len();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO chunks (id, filepath, start_line, end_line, content, embedding, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                        filepath = excluded.filepath,
                        start_line = excluded.start_line,
                        end_line = excluded.end_line,
                        content = excluded.content,
                        embedding = excluded.embedding,
                        updated_at = excluded.updated_at",
                )?;
                for (item, blob) in &rows {
                    stmt.execute(params![
                        item.id,
                        item.metadata.filepath,
                        item.metadata.start_line as i64,
                        item.metadata.end_line as i64,
                        item.text,
                        blob,
                        now
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::debug!("Upserted {} chunks", upserted);
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalMatch>> {
        if k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendUnavailable("embedder returned no vector".to_string()))?;

        self.blocking(move |conn| nearest(conn, &query_vector, k)).await
    }

    async fn count(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn remove_stale(&self, root: &Path, keep: HashSet<String>) -> Result<usize> {
        let root: PathBuf = root.to_path_buf();
        let removed = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;
                let stale: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT id, filepath FROM chunks")?;
                    let rows = stmt.query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?;
                    let mut stale = Vec::new();
                    for row in rows {
                        let (id, filepath) = row?;
                        if Path::new(&filepath).starts_with(&root) && !keep.contains(&id) {
                            stale.push(id);
                        }
                    }
                    stale
                };
                {
                    let mut delete = tx.prepare("DELETE FROM chunks WHERE id = ?1")?;
                    for id in &stale {
                        delete.execute(params![id])?;
                    }
                }
                tx.commit()?;
                Ok(stale.len())
            })
            .await?;

        if removed > 0 {
            tracing::info!("Removed {} stale chunks", removed);
        }
        Ok(removed)
    }
}

/// Exact scan: score every stored vector against `query`, keep the `k` best.
fn nearest(conn: &Connection, query: &[f32], k: usize) -> Result<Vec<RetrievalMatch>> {
    let mut stmt =
        conn.prepare("SELECT id, content, filepath, start_line, end_line, embedding FROM chunks")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            RetrievalMatch {
                id: row.get(0)?,
                content: row.get(1)?,
                metadata: ChunkMetadata {
                    filepath: row.get(2)?,
                    start_line: row.get::<_, i64>(3)? as usize,
                    end_line: row.get::<_, i64>(4)? as usize,
                },
                distance: 0.0,
            },
            row.get::<_, Vec<u8>>(5)?,
        ))
    })?;

    let mut matches = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let (mut hit, blob) = row?;
        let vector = decode_vector(&blob);
        if vector.len() != query.len() {
            skipped += 1;
            continue;
        }
        hit.distance = cosine_distance(query, &vector);
        matches.push(hit);
    }
    if skipped > 0 {
        tracing::warn!(
            "Skipped {} chunks embedded with a different dimension; re-index to refresh",
            skipped
        );
    }

    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
    matches.truncate(k);
    Ok(matches)
}
