//! Indexing pipeline: crawl -> chunk -> batched upsert, plus the registry of
//! background index jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::chunker::{chunk_file, TextChunk};
use super::crawler::ProjectCrawler;
use crate::error::{Error, Result};
use crate::store::{RetrievalStore, StoreItem};

/// Files read ahead of the upsert loop.
const FILE_QUEUE_DEPTH: usize = 16;

/// Finished jobs kept for status lookups; older ones are forgotten.
pub const FINISHED_JOBS_KEPT: usize = 32;

/// Counters for one indexing run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub files_seen: usize,
    pub chunks_upserted: usize,
}

/// Crawl `crawler`'s root and upsert every chunk in batches of `batch_size`,
/// then drop stored chunks under the root that this run did not produce.
///
/// Crawling and file reads happen on the blocking pool; files arrive in crawl
/// order, so chunk order and batch order are fixed. `on_batch` sees the
/// running totals after each flushed batch.
pub async fn index_project(
    crawler: &ProjectCrawler,
    store: &dyn RetrievalStore,
    batch_size: usize,
    mut on_batch: impl FnMut(&IndexSummary) + Send,
) -> Result<IndexSummary> {
    let batch_size = batch_size.max(1);
    let mut summary = IndexSummary::default();
    let mut batch: Vec<StoreItem> = Vec::with_capacity(batch_size);
    let mut produced: HashSet<String> = HashSet::new();

    tracing::info!("Starting index for {}", crawler.root().display());

    let (tx, mut rx) = mpsc::channel::<Vec<TextChunk>>(FILE_QUEUE_DEPTH);
    let walker = crawler.clone();
    let reader = tokio::task::spawn_blocking(move || {
        for path in walker.crawl() {
            // Receiver gone: the upsert side failed.
            if tx.blocking_send(chunk_file(&path)).is_err() {
                break;
            }
        }
    });

    while let Some(chunks) = rx.recv().await {
        summary.files_seen += 1;
        for chunk in chunks {
            let item = StoreItem::from(chunk);
            produced.insert(item.id.clone());
            batch.push(item);
            if batch.len() >= batch_size {
                store.upsert(&batch).await?;
                summary.chunks_upserted += batch.len();
                batch.clear();
                on_batch(&summary);
            }
        }
    }
    reader
        .await
        .map_err(|e| Error::Other(format!("crawl task failed: {}", e)))?;

    if !batch.is_empty() {
        store.upsert(&batch).await?;
        summary.chunks_upserted += batch.len();
        on_batch(&summary);
    }

    let removed = store.remove_stale(crawler.root(), produced).await?;

    tracing::info!(
        files = summary.files_seen,
        chunks = summary.chunks_upserted,
        removed,
        "Finished index for {}",
        crawler.root().display()
    );
    Ok(summary)
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

/// Status of a background index job.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IndexJob {
    pub id: Uuid,
    pub root: PathBuf,
    pub state: JobState,
    #[serde(flatten)]
    pub progress: IndexSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Background index jobs, at most one running per project root.
#[derive(Clone)]
pub struct IndexJobs {
    store: Arc<dyn RetrievalStore>,
    batch_size: usize,
    history: usize,
    jobs: Arc<Mutex<HashMap<Uuid, IndexJob>>>,
}

impl IndexJobs {
    pub fn new(store: Arc<dyn RetrievalStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size,
            history: FINISHED_JOBS_KEPT,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Keep at most `history` finished jobs.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    /// Validate `root` and start indexing it in the background. Returns as
    /// soon as the job is registered.
    pub fn start(&self, root: &Path) -> Result<IndexJob> {
        let crawler = ProjectCrawler::new(root)?;
        let job = {
            let mut jobs = self.lock()?;
            if let Some(running) = jobs
                .values()
                .find(|j| j.state == JobState::Running && j.root == crawler.root())
            {
                return Err(Error::Conflict(format!(
                    "{} is already being indexed by job {}",
                    crawler.root().display(),
                    running.id
                )));
            }

            let job = IndexJob {
                id: Uuid::new_v4(),
                root: crawler.root().to_path_buf(),
                state: JobState::Running,
                progress: IndexSummary::default(),
                started_at: Utc::now(),
                finished_at: None,
                error: None,
            };
            jobs.insert(job.id, job.clone());
            job
        };

        let this = self.clone();
        let id = job.id;
        tokio::spawn(async move {
            let progress = this.clone();
            let result = index_project(&crawler, this.store.as_ref(), this.batch_size, |s| {
                progress.update(id, |job| job.progress = *s);
            })
            .await;

            this.update(id, |job| {
                job.finished_at = Some(Utc::now());
                match result {
                    Ok(summary) => {
                        job.progress = summary;
                        job.state = JobState::Completed;
                    }
                    Err(e) => {
                        tracing::error!("Index job {} failed: {}", id, e);
                        job.state = JobState::Failed;
                        job.error = Some(e.to_string());
                    }
                }
            });
            this.forget_oldest_finished();
        });

        tracing::info!("Index job {} started for {}", job.id, job.root.display());
        Ok(job)
    }

    /// Look up a job by id.
    pub fn get(&self, id: Uuid) -> Result<IndexJob> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("index job {}", id)))
    }

    /// All known jobs, newest first.
    pub fn list(&self) -> Result<Vec<IndexJob>> {
        let mut jobs: Vec<IndexJob> = self.lock()?.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs)
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut IndexJob)) {
        match self.jobs.lock() {
            Ok(mut jobs) => {
                if let Some(job) = jobs.get_mut(&id) {
                    apply(job);
                }
            }
            Err(_) => tracing::error!("Index job registry lock poisoned"),
        }
    }

    fn forget_oldest_finished(&self) {
        let Ok(mut jobs) = self.jobs.lock() else {
            tracing::error!("Index job registry lock poisoned");
            return;
        };
        let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
            .values()
            .filter(|j| j.state != JobState::Running)
            .map(|j| (j.finished_at.unwrap_or(j.started_at), j.id))
            .collect();
        if finished.len() <= self.history {
            return;
        }
        finished.sort();
        let excess = finished.len() - self.history;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, IndexJob>>> {
        self.jobs
            .lock()
            .map_err(|_| Error::Other("index job registry lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RetrievalMatch, SqliteStore};
    use crate::test_support::{DownEmbedder, KeywordEmbedder};
    use async_trait::async_trait;
    use std::fs;
    use std::time::Duration;

    /// Records batch sizes instead of storing anything.
    #[derive(Default)]
    struct BatchRecorder {
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl RetrievalStore for BatchRecorder {
        async fn upsert(&self, items: &[StoreItem]) -> Result<()> {
            self.batches
                .lock()
                .unwrap()
                .push(items.iter().map(|i| i.id.clone()).collect());
            Ok(())
        }

        async fn query(&self, _text: &str, _k: usize) -> Result<Vec<RetrievalMatch>> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<usize> {
            Ok(self.batches.lock().unwrap().iter().map(Vec::len).sum())
        }

        async fn remove_stale(&self, _root: &Path, _keep: HashSet<String>) -> Result<usize> {
            Ok(0)
        }
    }

    fn write_lines(path: &Path, n: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let text: String = (1..=n).map(|i| format!("value_{} = {}\n", i, i)).collect();
        fs::write(path, text).unwrap();
    }

    async fn wait_for(jobs: &IndexJobs, id: Uuid) -> IndexJob {
        for _ in 0..200 {
            let job = jobs.get(id).unwrap();
            if job.state != JobState::Running {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("index job {} did not finish", id);
    }

    #[tokio::test]
    async fn test_batches_are_bounded_and_flushed() {
        let dir = tempfile::tempdir().unwrap();
        // 3 files x 3 chunks (120 lines each) = 9 chunks.
        for name in ["a.py", "b.py", "c.py"] {
            write_lines(&dir.path().join(name), 120);
        }
        fs::write(dir.path().join("blob.bin"), [0xffu8, 0xfe, 0x00]).unwrap();

        let crawler = ProjectCrawler::new(dir.path()).unwrap();
        let store = BatchRecorder::default();
        let mut seen = Vec::new();
        let summary = index_project(&crawler, &store, 4, |s| seen.push(*s))
            .await
            .unwrap();

        assert_eq!(summary.files_seen, 4);
        assert_eq!(summary.chunks_upserted, 9);
        let sizes: Vec<usize> = store.batches.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_eq!(seen.last().unwrap().chunks_upserted, 9);
    }

    #[tokio::test]
    async fn test_reindex_drops_chunks_that_no_longer_exist() {
        let dir = tempfile::tempdir().unwrap();
        write_lines(&dir.path().join("a.py"), 100);
        write_lines(&dir.path().join("b.py"), 10);
        let crawler = ProjectCrawler::new(dir.path()).unwrap();
        let store = SqliteStore::in_memory(Arc::new(KeywordEmbedder::default())).unwrap();

        index_project(&crawler, &store, 100, |_| {}).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 4);

        // Shrink a.py to one line, delete b.py.
        fs::write(dir.path().join("a.py"), "shrunk = True\n").unwrap();
        fs::remove_file(dir.path().join("b.py")).unwrap();
        index_project(&crawler, &store, 100, |_| {}).await.unwrap();

        let a = crawler.root().join("a.py");
        assert_eq!(store.ids().unwrap(), vec![format!("{}:1", a.display())]);
        let hits = store.query("shrunk", 5).await.unwrap();
        assert_eq!(hits[0].content, "shrunk = True\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_paths_do_not_abort_indexing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write_lines(&dir.path().join("a.py"), 10);
        write_lines(&dir.path().join("locked/inner.py"), 10);
        write_lines(&dir.path().join("secret.py"), 10);
        let locked = dir.path().join("locked");
        let secret = dir.path().join("secret.py");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind root.
        if fs::read(&secret).is_err() {
            let crawler = ProjectCrawler::new(dir.path()).unwrap();
            let store = SqliteStore::in_memory(Arc::new(KeywordEmbedder::default())).unwrap();
            let summary = index_project(&crawler, &store, 100, |_| {}).await.unwrap();

            assert_eq!(summary.files_seen, 2);
            assert_eq!(summary.chunks_upserted, 1);
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[tokio::test]
    async fn test_finished_jobs_are_capped() {
        let first_root = tempfile::tempdir().unwrap();
        let second_root = tempfile::tempdir().unwrap();
        write_lines(&first_root.path().join("a.py"), 10);
        write_lines(&second_root.path().join("b.py"), 10);

        let jobs = IndexJobs::new(Arc::new(BatchRecorder::default()), 100).with_history(1);
        let first = jobs.start(first_root.path()).unwrap();
        wait_for(&jobs, first.id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = jobs.start(second_root.path()).unwrap();
        for _ in 0..200 {
            if jobs.list().unwrap().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(matches!(jobs.get(first.id), Err(Error::NotFound(_))));
        assert_eq!(jobs.get(second.id).unwrap().state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_background_job_completes() {
        crate::logging::init_test();
        let dir = tempfile::tempdir().unwrap();
        write_lines(&dir.path().join("src/app.py"), 60);
        write_lines(&dir.path().join("node_modules/x/index.js"), 60);

        let store = Arc::new(SqliteStore::in_memory(Arc::new(KeywordEmbedder::default())).unwrap());
        let jobs = IndexJobs::new(store.clone(), 100);
        let job = jobs.start(dir.path()).unwrap();
        assert_eq!(job.state, JobState::Running);

        let done = wait_for(&jobs, job.id).await;
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.progress.files_seen, 1);
        assert_eq!(done.progress.chunks_upserted, 2);
        assert!(done.finished_at.is_some());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_root_rejected_before_work() {
        let store = Arc::new(BatchRecorder::default());
        let jobs = IndexJobs::new(store, 100);
        let err = jobs.start(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.is_client_fault());
        assert!(jobs.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_job_for_same_root_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        write_lines(&dir.path().join("a.py"), 10);

        let store = Arc::new(BatchRecorder::default());
        let jobs = IndexJobs::new(store, 100);
        // The spawned task cannot run before this test yields.
        let first = jobs.start(dir.path()).unwrap();
        let err = jobs.start(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        wait_for(&jobs, first.id).await;
        let again = jobs.start(dir.path()).unwrap();
        assert_ne!(again.id, first.id);
    }

    #[tokio::test]
    async fn test_store_outage_marks_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        write_lines(&dir.path().join("a.py"), 10);

        let store = Arc::new(SqliteStore::in_memory(Arc::new(DownEmbedder)).unwrap());
        let jobs = IndexJobs::new(store, 100);
        let job = jobs.start(dir.path()).unwrap();

        let done = wait_for(&jobs, job.id).await;
        assert_eq!(done.state, JobState::Failed);
        assert!(done.error.unwrap().contains("connection refused"));
    }
}
