//! Project crawler: walks a directory tree, pruning ignored paths before
//! descending into them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

use super::ignore::IgnoreSpec;
use crate::error::{Error, Result};

type EntryFilter = Box<dyn FnMut(&DirEntry) -> bool + Send>;

/// Walks a project root and yields the files that are not ignored.
#[derive(Clone, Debug)]
pub struct ProjectCrawler {
    root: PathBuf,
    spec: Arc<IgnoreSpec>,
}

impl ProjectCrawler {
    /// Prepare a crawler for `root`. The root must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| Error::InvalidInput(format!("{}: {}", root.display(), e)))?;
        if !root.is_dir() {
            return Err(Error::InvalidInput(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let spec = Arc::new(IgnoreSpec::load(&root));
        Ok(Self { root, spec })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk. Each call re-reads the filesystem, so a crawl can be
    /// repeated; the ignore spec is the one loaded at construction.
    pub fn crawl(&self) -> Crawl {
        let visited = Arc::new(AtomicUsize::new(0));
        let spec = Arc::clone(&self.spec);
        let counter = Arc::clone(&visited);

        let filter: EntryFilter = Box::new(move |entry: &DirEntry| {
            counter.fetch_add(1, Ordering::Relaxed);
            if entry.depth() == 0 {
                return true;
            }
            !spec.is_ignored(entry.path(), entry.file_type().is_dir())
        });

        // No sorter: a sorted walk reads each directory listing before the
        // filter gets to prune it.
        let inner = WalkDir::new(&self.root).into_iter().filter_entry(filter);

        Crawl { inner, visited }
    }
}

/// Lazy sequence of absolute, non-ignored file paths.
pub struct Crawl {
    inner: walkdir::FilterEntry<walkdir::IntoIter, EntryFilter>,
    visited: Arc<AtomicUsize>,
}

impl Crawl {
    /// Filesystem entries examined so far, including pruned directories but
    /// never their contents.
    pub fn visited(&self) -> usize {
        self.visited.load(Ordering::Relaxed)
    }
}

impl Iterator for Crawl {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.inner.next()? {
                Ok(entry) if entry.file_type().is_file() => return Some(entry.into_path()),
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Skipping unreadable path: {}", e);
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x = 1\n").unwrap();
    }

    fn relative(crawler: &ProjectCrawler, paths: Vec<PathBuf>) -> Vec<String> {
        let mut rel: Vec<String> = paths
            .into_iter()
            .map(|p| {
                p.strip_prefix(crawler.root())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        rel.sort();
        rel
    }

    #[test]
    fn test_skips_vcs_and_dependency_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".git/HEAD");
        touch(dir.path(), ".git/objects/ab/cdef");
        touch(dir.path(), "node_modules/left-pad/index.js");
        touch(dir.path(), "a.py");

        let crawler = ProjectCrawler::new(dir.path()).unwrap();
        let files: Vec<PathBuf> = crawler.crawl().collect();

        assert!(files.iter().all(|p| p.is_absolute()));
        assert_eq!(relative(&crawler, files), vec!["a.py"]);
    }

    #[test]
    fn test_ignored_directory_is_never_descended() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.py");
        for i in 0..20 {
            touch(dir.path(), &format!("vendor/lib{}/mod.py", i));
        }

        let crawler = ProjectCrawler::new(dir.path()).unwrap();
        let mut crawl = crawler.crawl();
        let files: Vec<PathBuf> = crawl.by_ref().collect();
        let open_visits = crawl.visited();
        assert_eq!(files.len(), 21);

        fs::write(dir.path().join(".gitignore"), "vendor/\n").unwrap();
        let crawler = ProjectCrawler::new(dir.path()).unwrap();
        let mut crawl = crawler.crawl();
        let files: Vec<PathBuf> = crawl.by_ref().collect();

        assert_eq!(relative(&crawler, files), vec![".gitignore", "a.py"]);
        // root, .gitignore, a.py, vendor -- nothing below vendor/.
        assert_eq!(crawl.visited(), 4);
        assert!(crawl.visited() < open_visits);
    }

    #[test]
    fn test_crawl_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/lib.rs");
        touch(dir.path(), "src/util/mod.rs");
        touch(dir.path(), "README.md");

        let crawler = ProjectCrawler::new(dir.path()).unwrap();
        let first: Vec<PathBuf> = crawler.crawl().collect();
        let second: Vec<PathBuf> = crawler.crawl().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_does_not_stop_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.py");
        touch(dir.path(), "locked/inner.py");
        touch(dir.path(), "z/b.py");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind root.
        if fs::read_dir(&locked).is_err() {
            let crawler = ProjectCrawler::new(dir.path()).unwrap();
            let files: Vec<PathBuf> = crawler.crawl().collect();
            assert_eq!(relative(&crawler, files), vec!["a.py", "z/b.py"]);
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectCrawler::new(dir.path().join("nope")).unwrap_err();
        assert!(err.is_client_fault());

        touch(dir.path(), "file.txt");
        let err = ProjectCrawler::new(dir.path().join("file.txt")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
