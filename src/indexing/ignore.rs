//! Ignore spec: built-in excludes merged with the project's `.gitignore`.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Name of the per-project ignore file.
pub const IGNORE_FILENAME: &str = ".gitignore";

/// Patterns excluded from every crawl: VCS metadata, dependency caches,
/// build output and secrets.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git/",
    "__pycache__/",
    ".env",
    "node_modules/",
    ".venv/",
    "target/",
    "dist/",
    "build/",
    "*.pyc",
    ".DS_Store",
];

/// Merged set of gitignore-style patterns rooted at a project directory.
#[derive(Clone, Debug)]
pub struct IgnoreSpec {
    matcher: Gitignore,
}

impl IgnoreSpec {
    /// Build the spec for `root`: defaults first, then the project's ignore
    /// file if it can be read. Bad user patterns are logged and skipped.
    pub fn load(root: &Path) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in DEFAULT_IGNORES {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Invalid built-in ignore pattern {}: {}", pattern, e);
            }
        }

        let ignore_file = root.join(IGNORE_FILENAME);
        if ignore_file.is_file() {
            if let Some(e) = builder.add(&ignore_file) {
                tracing::warn!("Problem reading {}: {}", ignore_file.display(), e);
            }
        }

        let matcher = builder.build().unwrap_or_else(|e| {
            tracing::warn!("Falling back to empty ignore spec: {}", e);
            Gitignore::empty()
        });

        Self { matcher }
    }

    /// Whether `path` (absolute under the root, or relative to it) is excluded.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.matcher.matched(path, is_dir).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_ignore_file() {
        let dir = tempfile::tempdir().unwrap();
        let spec = IgnoreSpec::load(dir.path());

        assert!(spec.is_ignored(&dir.path().join(".git"), true));
        assert!(spec.is_ignored(&dir.path().join("web/node_modules"), true));
        assert!(spec.is_ignored(&dir.path().join("pkg/mod.pyc"), false));
        assert!(!spec.is_ignored(&dir.path().join("src/main.py"), false));
    }

    #[test]
    fn test_trailing_slash_only_matches_directories() {
        let dir = tempfile::tempdir().unwrap();
        let spec = IgnoreSpec::load(dir.path());

        assert!(spec.is_ignored(&dir.path().join("build"), true));
        assert!(!spec.is_ignored(&dir.path().join("build"), false));
    }

    #[test]
    fn test_project_patterns_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(IGNORE_FILENAME),
            "# generated\n/docs/\nlogs/**/*.log\n*.tmp\n!keep.tmp\n",
        )
        .unwrap();
        let spec = IgnoreSpec::load(dir.path());

        // Anchored: only the top-level docs directory.
        assert!(spec.is_ignored(&dir.path().join("docs"), true));
        assert!(!spec.is_ignored(&dir.path().join("src/docs"), true));

        assert!(spec.is_ignored(&dir.path().join("logs/a/b/run.log"), false));
        assert!(spec.is_ignored(&dir.path().join("scratch.tmp"), false));
        assert!(!spec.is_ignored(&dir.path().join("keep.tmp"), false));

        // Defaults survive alongside user patterns.
        assert!(spec.is_ignored(&dir.path().join(".git"), true));
    }
}
