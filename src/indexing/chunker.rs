//! Line-window chunking of source files.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lines per chunk (roughly 500 tokens of code).
pub const LINES_PER_CHUNK: usize = 50;
/// Lines shared between consecutive chunks.
pub const OVERLAP_LINES: usize = 5;

/// Contiguous line range of a source file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TextChunk {
    pub filepath: String,
    pub content: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
}

impl TextChunk {
    /// Stable identifier, so re-indexing a file overwrites its chunks.
    pub fn id(&self) -> String {
        chunk_id(&self.filepath, self.start_line)
    }
}

pub fn chunk_id(filepath: &str, start_line: usize) -> String {
    format!("{}:{}", filepath, start_line)
}

/// Read and chunk a file. Unreadable or non-UTF-8 files produce no chunks.
pub fn chunk_file(path: &Path) -> Vec<TextChunk> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("Skipping unreadable file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match String::from_utf8(bytes) {
        Ok(text) => chunk_text(&path.to_string_lossy(), &text),
        Err(_) => {
            tracing::debug!("Skipping binary file {}", path.display());
            Vec::new()
        }
    }
}

/// Split already-decoded text into overlapping windows.
pub fn chunk_text(filepath: &str, text: &str) -> Vec<TextChunk> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let total = lines.len();
    let stride = LINES_PER_CHUNK - OVERLAP_LINES;

    let mut chunks = Vec::new();
    for start in (0..total).step_by(stride) {
        let end = (start + LINES_PER_CHUNK).min(total);
        let content = lines[start..end].concat();

        if !content.trim().is_empty() {
            chunks.push(TextChunk {
                filepath: filepath.to_string(),
                content,
                start_line: start + 1,
                end_line: end,
            });
        }

        if end == total {
            break;
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}\n", i)).collect()
    }

    #[test]
    fn test_windows_overlap_and_end_at_eof() {
        for n in [1, 49, 50, 51, 95, 96, 100, 137, 500] {
            let chunks = chunk_text("f.py", &numbered(n));
            assert!(!chunks.is_empty(), "n={}", n);
            assert_eq!(chunks.last().unwrap().end_line, n, "n={}", n);

            for pair in chunks.windows(2) {
                assert!(pair[0].end_line <= pair[1].end_line);
                assert_eq!(pair[1].start_line, pair[0].start_line + 45);
                assert_eq!(pair[0].end_line - pair[1].start_line + 1, OVERLAP_LINES);
            }
            for c in &chunks {
                assert!(c.end_line - c.start_line + 1 <= LINES_PER_CHUNK);
            }
        }
    }

    #[test]
    fn test_stops_once_window_reaches_last_line() {
        // 95 lines: [1,50] then [46,95]; a third window at 91 would only repeat.
        let chunks = chunk_text("f.py", &numbered(95));
        let ranges: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
        assert_eq!(ranges, vec![(1, 50), (46, 95)]);

        let chunks = chunk_text("f.py", &numbered(100));
        let ranges: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
        assert_eq!(ranges, vec![(1, 50), (46, 95), (91, 100)]);
        assert!(chunks[2].content.starts_with("line 91\n"));
        assert!(chunks[2].content.ends_with("line 100\n"));
    }

    #[test]
    fn test_whitespace_only_chunks_are_dropped() {
        let mut text = "   \n".repeat(60);
        text.push_str(&numbered(10));
        let chunks = chunk_text("f.py", &text);
        // [1,50] is blank; [46,70] holds the code.
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (46, 70));

        assert!(chunk_text("empty.py", "").is_empty());
        assert!(chunk_text("blank.py", "\n\n\t\n").is_empty());
    }

    #[test]
    fn test_binary_and_missing_files_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("image.png");
        std::fs::write(&bin, [0x89, b'P', b'N', b'G', 0xff, 0xfe, 0x00]).unwrap();
        assert!(chunk_file(&bin).is_empty());
        assert!(chunk_file(&dir.path().join("missing.rs")).is_empty());

        let src = dir.path().join("main.rs");
        std::fs::write(&src, "fn main() {}\n").unwrap();
        let chunks = chunk_file(&src);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id(), format!("{}:1", src.to_string_lossy()));
    }

    #[test]
    fn test_last_line_without_newline_is_kept() {
        let chunks = chunk_text("f.py", "a\nb\nc");
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].content, "a\nb\nc");
    }
}
