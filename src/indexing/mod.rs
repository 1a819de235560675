//! Project indexing: crawl a directory, split files into chunks, upsert the
//! chunks into the retrieval store.

pub mod chunker;
pub mod crawler;
pub mod ignore;
pub mod pipeline;

pub use chunker::{chunk_file, chunk_text, TextChunk, LINES_PER_CHUNK, OVERLAP_LINES};
pub use crawler::{Crawl, ProjectCrawler};
pub use ignore::IgnoreSpec;
pub use pipeline::{index_project, IndexJob, IndexJobs, IndexSummary, JobState};
