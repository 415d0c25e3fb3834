//! Ingestion Pipeline
//!
//! Metadata-first codebase ingestion with delta sync: walker, chunker,
//! language extractors, skeleton builder, state recording, and orphan
//! garbage collection.

pub mod chunker;
pub mod engine;
pub mod extract;
pub mod skeleton;
pub mod state;
pub mod walker;

pub use chunker::{chunk_source, detect_language, Chunk, CHUNK_OVERLAP_CHARS, CHUNK_TARGET_CHARS};
pub use engine::{
    IngestOutcome, IngestRequest, IngestStats, Ingestor, TaskStatus, ASYNC_FILE_THRESHOLD,
};
pub use extract::{
    DataContractInfo, EntryPointInfo, Extraction, ExtractorRegistry, LanguageExtractor,
};
pub use skeleton::{generate_tree, SkeletonStats, DEFAULT_MAX_DEPTH};
pub use state::{load_state, save_state, state_path, IngestState};
pub use walker::{build_globset, compute_file_hash, load_ignore_patterns, walk_codebase, WalkOptions};
