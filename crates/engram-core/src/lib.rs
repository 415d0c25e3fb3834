//! # Engram Core
//!
//! Developer-memory engine: ingests source repositories into a local
//! document store and answers natural-language queries through a hybrid
//! retrieval pipeline.
//!
//! - **Document taxonomy**: eleven types in three categories
//!   (navigation / usage / memory); scoring, filtering, and lifecycle
//!   all key off the type tag
//! - **Hybrid search**: BM25 lexical index + vector similarity, fused
//!   with Reciprocal Rank Fusion, reranked by a cross-encoder, then
//!   shaped by type multipliers, recency decay, and initiative affinity
//! - **Delta-sync ingestion**: git-delta / hash-diff / full strategies,
//!   language-aware chunking, extractor registry, skeleton generation,
//!   orphan garbage collection
//! - **Memory lifecycle**: notes, file-hash-anchored insights with
//!   validation and supersession, session summaries, initiatives
//! - **Session capture**: significance-gated, dedup'd durable queue
//!   with a single summarization worker
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use engram_core::prelude::*;
//! use std::sync::{Arc, RwLock};
//!
//! let embedder = Arc::new(Embedder::new());
//! let collection = Arc::new(Collection::open(data_dir.join("engram.db"), embedder)?);
//! let lexical = Arc::new(LexicalIndex::new());
//! let config = Arc::new(RwLock::new(RuntimeConfig::default()));
//!
//! let engine = SearchEngine::new(collection.clone(), lexical.clone(), Reranker::default(), config);
//! let response = engine.search(SearchRequest::query("how do retries work"), None)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): bundle SQLite into the binary
//! - `embeddings`: local ONNX embedding model via fastembed
//! - `reranker-model`: cross-encoder reranker via fastembed

// ============================================================================
// MODULES
// ============================================================================

pub mod capture;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gitctx;
pub mod ingest;
pub mod initiative;
pub mod llm;
pub mod memory;
pub mod migrate;
pub mod orient;
pub mod scrub;
pub mod search;
pub mod store;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{AutocaptureConfig, ConfigPatch, RuntimeConfig};
pub use document::{
    DocumentType, SearchPreset, Status, TypeCategory, ValidationResult, UNKNOWN_BRANCH,
};
pub use embedding::{cosine_similarity, Embedder, EMBEDDING_DIMENSIONS};
pub use error::{EngramError, Result};
pub use llm::{LlmProvider, NoProvider, ProviderKind};
pub use scrub::scrub_secrets;
pub use store::{Collection, DocumentEntry, QueryHit, StoredDocument, WhereFilter};

pub use search::{
    LexicalIndex, Reranker, ScoredResult, SearchEngine, SearchRequest, SearchResponse,
};

pub use capture::{CaptureJob, CaptureQueue, CaptureService, WorkerHandle};
pub use ingest::{IngestOutcome, IngestRequest, IngestStats, Ingestor, TaskStatus};
pub use initiative::InitiativeManager;
pub use memory::{MemoryStore, SaveOptions};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Collection, DocumentEntry, DocumentType, Embedder, EngramError, IngestRequest, Ingestor,
        InitiativeManager, LexicalIndex, MemoryStore, Reranker, Result, RuntimeConfig,
        SaveOptions, SearchEngine, SearchRequest, WhereFilter,
    };
}
