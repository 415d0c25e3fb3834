//! Hybrid Search
//!
//! Lexical (BM25) + vector retrieval fused with RRF, reranked by a
//! cross-encoder, then shaped by type, recency, and initiative affinity.

pub mod engine;
pub mod fusion;
pub mod lexical;
pub mod reranker;
pub mod scoring;

pub use engine::{ProjectContext, SearchEngine, SearchRequest, SearchResponse, SkeletonAttachment};
pub use fusion::{reciprocal_rank_fusion, FusedCandidate, RankedDoc, RRF_K};
pub use lexical::{tokenize, Bm25Index, LexicalDoc, LexicalHit, LexicalIndex};
pub use reranker::{RerankedResult, Reranker, RerankerConfig};
pub use scoring::{ScoredResult, INITIATIVE_AFFINITY, MIN_RECENCY_BOOST};
