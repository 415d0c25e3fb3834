//! Embedding Capability
//!
//! Produces the vectors stored next to every document. Two backends:
//!
//! - `embeddings` feature: local ONNX inference via fastembed, truncated
//!   to [`EMBEDDING_DIMENSIONS`] (Matryoshka) and re-normalized.
//! - Fallback: deterministic feature hashing over the code-aware token
//!   stream. No model download, stable across runs, good enough to keep
//!   the whole retrieval pipeline exercised in tests and on machines
//!   that never pull a model.
//!
//! The fallback is NOT a quality substitute for a real model; it exists
//! so the engine degrades instead of failing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::search::lexical::tokenize;

#[cfg(feature = "embeddings")]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Embedding dimensions stored in the collection
pub const EMBEDDING_DIMENSIONS: usize = 256;

/// Query-embedding cache capacity
const QUERY_CACHE_SIZE: usize = 100;

// ============================================================================
// SIMILARITY
// ============================================================================

/// Cosine similarity between two vectors (0.0 when either is degenerate)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ============================================================================
// EMBEDDER
// ============================================================================

/// Embedding service with an LRU cache for repeated query texts
pub struct Embedder {
    #[cfg(feature = "embeddings")]
    model: Option<Mutex<TextEmbedding>>,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl Default for Embedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder {
    /// Create an embedder without loading a model.
    ///
    /// Call [`Embedder::init_model`] during daemon startup to load the
    /// ONNX model; construction itself stays fast and test-friendly.
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "embeddings")]
            model: None,
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).expect("cache size is non-zero"),
            )),
        }
    }

    /// Load the local embedding model. Downloads on first call; do not
    /// call from tests or hot paths.
    #[cfg(feature = "embeddings")]
    pub fn init_model(&mut self) {
        if self.model.is_some() {
            return;
        }
        let options =
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(true);
        match TextEmbedding::try_new(options) {
            Ok(model) => {
                tracing::info!("embedding model loaded");
                self.model = Some(Mutex::new(model));
            }
            Err(e) => {
                tracing::warn!("embedding model unavailable, using hashed fallback: {}", e);
            }
        }
    }

    /// Whether a real model backs this embedder
    pub fn has_model(&self) -> bool {
        #[cfg(feature = "embeddings")]
        {
            self.model.is_some()
        }
        #[cfg(not(feature = "embeddings"))]
        {
            false
        }
    }

    /// Embed a document body
    pub fn embed(&self, text: &str) -> Vec<f32> {
        #[cfg(feature = "embeddings")]
        if let Some(model) = &self.model {
            if let Ok(mut guard) = model.lock() {
                if let Ok(mut vectors) = guard.embed(vec![text.to_string()], None) {
                    if let Some(vector) = vectors.pop() {
                        return truncate_and_normalize(vector);
                    }
                }
            }
            tracing::warn!("model embedding failed, falling back to hashed embedding");
        }
        hashed_embedding(text)
    }

    /// Embed a query, caching by exact text
    pub fn embed_query(&self, text: &str) -> Vec<f32> {
        if let Ok(mut cache) = self.query_cache.lock() {
            if let Some(hit) = cache.get(text) {
                return hit.clone();
            }
        }
        let vector = self.embed(text);
        if let Ok(mut cache) = self.query_cache.lock() {
            cache.put(text.to_string(), vector.clone());
        }
        vector
    }
}

/// Matryoshka truncation: keep the leading dimensions, re-normalize
#[cfg(feature = "embeddings")]
fn truncate_and_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    vector.truncate(EMBEDDING_DIMENSIONS);
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

/// Deterministic feature-hash embedding over the token stream.
///
/// Each token hashes to a bucket with a sign bit; the accumulated vector
/// is L2-normalized. Texts sharing vocabulary land near each other,
/// which is what the fused pipeline needs from the fallback.
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIMENSIONS];
    for token in tokenize(text) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % EMBEDDING_DIMENSIONS as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_bounds() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[]), 0.0);
    }

    #[test]
    fn test_hashed_embedding_deterministic() {
        let a = hashed_embedding("fn add(a: i32, b: i32) -> i32");
        let b = hashed_embedding("fn add(a: i32, b: i32) -> i32");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIMENSIONS);
    }

    #[test]
    fn test_hashed_embedding_similarity_tracks_vocabulary() {
        let query = hashed_embedding("python programming language");
        let related = hashed_embedding("python programming is fun");
        let unrelated = hashed_embedding("chrono timestamp arithmetic helpers");
        assert!(
            cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated),
            "shared-vocabulary text should score higher"
        );
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let v = hashed_embedding("");
        assert_eq!(v.len(), EMBEDDING_DIMENSIONS);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_query_cache_returns_same_vector() {
        let embedder = Embedder::new();
        let a = embedder.embed_query("what handles auth");
        let b = embedder.embed_query("what handles auth");
        assert_eq!(a, b);
    }
}
