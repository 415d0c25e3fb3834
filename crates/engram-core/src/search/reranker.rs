//! Cross-Encoder Reranking
//!
//! Second retrieval stage: the top fused candidates are rescored against
//! the query by a cross-encoder, producing `rerank_score` in [0, 1].
//!
//! With the `reranker-model` feature the cross-encoder is fastembed's
//! Jina Reranker v1 Turbo; scores pass through a sigmoid. Without the
//! model, a BM25-flavored term-overlap score squashed into [0, 1) keeps
//! the stage functional and deterministic.

#[cfg(feature = "reranker-model")]
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Fallback scoring constants (BM25-shaped term saturation)
const FALLBACK_K1: f32 = 1.2;
const FALLBACK_B: f32 = 0.75;
const FALLBACK_AVG_DOC_LEN: f32 = 500.0;

// ============================================================================
// TYPES
// ============================================================================

/// A reranked item with its relevance score in [0, 1]
#[derive(Debug, Clone)]
pub struct RerankedResult<T> {
    pub item: T,
    pub score: f32,
    /// Rank the item held before reranking
    pub original_rank: usize,
}

/// Reranker configuration
#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Results kept after reranking, clamped to [1, 50] by callers
    pub result_count: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self { result_count: 10 }
    }
}

// ============================================================================
// RERANKER
// ============================================================================

/// Relevance reranker with optional cross-encoder backing
pub struct Reranker {
    config: RerankerConfig,
    #[cfg(feature = "reranker-model")]
    cross_encoder: Option<TextRerank>,
}

impl Default for Reranker {
    fn default() -> Self {
        Self::new(RerankerConfig::default())
    }
}

impl Reranker {
    /// Create a reranker. The cross-encoder model is NOT loaded here;
    /// call [`Reranker::init_cross_encoder`] during daemon startup.
    pub fn new(config: RerankerConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "reranker-model")]
            cross_encoder: None,
        }
    }

    /// Load the cross-encoder model. Downloads on first call; keep out
    /// of tests and hot paths.
    #[cfg(feature = "reranker-model")]
    pub fn init_cross_encoder(&mut self) {
        if self.cross_encoder.is_some() {
            return;
        }
        let options = RerankInitOptions::new(RerankerModel::JINARerankerV1TurboEn)
            .with_show_download_progress(true);
        match TextRerank::try_new(options) {
            Ok(model) => {
                tracing::info!("cross-encoder reranker loaded");
                self.cross_encoder = Some(model);
            }
            Err(e) => {
                tracing::warn!("cross-encoder unavailable, using term-overlap fallback: {}", e);
            }
        }
    }

    /// Whether a cross-encoder model is loaded
    pub fn has_cross_encoder(&self) -> bool {
        #[cfg(feature = "reranker-model")]
        {
            self.cross_encoder.is_some()
        }
        #[cfg(not(feature = "reranker-model"))]
        {
            false
        }
    }

    /// Rerank candidates against the query, returning at most `top_k`
    /// (falling back to the configured result count) sorted by score
    /// descending. Candidates arrive as (item, text) pairs.
    pub fn rerank<T>(
        &mut self,
        query: &str,
        candidates: Vec<(T, String)>,
        top_k: Option<usize>,
    ) -> Vec<RerankedResult<T>> {
        if candidates.is_empty() || query.is_empty() {
            return vec![];
        }

        let limit = top_k.unwrap_or(self.config.result_count).clamp(1, 50);

        #[cfg(feature = "reranker-model")]
        if let Some(ref mut model) = self.cross_encoder {
            let documents: Vec<&str> = candidates.iter().map(|(_, text)| text.as_str()).collect();
            if let Ok(scores) = model.rerank(query, &documents, false, None) {
                let mut by_index: Vec<Option<f32>> = vec![None; candidates.len()];
                for rr in scores {
                    if rr.index < by_index.len() {
                        by_index[rr.index] = Some(sigmoid(rr.score));
                    }
                }
                let mut results: Vec<RerankedResult<T>> = candidates
                    .into_iter()
                    .enumerate()
                    .map(|(rank, (item, text))| {
                        let score =
                            by_index[rank].unwrap_or_else(|| fallback_score(query, &text));
                        RerankedResult {
                            item,
                            score,
                            original_rank: rank,
                        }
                    })
                    .collect();
                sort_reranked(&mut results);
                results.truncate(limit);
                return results;
            }
            // Cross-encoder failed this call: fall through to the fallback
        }

        let mut results: Vec<RerankedResult<T>> = candidates
            .into_iter()
            .enumerate()
            .map(|(rank, (item, text))| RerankedResult {
                item,
                score: fallback_score(query, &text),
                original_rank: rank,
            })
            .collect();
        sort_reranked(&mut results);
        results.truncate(limit);
        results
    }
}

fn sort_reranked<T>(results: &mut [RerankedResult<T>]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.original_rank.cmp(&b.original_rank))
    });
}

#[cfg(feature = "reranker-model")]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Term-overlap relevance with BM25-style saturation, squashed into
/// [0, 1) so downstream shaping sees the same score range either way.
fn fallback_score(query: &str, document: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let query_terms: Vec<&str> = query_lower.split_whitespace().collect();
    if query_terms.is_empty() {
        return 0.0;
    }

    let doc_lower = document.to_lowercase();
    let doc_len = document.len() as f32;
    if doc_len == 0.0 {
        return 0.0;
    }

    let mut raw = 0.0f32;
    for term in &query_terms {
        let tf = doc_lower.matches(term).count() as f32;
        if tf > 0.0 {
            let numerator = tf * (FALLBACK_K1 + 1.0);
            let denominator = tf
                + FALLBACK_K1 * (1.0 - FALLBACK_B + FALLBACK_B * (doc_len / FALLBACK_AVG_DOC_LEN));
            raw += numerator / denominator;
        }
    }
    raw /= query_terms.len() as f32;

    raw / (1.0 + raw)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rerank_orders_by_overlap() {
        let mut reranker = Reranker::default();
        let candidates = vec![
            (1, "Python is a snake species".to_string()),
            (2, "Python programming is fun".to_string()),
        ];

        let results = reranker.rerank("Python programming language", candidates, Some(2));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].item, 2);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let mut reranker = Reranker::default();
        let candidates = vec![(1, "fox fox fox fox fox".to_string())];
        let results = reranker.rerank("fox", candidates, None);
        assert!(results[0].score > 0.0);
        assert!(results[0].score < 1.0);
    }

    #[test]
    fn test_empty_inputs() {
        let mut reranker = Reranker::default();
        assert!(reranker.rerank::<i32>("query", vec![], Some(5)).is_empty());
        assert!(reranker
            .rerank("", vec![(1, "text".to_string())], Some(5))
            .is_empty());
    }

    #[test]
    fn test_top_k_clamps() {
        let mut reranker = Reranker::default();
        let candidates: Vec<(i32, String)> =
            (0..5).map(|i| (i, format!("fox document {}", i))).collect();
        // 0 clamps up to 1
        let results = reranker.rerank("fox", candidates, Some(0));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_default_has_no_cross_encoder() {
        let reranker = Reranker::default();
        assert!(!reranker.has_cross_encoder());
    }
}
