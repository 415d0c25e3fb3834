//! Reciprocal Rank Fusion
//!
//! Combines the vector and lexical candidate lists. Each document
//! appearing at 1-indexed rank r in either list contributes
//! `1 / (k + r)` to its fused score; documents found by both paths
//! accumulate both contributions. RRF normalizes across the two scoring
//! scales without tuning.

use std::collections::HashMap;

use serde_json::Value;

// ============================================================================
// TYPES
// ============================================================================

/// Fusion constant. 60 dampens the effect of high ranks.
pub const RRF_K: f32 = 60.0;

/// A document in rank order from one retrieval path
#[derive(Debug, Clone)]
pub struct RankedDoc {
    pub id: String,
    pub text: String,
    pub metadata: Value,
}

/// A fused candidate with its per-path rank bookkeeping
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub id: String,
    pub text: String,
    pub metadata: Value,
    pub rrf_score: f32,
    /// 1-indexed rank in the vector list, if present there
    pub vector_rank: Option<usize>,
    /// 1-indexed rank in the lexical list, if present there
    pub bm25_rank: Option<usize>,
}

// ============================================================================
// FUSION
// ============================================================================

/// Fuse the two candidate lists, sorted by RRF score descending with
/// ties broken toward the lower ID.
pub fn reciprocal_rank_fusion(
    vector_results: Vec<RankedDoc>,
    lexical_results: Vec<RankedDoc>,
    k: f32,
) -> Vec<FusedCandidate> {
    let mut fused: HashMap<String, FusedCandidate> = HashMap::new();

    for (rank0, doc) in vector_results.into_iter().enumerate() {
        let rank = rank0 + 1;
        let entry = fused.entry(doc.id.clone()).or_insert(FusedCandidate {
            id: doc.id,
            text: doc.text,
            metadata: doc.metadata,
            rrf_score: 0.0,
            vector_rank: None,
            bm25_rank: None,
        });
        entry.rrf_score += 1.0 / (k + rank as f32);
        entry.vector_rank = Some(rank);
    }

    for (rank0, doc) in lexical_results.into_iter().enumerate() {
        let rank = rank0 + 1;
        let entry = fused.entry(doc.id.clone()).or_insert(FusedCandidate {
            id: doc.id,
            text: doc.text,
            metadata: doc.metadata,
            rrf_score: 0.0,
            vector_rank: None,
            bm25_rank: None,
        });
        entry.rrf_score += 1.0 / (k + rank as f32);
        entry.bm25_rank = Some(rank);
    }

    let mut results: Vec<FusedCandidate> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.rrf_score
            .partial_cmp(&a.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ranked(id: &str) -> RankedDoc {
        RankedDoc {
            id: id.to_string(),
            text: format!("text for {}", id),
            metadata: json!({}),
        }
    }

    #[test]
    fn test_document_in_both_lists_wins() {
        let vector = vec![ranked("doc:1"), ranked("doc:2"), ranked("doc:3")];
        let lexical = vec![ranked("doc:2"), ranked("doc:1"), ranked("doc:4")];

        let fused = reciprocal_rank_fusion(vector, lexical, RRF_K);

        // doc:1 and doc:2 appear in both lists, ahead of single-path docs
        assert!(fused[0].id == "doc:1" || fused[0].id == "doc:2");
        assert!(fused[1].id == "doc:1" || fused[1].id == "doc:2");

        for window in fused.windows(2) {
            assert!(window[0].rrf_score >= window[1].rrf_score);
        }
    }

    #[test]
    fn test_rrf_score_formula() {
        let fused = reciprocal_rank_fusion(vec![ranked("doc:1")], vec![ranked("doc:1")], 60.0);
        assert_eq!(fused.len(), 1);
        let expected = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((fused[0].rrf_score - expected).abs() < 1e-6);
        assert_eq!(fused[0].vector_rank, Some(1));
        assert_eq!(fused[0].bm25_rank, Some(1));
    }

    #[test]
    fn test_single_path_candidate_keeps_one_rank() {
        let fused = reciprocal_rank_fusion(vec![], vec![ranked("doc:9")], RRF_K);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].vector_rank, None);
        assert_eq!(fused[0].bm25_rank, Some(1));
    }

    #[test]
    fn test_equal_scores_tie_break_on_id() {
        let fused = reciprocal_rank_fusion(vec![ranked("doc:b")], vec![ranked("doc:a")], RRF_K);
        // Same 1/(k+1) contribution each: lower id first
        assert_eq!(fused[0].id, "doc:a");
        assert_eq!(fused[1].id, "doc:b");
    }
}
