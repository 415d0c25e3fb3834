//! Score Shaping
//!
//! Post-rerank stages, applied in a fixed order: type multiplier →
//! recency boost → initiative affinity → threshold. Each stage re-sorts
//! descending with ties broken toward the lower ID, so results are
//! deterministic given identical inputs and state.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::document::{meta_str, meta_type};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Floor for the recency boost: old notes decay to half weight, never
/// to zero
pub const MIN_RECENCY_BOOST: f32 = 0.5;

/// Gentle amplification for documents tagged with the in-scope
/// initiative
pub const INITIATIVE_AFFINITY: f32 = 1.1;

// ============================================================================
// SCORED RESULT
// ============================================================================

/// A candidate flowing through the shaping stages
#[derive(Debug, Clone)]
pub struct ScoredResult {
    pub id: String,
    pub text: String,
    pub metadata: Value,
    pub rrf_score: f32,
    pub vector_rank: Option<usize>,
    pub bm25_rank: Option<usize>,
    /// Cross-encoder relevance in [0, 1]
    pub rerank_score: f32,
    /// Running score: rerank_score after each shaping stage
    pub boosted_score: f32,
    /// Recency factor applied (1.0 for non-boosted types)
    pub recency_boost: f32,
}

/// Sort descending by running score, ties toward the lower ID
pub fn sort_results(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| {
        b.boosted_score
            .partial_cmp(&a.boosted_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ============================================================================
// SHAPING STAGES
// ============================================================================

/// Multiply each result's score by its type multiplier
pub fn apply_type_multipliers(results: &mut Vec<ScoredResult>) {
    for result in results.iter_mut() {
        let multiplier = meta_type(&result.metadata)
            .map(|t| t.multiplier())
            .unwrap_or(1.0);
        result.boosted_score *= multiplier;
    }
    sort_results(results);
}

/// Half-life decay toward [`MIN_RECENCY_BOOST`] for notes and session
/// summaries; other types pass through with boost 1.0.
pub fn apply_recency_boost(results: &mut Vec<ScoredResult>, half_life_days: f64, now: DateTime<Utc>) {
    for result in results.iter_mut() {
        let boosted_type = meta_type(&result.metadata)
            .map(|t| t.is_recency_boosted())
            .unwrap_or(false);
        if !boosted_type {
            result.recency_boost = 1.0;
            continue;
        }

        let age_days = meta_str(&result.metadata, "created_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|created| (now - created.with_timezone(&Utc)).num_seconds() as f64 / 86_400.0)
            .unwrap_or(0.0)
            .max(0.0);

        let decay = 0.5f64.powf(age_days / half_life_days) as f32;
        result.recency_boost = decay.max(MIN_RECENCY_BOOST);
        result.boosted_score *= result.recency_boost;
    }
    sort_results(results);
}

/// Amplify documents tagged with the in-scope initiative
pub fn apply_initiative_affinity(results: &mut Vec<ScoredResult>, initiative_id: &str) {
    for result in results.iter_mut() {
        if meta_str(&result.metadata, "initiative_id") == Some(initiative_id) {
            result.boosted_score *= INITIATIVE_AFFINITY;
        }
    }
    sort_results(results);
}

/// Drop results whose final score falls below the threshold
pub fn apply_threshold(results: Vec<ScoredResult>, min_score: f32) -> Vec<ScoredResult> {
    results
        .into_iter()
        .filter(|r| r.boosted_score >= min_score)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(id: &str, meta: Value, score: f32) -> ScoredResult {
        ScoredResult {
            id: id.to_string(),
            text: String::new(),
            metadata: meta,
            rrf_score: 0.0,
            vector_rank: None,
            bm25_rank: None,
            rerank_score: score,
            boosted_score: score,
            recency_boost: 1.0,
        }
    }

    #[test]
    fn test_type_multiplier_reorders() {
        let mut results = vec![
            result("dep:1", json!({"type": "dependency"}), 0.6),
            result("insight:1", json!({"type": "insight"}), 0.5),
        ];
        apply_type_multipliers(&mut results);
        // 0.5 * 2.0 = 1.0 beats 0.6 * 1.0
        assert_eq!(results[0].id, "insight:1");
        assert!((results[0].boosted_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_recency_newer_note_wins() {
        let now = Utc::now();
        let fresh = (now - chrono::Duration::hours(1)).to_rfc3339();
        let old = (now - chrono::Duration::days(60)).to_rfc3339();

        let mut results = vec![
            result("note:old", json!({"type": "note", "created_at": old}), 0.8),
            result("note:new", json!({"type": "note", "created_at": fresh}), 0.8),
        ];
        apply_recency_boost(&mut results, 30.0, now);

        assert_eq!(results[0].id, "note:new");
        // 60 days at 30d half-life decays to 0.25, clamped up to the 0.5 floor
        let old_result = results.iter().find(|r| r.id == "note:old").unwrap();
        assert!((old_result.recency_boost - MIN_RECENCY_BOOST).abs() < 1e-3);
        assert!((old_result.boosted_score - 0.4).abs() < 1e-2);
        let new_result = results.iter().find(|r| r.id == "note:new").unwrap();
        assert!((new_result.boosted_score - 0.8).abs() < 1e-2);
    }

    #[test]
    fn test_recency_skips_non_boosted_types() {
        let now = Utc::now();
        let old = (now - chrono::Duration::days(300)).to_rfc3339();
        let mut results = vec![result(
            "insight:1",
            json!({"type": "insight", "created_at": old}),
            0.8,
        )];
        apply_recency_boost(&mut results, 30.0, now);
        assert_eq!(results[0].recency_boost, 1.0);
        assert!((results[0].boosted_score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_initiative_affinity() {
        let mut results = vec![
            result("note:a", json!({"type": "note"}), 0.7),
            result(
                "note:b",
                json!({"type": "note", "initiative_id": "initiative:x"}),
                0.7,
            ),
        ];
        apply_initiative_affinity(&mut results, "initiative:x");
        assert_eq!(results[0].id, "note:b");
    }

    #[test]
    fn test_threshold_filters() {
        let results = vec![
            result("a", json!({"type": "note"}), 0.9),
            result("b", json!({"type": "note"}), 0.2),
        ];
        let kept = apply_threshold(results, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");
    }

    #[test]
    fn test_sort_tie_breaks_on_id() {
        let mut results = vec![
            result("b", json!({"type": "note"}), 0.5),
            result("a", json!({"type": "note"}), 0.5),
        ];
        sort_results(&mut results);
        assert_eq!(results[0].id, "a");
    }
}
