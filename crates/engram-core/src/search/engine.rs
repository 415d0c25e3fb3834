//! Hybrid Retrieval Pipeline
//!
//! The public search surface. In order: resolve branch context, build
//! the branch-aware metadata filter, retrieve candidates over both the
//! vector and lexical paths, fuse with RRF, rerank, shape scores (type
//! multiplier → recency → initiative affinity → threshold), then attach
//! the repository's skeleton and context as payload.

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::document::{
    branch_filtered_types, cross_branch_types, meta_str, skeleton_id, tech_stack_id, DocumentType,
    SearchPreset, UNKNOWN_BRANCH,
};
use crate::error::{lock_poisoned, EngramError, Result};
use crate::gitctx;
use crate::search::fusion::{reciprocal_rank_fusion, FusedCandidate, RankedDoc, RRF_K};
use crate::search::lexical::LexicalIndex;
use crate::search::reranker::Reranker;
use crate::search::scoring::{
    apply_initiative_affinity, apply_recency_boost, apply_threshold, apply_type_multipliers,
    ScoredResult,
};
use crate::store::{Collection, WhereFilter};

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// Maximum characters of document text returned per result
const RESULT_TEXT_LIMIT: usize = 2000;

/// Message returned when nothing matched
const NO_RESULTS_MESSAGE: &str =
    "No results found. Try ingesting a codebase first with the ingest operation.";

/// Search parameters
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub min_score: Option<f32>,
    /// Explicit type filter; ignored when `preset` is set
    pub types: Option<Vec<DocumentType>>,
    /// Preset type set; wins over `types`
    pub preset: Option<SearchPreset>,
    /// Initiative ID or name to filter by
    pub initiative: Option<String>,
    pub include_completed: bool,
    /// Force a lexical index rebuild before searching
    pub rebuild_index: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            repository: None,
            branch: None,
            min_score: None,
            types: None,
            preset: None,
            initiative: None,
            include_completed: true,
            rebuild_index: false,
        }
    }
}

impl SearchRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Skeleton payload attached to a response
#[derive(Debug, Clone, serde::Serialize)]
pub struct SkeletonAttachment {
    pub repository: String,
    pub branch: String,
    pub total_files: i64,
    pub total_dirs: i64,
    pub tree: String,
}

/// Repository context payload (tech stack + focused initiative)
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProjectContext {
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_stack: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiative: Option<Value>,
}

/// Ranked results plus attachments
#[derive(Debug)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredResult>,
    pub total_candidates: usize,
    pub branch_context: String,
    pub message: Option<String>,
    pub skeleton: Option<SkeletonAttachment>,
    pub project_context: Option<ProjectContext>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// The hybrid search engine; one per process, shared across handlers
pub struct SearchEngine {
    collection: Arc<Collection>,
    lexical: Arc<LexicalIndex>,
    reranker: Mutex<Reranker>,
    config: Arc<RwLock<RuntimeConfig>>,
}

impl SearchEngine {
    pub fn new(
        collection: Arc<Collection>,
        lexical: Arc<LexicalIndex>,
        reranker: Reranker,
        config: Arc<RwLock<RuntimeConfig>>,
    ) -> Self {
        Self {
            collection,
            lexical,
            reranker: Mutex::new(reranker),
            config,
        }
    }

    /// Run the full retrieval pipeline.
    ///
    /// `repo_path` anchors branch detection; pass the working tree the
    /// caller is operating in, when known.
    pub fn search(&self, request: SearchRequest, repo_path: Option<&Path>) -> Result<SearchResponse> {
        let config = self
            .config
            .read()
            .map_err(|_| lock_poisoned("runtime config"))?
            .clone();

        if !config.enabled {
            return Err(EngramError::Unavailable("engine is disabled".to_string()));
        }
        if request.query.trim().is_empty() {
            return Err(EngramError::InvalidArgument("query must not be empty".to_string()));
        }

        // 1. Branch context: explicit branch, else detect from the tree
        let current_branch = repo_path
            .map(gitctx::current_branch)
            .unwrap_or_else(|| UNKNOWN_BRANCH.to_string());
        let effective_branch = request.branch.clone().unwrap_or(current_branch);
        let mut branches = vec![effective_branch.clone()];
        if !matches!(effective_branch.as_str(), "main" | "master" | UNKNOWN_BRANCH) {
            branches.push("main".to_string());
        }

        if self.collection.count()? == 0 {
            return Ok(SearchResponse {
                query: request.query,
                results: vec![],
                total_candidates: 0,
                branch_context: effective_branch,
                message: Some(NO_RESULTS_MESSAGE.to_string()),
                skeleton: None,
                project_context: None,
            });
        }

        // 2. Resolve the initiative in scope: an explicit one filters,
        //    a focused one only boosts affinity.
        let explicit_initiative = match &request.initiative {
            Some(id_or_name) => {
                let repo = request.repository.as_deref().unwrap_or("global");
                let found =
                    crate::initiative::find_initiative(&self.collection, repo, id_or_name)?;
                Some(found.ok_or_else(|| {
                    EngramError::NotFound(format!("initiative: {}", id_or_name))
                })?)
            }
            None => None,
        };
        let affinity_initiative_id = match &explicit_initiative {
            Some(doc) => Some(doc.id.clone()),
            None => match &request.repository {
                Some(repo) => crate::initiative::focused_initiative(&self.collection, repo)?
                    .map(|doc| doc.id),
                None => None,
            },
        };

        // 3. Branch-aware filter
        let type_filter = request
            .preset
            .map(|p| p.types())
            .or_else(|| request.types.clone());
        let filter = build_where_filter(
            request.repository.as_deref(),
            &branches,
            type_filter,
            explicit_initiative.as_ref().map(|d| d.id.as_str()),
        );

        // 4. Candidate retrieval over both paths
        let top_k_retrieve = config.top_k_retrieve.clamp(10, 200);

        let vector_hits = self
            .collection
            .query(&request.query, top_k_retrieve, filter.as_ref())?;
        let vector_ranked: Vec<RankedDoc> = vector_hits
            .into_iter()
            .map(|hit| RankedDoc {
                id: hit.document.id,
                text: hit.document.text,
                metadata: hit.document.metadata,
            })
            .collect();

        let index = self
            .lexical
            .ensure_current(&self.collection, request.rebuild_index)?;
        let lexical_ranked: Vec<RankedDoc> = index
            .search(&request.query, top_k_retrieve)
            .into_iter()
            .filter(|hit| filter.as_ref().map(|f| f.matches(&hit.metadata)).unwrap_or(true))
            .map(|hit| RankedDoc {
                id: hit.id,
                text: hit.text,
                metadata: hit.metadata,
            })
            .collect();

        // 5. Reciprocal rank fusion
        let fused = reciprocal_rank_fusion(vector_ranked, lexical_ranked, RRF_K);
        let total_candidates = fused.len();
        tracing::debug!(
            query = %request.query,
            candidates = total_candidates,
            branches = ?branches,
            "hybrid retrieval complete"
        );

        if fused.is_empty() {
            return Ok(SearchResponse {
                query: request.query,
                results: vec![],
                total_candidates: 0,
                branch_context: effective_branch,
                message: Some(NO_RESULTS_MESSAGE.to_string()),
                skeleton: None,
                project_context: None,
            });
        }

        // 6. Rerank
        let top_k_rerank = config.top_k_rerank.clamp(1, 50);
        let pairs: Vec<(FusedCandidate, String)> = fused
            .into_iter()
            .map(|c| {
                let text = c.text.clone();
                (c, text)
            })
            .collect();
        let reranked = self
            .reranker
            .lock()
            .map_err(|_| lock_poisoned("reranker"))?
            .rerank(&request.query, pairs, Some(top_k_rerank));

        let mut results: Vec<ScoredResult> = reranked
            .into_iter()
            .map(|r| ScoredResult {
                id: r.item.id,
                text: r.item.text,
                metadata: r.item.metadata,
                rrf_score: r.item.rrf_score,
                vector_rank: r.item.vector_rank,
                bm25_rank: r.item.bm25_rank,
                rerank_score: r.score,
                boosted_score: r.score,
                recency_boost: 1.0,
            })
            .collect();

        // 7. Score shaping, fixed order
        apply_type_multipliers(&mut results);
        if config.recency_boost {
            apply_recency_boost(&mut results, config.recency_half_life_days, chrono::Utc::now());
        }
        if let Some(initiative_id) = &affinity_initiative_id {
            apply_initiative_affinity(&mut results, initiative_id);
        }

        let min_score = request
            .min_score
            .unwrap_or(config.min_score)
            .clamp(0.0, 1.0);
        let mut results = apply_threshold(results, min_score);

        if !request.include_completed {
            results.retain(|r| {
                !(meta_str(&r.metadata, "type") == Some("initiative")
                    && meta_str(&r.metadata, "initiative_status") == Some("completed"))
            });
        }

        for result in &mut results {
            if result.text.len() > RESULT_TEXT_LIMIT {
                let cut = result
                    .text
                    .char_indices()
                    .map(|(i, _)| i)
                    .take_while(|i| *i <= RESULT_TEXT_LIMIT)
                    .last()
                    .unwrap_or(0);
                result.text.truncate(cut);
            }
        }

        // 8. Attach repository payload
        let detected_repo = request.repository.clone().or_else(|| {
            results
                .first()
                .and_then(|r| meta_str(&r.metadata, "repository").map(str::to_string))
        });
        let (skeleton, project_context) = match detected_repo {
            Some(repo) if repo != "unknown" => (
                self.fetch_skeleton(&repo, &branches)?,
                self.fetch_project_context(&repo)?,
            ),
            _ => (None, None),
        };

        Ok(SearchResponse {
            query: request.query,
            results,
            total_candidates,
            branch_context: effective_branch,
            message: None,
            skeleton,
            project_context,
        })
    }

    /// Branch-matching skeleton, falling back to any skeleton for the
    /// repository
    fn fetch_skeleton(
        &self,
        repository: &str,
        branches: &[String],
    ) -> Result<Option<SkeletonAttachment>> {
        let mut doc = None;
        for branch in branches {
            if let Some(found) = self
                .collection
                .get_by_ids(&[skeleton_id(repository, branch)])?
                .into_iter()
                .next()
            {
                doc = Some(found);
                break;
            }
        }
        if doc.is_none() {
            let filter = WhereFilter::And(vec![
                WhereFilter::eq("type", "skeleton"),
                WhereFilter::eq("repository", repository),
            ]);
            doc = self.collection.get_where(Some(&filter))?.into_iter().next();
        }

        Ok(doc.map(|d| SkeletonAttachment {
            repository: repository.to_string(),
            branch: meta_str(&d.metadata, "branch").unwrap_or(UNKNOWN_BRANCH).to_string(),
            total_files: d.metadata.get("total_files").and_then(Value::as_i64).unwrap_or(0),
            total_dirs: d.metadata.get("total_dirs").and_then(Value::as_i64).unwrap_or(0),
            tree: d.text,
        }))
    }

    /// Tech stack and focused initiative for the repository
    fn fetch_project_context(&self, repository: &str) -> Result<Option<ProjectContext>> {
        let mut context = ProjectContext {
            repository: repository.to_string(),
            ..Default::default()
        };

        if let Some(tech) = self
            .collection
            .get_by_ids(&[tech_stack_id(repository)])?
            .into_iter()
            .next()
        {
            context.tech_stack = Some(serde_json::json!({
                "content": tech.text,
                "updated_at": meta_str(&tech.metadata, "updated_at").unwrap_or("unknown"),
            }));
        }

        if let Some(initiative) = crate::initiative::focused_initiative(&self.collection, repository)? {
            context.initiative = Some(serde_json::json!({
                "id": initiative.id,
                "name": meta_str(&initiative.metadata, "name").unwrap_or(""),
                "status": meta_str(&initiative.metadata, "initiative_status").unwrap_or("active"),
                "updated_at": meta_str(&initiative.metadata, "updated_at").unwrap_or("unknown"),
            }));
        }

        if context.tech_stack.is_none() && context.initiative.is_none() {
            return Ok(None);
        }
        Ok(Some(context))
    }
}

// ============================================================================
// FILTER CONSTRUCTION
// ============================================================================

/// Build the branch-aware where-filter:
/// `(type ∈ branch-filtered ∧ branch ∈ branches) ∨ (type ∈ cross-branch)`,
/// layered with repository, type, and initiative constraints.
/// A branch list containing the `unknown` sentinel disables branch
/// filtering entirely.
fn build_where_filter(
    repository: Option<&str>,
    branches: &[String],
    type_filter: Option<Vec<DocumentType>>,
    initiative_id: Option<&str>,
) -> Option<WhereFilter> {
    let mut clauses = Vec::new();

    if let Some(repo) = repository {
        clauses.push(WhereFilter::eq("repository", repo));
    }

    let branch_filtering = !branches.iter().any(|b| b == UNKNOWN_BRANCH);
    if branch_filtering {
        clauses.push(WhereFilter::Or(vec![
            WhereFilter::And(vec![
                WhereFilter::type_in(&branch_filtered_types()),
                WhereFilter::is_in("branch", branches.iter().cloned()),
            ]),
            WhereFilter::type_in(&cross_branch_types()),
        ]));
    }

    if let Some(types) = type_filter {
        clauses.push(WhereFilter::type_in(&types));
    }

    if let Some(id) = initiative_id {
        clauses.push(WhereFilter::eq("initiative_id", id));
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(WhereFilter::And(clauses)),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::store::DocumentEntry;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_engine() -> (TempDir, Arc<Collection>, SearchEngine) {
        let dir = TempDir::new().unwrap();
        let collection = Arc::new(
            Collection::open(dir.path().join("engram.db"), Arc::new(Embedder::new())).unwrap(),
        );
        let lexical = Arc::new(LexicalIndex::new());
        let config = Arc::new(RwLock::new(RuntimeConfig::default()));
        let engine = SearchEngine::new(
            Arc::clone(&collection),
            lexical,
            Reranker::default(),
            config,
        );
        (dir, collection, engine)
    }

    fn entry(id: &str, text: &str, meta: Value) -> DocumentEntry {
        DocumentEntry::new(id, text, meta)
    }

    #[test]
    fn test_empty_query_is_invalid() {
        let (_dir, _collection, engine) = test_engine();
        let err = engine.search(SearchRequest::query("   "), None).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_empty_collection_returns_message() {
        let (_dir, _collection, engine) = test_engine();
        let response = engine.search(SearchRequest::query("anything"), None).unwrap();
        assert!(response.results.is_empty());
        assert!(response.message.is_some());
    }

    #[test]
    fn test_search_finds_relevant_note() {
        let (_dir, collection, engine) = test_engine();
        collection
            .upsert(vec![
                entry(
                    "note:1",
                    "decided to retry failed uploads with exponential backoff",
                    json!({"type": "note", "repository": "api", "branch": "main",
                           "status": "active", "created_at": crate::document::now_iso()}),
                ),
                entry(
                    "note:2",
                    "color palette for the landing page hero section",
                    json!({"type": "note", "repository": "api", "branch": "main",
                           "status": "active", "created_at": crate::document::now_iso()}),
                ),
            ])
            .unwrap();

        let mut request = SearchRequest::query("retry uploads backoff");
        request.min_score = Some(0.0);
        request.rebuild_index = true;
        let response = engine.search(request, None).unwrap();
        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].id, "note:1");
    }

    #[test]
    fn test_branch_filter_hides_other_branch_code() {
        let (_dir, collection, engine) = test_engine();
        collection
            .upsert(vec![
                entry(
                    "file_metadata:aaa",
                    "auth session token refresh handler",
                    json!({"type": "file_metadata", "repository": "api", "branch": "feature-x",
                           "status": "active", "file_path": "src/auth.rs"}),
                ),
                entry(
                    "note:1",
                    "auth token refresh decided to use sliding expiry",
                    json!({"type": "note", "repository": "api", "branch": "feature-x",
                           "status": "active", "created_at": crate::document::now_iso()}),
                ),
            ])
            .unwrap();

        // Searching main: the branch-filtered file_metadata is invisible,
        // the cross-branch note is not.
        let mut request = SearchRequest::query("auth token refresh");
        request.branch = Some("main".to_string());
        request.min_score = Some(0.0);
        request.rebuild_index = true;
        let response = engine.search(request, None).unwrap();
        let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"note:1"));
        assert!(!ids.contains(&"file_metadata:aaa"));

        // Searching the feature branch sees both.
        let mut request = SearchRequest::query("auth token refresh");
        request.branch = Some("feature-x".to_string());
        request.min_score = Some(0.0);
        request.rebuild_index = true;
        let response = engine.search(request, None).unwrap();
        let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"file_metadata:aaa"));
    }

    #[test]
    fn test_unknown_branch_disables_branch_filter() {
        let (_dir, collection, engine) = test_engine();
        collection
            .upsert(vec![entry(
                "file_metadata:aaa",
                "payment ledger reconciliation",
                json!({"type": "file_metadata", "repository": "api", "branch": "old-branch",
                       "status": "active", "file_path": "src/ledger.rs"}),
            )])
            .unwrap();

        let mut request = SearchRequest::query("payment ledger reconciliation");
        request.branch = Some(UNKNOWN_BRANCH.to_string());
        request.min_score = Some(0.0);
        request.rebuild_index = true;
        let response = engine.search(request, None).unwrap();
        assert!(!response.results.is_empty());
    }

    #[test]
    fn test_preset_wins_over_types() {
        let (_dir, collection, engine) = test_engine();
        collection
            .upsert(vec![
                entry(
                    "note:1",
                    "observer pattern used for event dispatch",
                    json!({"type": "note", "repository": "api", "branch": "main",
                           "status": "active", "created_at": crate::document::now_iso()}),
                ),
                entry(
                    "file_metadata:bbb",
                    "observer event dispatch implementation",
                    json!({"type": "file_metadata", "repository": "api", "branch": "main",
                           "status": "active", "file_path": "src/events.rs"}),
                ),
            ])
            .unwrap();

        let mut request = SearchRequest::query("observer event dispatch");
        // types says navigation, preset says understanding: preset wins
        request.types = Some(vec![DocumentType::FileMetadata]);
        request.preset = Some(SearchPreset::Understanding);
        request.min_score = Some(0.0);
        request.rebuild_index = true;
        let response = engine.search(request, None).unwrap();
        assert!(!response.results.is_empty());
        for result in &response.results {
            assert_eq!(meta_str(&result.metadata, "type"), Some("note"));
        }
    }

    #[test]
    fn test_min_score_threshold_drops_weak_results() {
        let (_dir, collection, engine) = test_engine();
        collection
            .upsert(vec![entry(
                "note:1",
                "completely unrelated content about gardening",
                json!({"type": "note", "repository": "api", "branch": "main",
                       "status": "active", "created_at": crate::document::now_iso()}),
            )])
            .unwrap();

        let mut request = SearchRequest::query("kubernetes ingress timeout");
        request.min_score = Some(0.99);
        request.rebuild_index = true;
        let response = engine.search(request, None).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_skeleton_attached_for_detected_repository() {
        let (_dir, collection, engine) = test_engine();
        collection
            .upsert(vec![
                entry(
                    "api:skeleton:main",
                    "api/\n├── src/\n│   └── main.rs\n└── Cargo.toml",
                    json!({"type": "skeleton", "repository": "api", "branch": "main",
                           "status": "active", "total_files": 2, "total_dirs": 1}),
                ),
                entry(
                    "note:1",
                    "request routing lives in src/main.rs",
                    json!({"type": "note", "repository": "api", "branch": "main",
                           "status": "active", "created_at": crate::document::now_iso()}),
                ),
            ])
            .unwrap();

        let mut request = SearchRequest::query("request routing");
        request.min_score = Some(0.0);
        request.rebuild_index = true;
        let response = engine.search(request, None).unwrap();
        let skeleton = response.skeleton.expect("skeleton attached");
        assert_eq!(skeleton.total_files, 2);
        assert!(skeleton.tree.contains("main.rs"));
    }
}
