//! Insight Validation and Staleness
//!
//! Insights are anchored to files by content hash. Validation re-checks
//! an insight against current code: refreshing its hashes when still
//! valid, recording partial validity, or deprecating it with an
//! optional replacement (supersession).

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::document::{meta_str, meta_string_list, now_iso, ValidationResult};
use crate::error::{EngramError, Result};
use crate::gitctx;
use crate::store::{DocumentEntry, WhereFilter};

use super::{compute_file_hashes, save::SaveOptions, MemoryStore};

// ============================================================================
// VALIDATION
// ============================================================================

impl MemoryStore {
    /// Validate a stored insight after re-reading its linked files.
    ///
    /// - `still_valid` refreshes `file_hashes` and `validated_commit`
    /// - `partially_valid` records the result and notes
    /// - `no_longer_valid` with `deprecate` marks the insight
    ///   deprecated; a provided `replacement_insight` is saved as a new
    ///   insight and linked via `superseded_by`
    pub fn validate_insight(
        &self,
        insight_id: &str,
        result: ValidationResult,
        notes: Option<&str>,
        deprecate: bool,
        replacement_insight: Option<&str>,
        repo_path: Option<&Path>,
    ) -> Result<Value> {
        let doc = self
            .collection
            .get_by_ids(&[insight_id.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EngramError::NotFound(format!("insight: {}", insight_id)))?;

        let doc_type = meta_str(&doc.metadata, "type").unwrap_or("");
        if doc_type != "insight" {
            return Err(EngramError::PreconditionFailed(format!(
                "document {} is not an insight (type={})",
                insight_id, doc_type
            )));
        }

        let timestamp = now_iso();
        let mut metadata = doc.metadata.clone();
        let meta_object = metadata
            .as_object_mut()
            .ok_or_else(|| EngramError::Internal("metadata is not an object".to_string()))?;

        meta_object.insert("verified_at".to_string(), json!(timestamp));
        meta_object.insert("updated_at".to_string(), json!(timestamp));
        meta_object.insert("last_validation_result".to_string(), json!(result.as_str()));
        if let Some(notes) = notes {
            meta_object.insert("validation_notes".to_string(), json!(notes));
        }

        let mut response = json!({
            "status": "validated",
            "insight_id": insight_id,
            "validation_result": result.as_str(),
            "verified_at": timestamp,
        });

        match result {
            ValidationResult::StillValid => {
                let files = meta_string_list(&doc.metadata, "files");
                if !files.is_empty() {
                    let refreshed = compute_file_hashes(&files, repo_path);
                    if !refreshed.is_empty() {
                        meta_object.insert(
                            "file_hashes".to_string(),
                            json!(serde_json::to_string(&refreshed)?),
                        );
                        response["file_hashes_refreshed"] = json!(true);
                    }
                }
                if let Some(commit) = repo_path.and_then(gitctx::head_commit) {
                    meta_object.insert("validated_commit".to_string(), json!(commit));
                }
            }
            ValidationResult::PartiallyValid => {}
            ValidationResult::NoLongerValid if deprecate => {
                meta_object.insert("status".to_string(), json!("deprecated"));
                meta_object.insert("deprecated_at".to_string(), json!(timestamp));
                meta_object.insert(
                    "deprecation_reason".to_string(),
                    json!(notes.unwrap_or("Marked invalid during validation")),
                );
                response["deprecated"] = json!(true);

                if let Some(replacement) = replacement_insight {
                    // A prior supersession pointing elsewhere must not be
                    // silently overwritten.
                    if let Some(existing) = meta_str(&doc.metadata, "superseded_by") {
                        return Err(EngramError::Conflict(format!(
                            "insight {} is already superseded by {}",
                            insight_id, existing
                        )));
                    }

                    let files = meta_string_list(&doc.metadata, "files");
                    let tags = meta_string_list(&doc.metadata, "tags");
                    let title = meta_str(&doc.metadata, "title")
                        .filter(|t| !t.is_empty())
                        .map(|t| format!("{} (Updated)", t));
                    let repository = meta_str(&doc.metadata, "repository").map(str::to_string);

                    let saved = self.save_insight(
                        replacement,
                        &files,
                        SaveOptions {
                            title: title.as_deref(),
                            tags: Some(&tags),
                            repository: repository.as_deref(),
                            initiative: None,
                            repo_path,
                        },
                    )?;
                    let replacement_id = saved["insight_id"]
                        .as_str()
                        .ok_or_else(|| EngramError::Internal("replacement save returned no id".to_string()))?
                        .to_string();
                    meta_object.insert("superseded_by".to_string(), json!(replacement_id));
                    response["replacement_id"] = json!(replacement_id);
                    tracing::info!(old = %insight_id, new = %replacement_id, "insight superseded");
                }
            }
            ValidationResult::NoLongerValid => {}
        }

        self.collection
            .upsert(vec![DocumentEntry::new(doc.id, doc.text, metadata)])?;
        self.lexical.mark_dirty();

        tracing::info!(insight = %insight_id, result = result.as_str(), "insight validated");
        Ok(response)
    }
}

// ============================================================================
// STALENESS
// ============================================================================

/// An insight is stale when any linked file's current hash differs from
/// the hash stored at save time (a missing file counts as differing).
pub fn insight_is_stale(meta: &Value, repo_path: &Path) -> bool {
    let stored: HashMap<String, String> = meta_str(meta, "file_hashes")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    if stored.is_empty() {
        return false;
    }

    for (file, recorded_hash) in &stored {
        let mut full = std::path::PathBuf::from(file);
        if full.is_relative() {
            full = repo_path.join(file);
        }
        if !full.exists() {
            return true;
        }
        match crate::ingest::walker::compute_file_hash(&full) {
            Ok(current) => {
                if &current != recorded_hash {
                    return true;
                }
            }
            Err(_) => return true,
        }
    }
    false
}

/// Active insights for a repository whose anchored files have drifted
pub fn stale_insights(
    collection: &crate::store::Collection,
    repository: &str,
    repo_path: &Path,
) -> Result<Vec<Value>> {
    let filter = WhereFilter::And(vec![
        WhereFilter::eq("type", "insight"),
        WhereFilter::eq("repository", repository),
        WhereFilter::eq("status", "active"),
    ]);

    let mut stale = Vec::new();
    for doc in collection.get_where(Some(&filter))? {
        if insight_is_stale(&doc.metadata, repo_path) {
            stale.push(json!({
                "id": doc.id,
                "title": meta_str(&doc.metadata, "title").unwrap_or(""),
                "files": meta_string_list(&doc.metadata, "files"),
                "verified_at": meta_str(&doc.metadata, "verified_at").unwrap_or(""),
            }));
        }
    }
    Ok(stale)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::search::lexical::LexicalIndex;
    use crate::store::Collection;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, Arc<Collection>, MemoryStore) {
        let data = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        let collection = Arc::new(
            Collection::open(data.path().join("engram.db"), Arc::new(Embedder::new())).unwrap(),
        );
        let store = MemoryStore::new(Arc::clone(&collection), Arc::new(LexicalIndex::new()));
        (data, repo, collection, store)
    }

    fn save_sample_insight(store: &MemoryStore, repo: &Path) -> String {
        std::fs::write(repo.join("a.py"), "def f(): return 1").unwrap();
        let saved = store
            .save_insight(
                "a.py returns constants",
                &["a.py".to_string()],
                SaveOptions {
                    title: Some("Constants"),
                    repository: Some("repo"),
                    repo_path: Some(repo),
                    ..Default::default()
                },
            )
            .unwrap();
        saved["insight_id"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_still_valid_refreshes_hashes() {
        let (_data, repo, collection, store) = setup();
        let id = save_sample_insight(&store, repo.path());

        let before = collection.get_one(&id).unwrap();
        let hashes_before = meta_str(&before.metadata, "file_hashes").unwrap().to_string();
        let content_before = before.text.clone();

        std::fs::write(repo.path().join("a.py"), "def f(): return 2").unwrap();
        let response = store
            .validate_insight(
                &id,
                ValidationResult::StillValid,
                None,
                false,
                None,
                Some(repo.path()),
            )
            .unwrap();
        assert_eq!(response["file_hashes_refreshed"], true);

        let after = collection.get_one(&id).unwrap();
        assert_ne!(meta_str(&after.metadata, "file_hashes").unwrap(), hashes_before);
        // Validation never rewrites the insight content
        assert_eq!(after.text, content_before);
        assert_eq!(meta_str(&after.metadata, "status"), Some("active"));
    }

    #[test]
    fn test_deprecate_with_replacement_links_supersession() {
        let (_data, repo, collection, store) = setup();
        let id = save_sample_insight(&store, repo.path());
        std::fs::write(repo.path().join("a.py"), "def f(): return input()").unwrap();

        let response = store
            .validate_insight(
                &id,
                ValidationResult::NoLongerValid,
                Some("behavior changed"),
                true,
                Some("a.py now reads user input"),
                Some(repo.path()),
            )
            .unwrap();

        assert_eq!(response["deprecated"], true);
        let replacement_id = response["replacement_id"].as_str().unwrap();

        let old = collection.get_one(&id).unwrap();
        assert_eq!(meta_str(&old.metadata, "status"), Some("deprecated"));
        assert_eq!(meta_str(&old.metadata, "superseded_by"), Some(replacement_id));
        assert_eq!(meta_str(&old.metadata, "deprecation_reason"), Some("behavior changed"));

        let replacement = collection.get_one(replacement_id).unwrap();
        assert_eq!(meta_str(&replacement.metadata, "status"), Some("active"));
        assert_eq!(meta_str(&replacement.metadata, "title"), Some("Constants (Updated)"));
    }

    #[test]
    fn test_double_supersession_conflicts() {
        let (_data, repo, _collection, store) = setup();
        let id = save_sample_insight(&store, repo.path());

        store
            .validate_insight(
                &id,
                ValidationResult::NoLongerValid,
                None,
                true,
                Some("first replacement"),
                Some(repo.path()),
            )
            .unwrap();

        let err = store
            .validate_insight(
                &id,
                ValidationResult::NoLongerValid,
                None,
                true,
                Some("second replacement"),
                Some(repo.path()),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn test_validating_non_insight_fails_precondition() {
        let (_data, _repo, _collection, store) = setup();
        let note = store
            .save_note("just a note", SaveOptions { repository: Some("repo"), ..Default::default() })
            .unwrap();
        let err = store
            .validate_insight(
                note["note_id"].as_str().unwrap(),
                ValidationResult::StillValid,
                None,
                false,
                None,
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "precondition_failed");
    }

    #[test]
    fn test_unknown_insight_not_found() {
        let (_data, _repo, _collection, store) = setup();
        let err = store
            .validate_insight("insight:missing", ValidationResult::StillValid, None, false, None, None)
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_staleness_detection() {
        let (_data, repo, collection, store) = setup();
        let id = save_sample_insight(&store, repo.path());

        let doc = collection.get_one(&id).unwrap();
        assert!(!insight_is_stale(&doc.metadata, repo.path()));

        std::fs::write(repo.path().join("a.py"), "def f(): return 999").unwrap();
        assert!(insight_is_stale(&doc.metadata, repo.path()));

        let stale = stale_insights(&collection, "repo", repo.path()).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0]["id"], id.as_str());
    }
}
