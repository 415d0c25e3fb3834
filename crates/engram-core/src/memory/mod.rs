//! Memory Documents
//!
//! Explicit save operations for the "brain" category: notes, insights,
//! session summaries, and the per-repo tech stack. Memory documents are
//! never auto-deleted; insights carry content hashes of their linked
//! files so staleness is detectable later.

mod save;
mod validate;

pub use save::SaveOptions;
pub use validate::{insight_is_stale, stale_insights};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::document::now_iso;
use crate::error::Result;
use crate::gitctx;
use crate::ingest::walker::compute_file_hash;
use crate::initiative::resolve_initiative_tag;
use crate::search::lexical::LexicalIndex;
use crate::store::{Collection, WhereFilter};

// ============================================================================
// STORE
// ============================================================================

/// Memory save/validate operations
pub struct MemoryStore {
    pub(crate) collection: Arc<Collection>,
    pub(crate) lexical: Arc<LexicalIndex>,
}

impl MemoryStore {
    pub fn new(collection: Arc<Collection>, lexical: Arc<LexicalIndex>) -> Self {
        Self { collection, lexical }
    }

    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }
}

// ============================================================================
// SAVE CONTEXT
// ============================================================================

/// Common context resolved once per save operation
pub(crate) struct SaveContext {
    pub repository: String,
    pub repo_path: Option<PathBuf>,
    pub branch: String,
    pub timestamp: String,
    pub commit: Option<String>,
    pub initiative_id: Option<String>,
    pub initiative_name: Option<String>,
}

/// Resolve the repository name: explicit → working tree basename → any
/// focused initiative's repository → "global"
pub(crate) fn resolve_repository(
    collection: &Collection,
    repository: Option<&str>,
    repo_path: Option<&Path>,
) -> Result<String> {
    if let Some(repository) = repository {
        return Ok(repository.to_string());
    }
    if let Some(path) = repo_path {
        if let Some(name) = path.file_name() {
            return Ok(name.to_string_lossy().to_string());
        }
    }
    // Fall back to whichever repository holds a focus
    let initiatives = collection.get_where(Some(&WhereFilter::eq("type", "initiative")))?;
    for doc in initiatives {
        if let Some(repo) = crate::document::meta_str(&doc.metadata, "focused_repository") {
            if !repo.is_empty() {
                return Ok(repo.to_string());
            }
        }
    }
    Ok("global".to_string())
}

pub(crate) fn build_context(
    collection: &Collection,
    repository: Option<&str>,
    initiative: Option<&str>,
    repo_path: Option<&Path>,
) -> Result<SaveContext> {
    let repository = resolve_repository(collection, repository, repo_path)?;
    let branch = repo_path
        .map(gitctx::current_branch)
        .unwrap_or_else(|| crate::document::UNKNOWN_BRANCH.to_string());
    let commit = repo_path.and_then(gitctx::head_commit);
    let (initiative_id, initiative_name) =
        resolve_initiative_tag(collection, &repository, initiative)?;

    Ok(SaveContext {
        repository,
        repo_path: repo_path.map(Path::to_path_buf),
        branch,
        timestamp: now_iso(),
        commit,
        initiative_id,
        initiative_name,
    })
}

/// Content hashes for linked files, for staleness detection. Missing
/// files are skipped; relative paths resolve against the repo root.
pub(crate) fn compute_file_hashes(
    files: &[String],
    repo_path: Option<&Path>,
) -> std::collections::HashMap<String, String> {
    let mut hashes = std::collections::HashMap::new();
    for file in files {
        let mut full = PathBuf::from(file);
        if full.is_relative() {
            match repo_path {
                Some(root) => full = root.join(file),
                None => continue,
            }
        }
        if full.exists() {
            match compute_file_hash(&full) {
                Ok(hash) => {
                    hashes.insert(file.clone(), hash);
                }
                Err(e) => tracing::warn!("could not hash {}: {}", file, e),
            }
        }
    }
    hashes
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_repository_fallbacks() {
        let dir = TempDir::new().unwrap();
        let collection =
            Collection::open(dir.path().join("engram.db"), Arc::new(Embedder::new())).unwrap();

        assert_eq!(
            resolve_repository(&collection, Some("explicit"), None).unwrap(),
            "explicit"
        );
        let tree = TempDir::new().unwrap();
        let basename = tree.path().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(
            resolve_repository(&collection, None, Some(tree.path())).unwrap(),
            basename
        );
        assert_eq!(resolve_repository(&collection, None, None).unwrap(), "global");
    }

    #[test]
    fn test_compute_file_hashes_skips_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "content").unwrap();

        let hashes = compute_file_hashes(
            &["a.py".to_string(), "missing.py".to_string()],
            Some(dir.path()),
        );
        assert_eq!(hashes.len(), 1);
        assert!(hashes.contains_key("a.py"));
    }
}
