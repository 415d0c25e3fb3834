//! Ingestion State
//!
//! Per-(repo, branch) state file recording the last indexed commit and
//! the content hash of every indexed file. The next ingestion diffs
//! against this to select a delta strategy. Writes are atomic
//! (temp + rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::now_iso;
use crate::error::Result;

// ============================================================================
// STATE
// ============================================================================

/// Recorded outcome of the last ingestion for one (repo, branch)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestState {
    /// HEAD commit at the end of the last ingestion, when git was usable
    pub last_commit: Option<String>,
    /// Relative path → content hash for every file indexed last run
    pub file_hashes: HashMap<String, String>,
    /// When this state was written
    pub updated_at: String,
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Path of the state file for one (repo, branch)
pub fn state_path(data_dir: &Path, repository: &str, branch: &str) -> PathBuf {
    data_dir
        .join("ingest_state")
        .join(format!("{}__{}.json", sanitize(repository), sanitize(branch)))
}

/// Load recorded state; absent or unreadable state means a full ingest
pub fn load_state(data_dir: &Path, repository: &str, branch: &str) -> Option<IngestState> {
    let path = state_path(data_dir, repository, branch);
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!("unreadable ingest state, forcing full ingest: {}", e);
            None
        }
    }
}

/// Persist state atomically
pub fn save_state(
    data_dir: &Path,
    repository: &str,
    branch: &str,
    mut state: IngestState,
) -> Result<()> {
    let path = state_path(data_dir, repository, branch);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    state.updated_at = now_iso();

    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, serde_json::to_string_pretty(&state)?)?;
    std::fs::rename(&temp, &path)?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
