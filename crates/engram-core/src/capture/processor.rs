//! Session Processing
//!
//! Per-job flow: parse the transcript, extract changed files, truncate,
//! summarize via the LLM provider, and persist a `session_summary`
//! tagged with the repository's focused initiative. Failures log and
//! drop the job; memory documents require real summaries, so there is
//! no placeholder write.

use serde_json::json;

use crate::document::meta_str;
use crate::error::Result;
use crate::llm::LlmProvider;
use crate::memory::{MemoryStore, SaveOptions};
use crate::store::{Collection, DocumentEntry, WhereFilter};

use super::transcript::ParsedTranscript;

/// Transcript text cap fed to the summarizer
pub const MAX_TRANSCRIPT_CHARS: usize = 100_000;

// ============================================================================
// RESULT
// ============================================================================

/// Outcome of processing one session
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub success: bool,
    pub session_id: String,
    pub summary: Option<String>,
    pub error: Option<String>,
}

impl ProcessingResult {
    fn ok(session_id: &str, summary: String) -> Self {
        Self {
            success: true,
            session_id: session_id.to_string(),
            summary: Some(summary),
            error: None,
        }
    }

    fn skipped(session_id: &str, reason: &str) -> Self {
        Self {
            success: true,
            session_id: session_id.to_string(),
            summary: None,
            error: Some(reason.to_string()),
        }
    }

    fn failed(session_id: &str, error: String) -> Self {
        Self {
            success: false,
            session_id: session_id.to_string(),
            summary: None,
            error: Some(error),
        }
    }
}

// ============================================================================
// PROCESSING
// ============================================================================

/// Whether a session summary for this session ID is already persisted
pub fn session_already_captured(collection: &Collection, session_id: &str) -> Result<bool> {
    let filter = WhereFilter::And(vec![
        WhereFilter::eq("type", "session_summary"),
        WhereFilter::eq("session_id", session_id),
    ]);
    Ok(!collection.get_where(Some(&filter))?.is_empty())
}

/// Summarize one session and persist it
pub fn process_session(
    memory: &MemoryStore,
    provider: &dyn LlmProvider,
    transcript: &ParsedTranscript,
    repository: &str,
) -> ProcessingResult {
    let session_id = transcript.session_id.clone();

    let text = transcript.to_text(MAX_TRANSCRIPT_CHARS);
    if text.trim().is_empty() {
        tracing::debug!(session = %session_id, "empty transcript");
        return ProcessingResult::skipped(&session_id, "empty_transcript");
    }

    let summary = match provider.summarize_session(&text) {
        Ok(summary) if !summary.trim().is_empty() => summary,
        Ok(_) => {
            return ProcessingResult::failed(&session_id, "summarization returned empty result".to_string())
        }
        Err(e) => {
            tracing::error!(session = %session_id, "summarization failed: {}", e);
            return ProcessingResult::failed(&session_id, format!("summarization failed: {}", e));
        }
    };

    let files = transcript.files_edited();
    let saved = match memory.save_session_summary(
        &summary,
        &files,
        SaveOptions {
            repository: Some(repository),
            ..Default::default()
        },
    ) {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!(session = %session_id, "failed to save session summary: {}", e);
            return ProcessingResult::failed(&session_id, format!("save failed: {}", e));
        }
    };

    // Stamp the source session onto the document so future captures of
    // the same session dedup against the store, not just the queue.
    if let Some(doc_id) = saved["session_id"].as_str() {
        if let Err(e) = stamp_session_id(memory.collection(), doc_id, &session_id) {
            tracing::warn!("could not stamp session id: {}", e);
        }
    }

    tracing::info!(session = %session_id, repository, "session captured");
    ProcessingResult::ok(&session_id, summary)
}

fn stamp_session_id(collection: &Collection, doc_id: &str, session_id: &str) -> Result<()> {
    let Some(doc) = collection.get_by_ids(&[doc_id.to_string()])?.into_iter().next() else {
        return Ok(());
    };
    let mut metadata = doc.metadata;
    if let Some(obj) = metadata.as_object_mut() {
        obj.insert("session_id".to_string(), json!(session_id));
    }
    collection.upsert(vec![DocumentEntry::new(doc.id, doc.text, metadata)])?;
    Ok(())
}

/// Repository hint from the transcript's working directory, when the
/// job didn't carry one
pub fn repository_from_transcript(transcript: &ParsedTranscript) -> Option<String> {
    transcript
        .project_path
        .as_ref()
        .and_then(|p| std::path::Path::new(p).file_name())
        .map(|n| n.to_string_lossy().to_string())
}

/// Check persisted-store dedup from document metadata (test helper and
/// worker guard)
pub fn summary_session_id(meta: &serde_json::Value) -> Option<&str> {
    meta_str(meta, "session_id")
}

// ============================================================================
// TESTS
// ============================================================================
