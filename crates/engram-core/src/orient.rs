//! Session Orientation and Recall
//!
//! `orient_session` composes the session-start payload: indexed status,
//! skeleton, tech stack, focused initiative, and staleness probes over
//! the repository's insights. `recall_recent_work` answers "what did I
//! work on this week" as a day-grouped timeline without a search query.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use crate::document::{meta_str, skeleton_id, tech_stack_id, UNKNOWN_BRANCH};
use crate::error::{EngramError, Result};
use crate::gitctx;
use crate::initiative::{focused_initiative, is_stale as initiative_is_stale};
use crate::memory::stale_insights;
use crate::store::{Collection, WhereFilter};

// ============================================================================
// ORIENTATION
// ============================================================================

/// Compose the session-start payload for a project directory
pub fn orient_session(collection: &Collection, project_path: &Path) -> Result<Value> {
    if !project_path.is_dir() {
        return Err(EngramError::InvalidArgument(format!(
            "not a directory: {}",
            project_path.display()
        )));
    }
    let repository = project_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "global".to_string());
    let branch = gitctx::current_branch(project_path);

    // Indexed status: does navigation data exist for this repo?
    let indexed_docs = collection.get_where(Some(&WhereFilter::And(vec![
        WhereFilter::eq("type", "file_metadata"),
        WhereFilter::eq("repository", repository.as_str()),
    ])))?;
    let indexed = !indexed_docs.is_empty();

    let skeleton = fetch_skeleton(collection, &repository, &branch)?;
    let tech_stack = collection
        .get_by_ids(&[tech_stack_id(&repository)])?
        .into_iter()
        .next()
        .map(|doc| {
            json!({
                "content": doc.text,
                "updated_at": meta_str(&doc.metadata, "updated_at").unwrap_or("unknown"),
            })
        });

    let initiative = focused_initiative(collection, &repository)?.map(|doc| {
        json!({
            "id": doc.id,
            "name": meta_str(&doc.metadata, "name").unwrap_or(""),
            "goal": meta_str(&doc.metadata, "goal").unwrap_or(""),
            "stale": initiative_is_stale(&doc.metadata),
            "updated_at": meta_str(&doc.metadata, "updated_at").unwrap_or(""),
        })
    });

    let stale = stale_insights(collection, &repository, project_path)?;

    Ok(json!({
        "repository": repository,
        "branch": branch,
        "indexed": indexed,
        "indexed_documents": indexed_docs.len(),
        "skeleton": skeleton,
        "tech_stack": tech_stack,
        "initiative": initiative,
        "stale_insights": stale,
        "hint": if indexed {
            "Repository is indexed; search away."
        } else {
            "Repository is not indexed yet; run the ingest operation first."
        },
    }))
}

/// Stored skeleton for a repository, preferring the given branch
pub fn fetch_skeleton(
    collection: &Collection,
    repository: &str,
    branch: &str,
) -> Result<Option<Value>> {
    let mut doc = collection
        .get_by_ids(&[skeleton_id(repository, branch)])?
        .into_iter()
        .next();
    if doc.is_none() {
        doc = collection
            .get_where(Some(&WhereFilter::And(vec![
                WhereFilter::eq("type", "skeleton"),
                WhereFilter::eq("repository", repository),
            ])))?
            .into_iter()
            .next();
    }
    Ok(doc.map(|d| {
        json!({
            "branch": meta_str(&d.metadata, "branch").unwrap_or(UNKNOWN_BRANCH),
            "total_files": d.metadata.get("total_files").and_then(Value::as_i64).unwrap_or(0),
            "total_dirs": d.metadata.get("total_dirs").and_then(Value::as_i64).unwrap_or(0),
            "tree": d.text,
        })
    }))
}

/// Stored tech stack and initiative context for a repository
pub fn get_repo_context(collection: &Collection, repository: &str) -> Result<Value> {
    let tech_stack = collection
        .get_by_ids(&[tech_stack_id(repository)])?
        .into_iter()
        .next()
        .map(|doc| {
            json!({
                "content": doc.text,
                "updated_at": meta_str(&doc.metadata, "updated_at").unwrap_or("unknown"),
            })
        });
    let initiative = focused_initiative(collection, repository)?.map(|doc| {
        json!({
            "id": doc.id,
            "name": meta_str(&doc.metadata, "name").unwrap_or(""),
            "goal": meta_str(&doc.metadata, "goal").unwrap_or(""),
        })
    });

    Ok(json!({
        "repository": repository,
        "tech_stack": tech_stack,
        "initiative": initiative,
    }))
}

// ============================================================================
// RECALL
// ============================================================================

/// Day-grouped recent memory for a repository. `include_code` adds
/// recently re-indexed navigation documents to the timeline.
pub fn recall_recent_work(
    collection: &Collection,
    repository: &str,
    days: i64,
    limit: usize,
    include_code: bool,
) -> Result<Value> {
    let days = days.clamp(1, 365);
    let limit = limit.clamp(1, 200);
    let cutoff = Utc::now() - Duration::days(days);

    let types: Vec<&str> = if include_code {
        vec!["note", "session_summary", "file_metadata"]
    } else {
        vec!["note", "session_summary"]
    };
    let filter = WhereFilter::And(vec![
        WhereFilter::is_in("type", types),
        WhereFilter::eq("repository", repository),
    ]);

    let mut recent: Vec<(DateTime<Utc>, Value)> = Vec::new();
    for doc in collection.get_where(Some(&filter))? {
        let Some(created) = meta_str(&doc.metadata, "created_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
        else {
            continue;
        };
        if created < cutoff {
            continue;
        }
        recent.push((
            created,
            json!({
                "id": doc.id,
                "type": meta_str(&doc.metadata, "type").unwrap_or(""),
                "title": meta_str(&doc.metadata, "title").unwrap_or(""),
                "initiative": meta_str(&doc.metadata, "initiative_name").unwrap_or(""),
                "created_at": created.to_rfc3339(),
                "excerpt": doc.text.chars().take(240).collect::<String>(),
            }),
        ));
    }

    recent.sort_by(|a, b| b.0.cmp(&a.0));
    recent.truncate(limit);

    // Group newest-first by calendar day
    let mut timeline: Vec<Value> = Vec::new();
    let mut current_day = String::new();
    for (created, item) in recent.iter() {
        let day = created.format("%Y-%m-%d").to_string();
        if day != current_day {
            timeline.push(json!({"date": day, "entries": []}));
            current_day = day;
        }
        if let Some(entries) = timeline
            .last_mut()
            .and_then(|d| d["entries"].as_array_mut())
        {
            entries.push(item.clone());
        }
    }

    Ok(json!({
        "repository": repository,
        "days": days,
        "total": recent.len(),
        "timeline": timeline,
    }))
}

// ============================================================================
// VERSION
// ============================================================================

/// Build information, with a rebuild hint when the caller knows which
/// commit it expects the daemon to be built from
pub fn version_info(expected_commit: Option<&str>) -> Value {
    let build_commit = option_env!("ENGRAM_BUILD_COMMIT").unwrap_or("unknown");
    let mut info = json!({
        "version": crate::VERSION,
        "build_commit": build_commit,
    });
    if let Some(expected) = expected_commit {
        info["needs_rebuild"] =
            json!(build_commit != "unknown" && !expected.starts_with(build_commit) && expected != build_commit);
    }
    info
}

// ============================================================================
// TESTS
// ============================================================================
