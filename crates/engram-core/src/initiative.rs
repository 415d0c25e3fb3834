//! Initiative Management
//!
//! Initiatives are named multi-session workstreams. At most one
//! initiative is "focused" per repository; memory documents written
//! while a focus is held are tagged with it. Completion is soft: the
//! document stays searchable with `initiative_status = completed`.
//!
//! Memory documents point at initiatives via `initiative_id`;
//! initiatives never enumerate their memory. Resolution is by query.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::document::{memory_doc_id, meta_str, now_iso, DocumentType, UNKNOWN_BRANCH};
use crate::error::{EngramError, Result};
use crate::search::lexical::LexicalIndex;
use crate::store::{Collection, DocumentEntry, StoredDocument, WhereFilter};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Initiatives untouched this long are flagged stale
pub const STALE_THRESHOLD_DAYS: i64 = 14;

/// Completion language scanned for in session summaries
const COMPLETION_SIGNALS: &[&str] = &[
    "completed",
    "finished",
    "wrapped up",
    "shipped",
    "released",
    "done with",
    "closed out",
    "merged and deployed",
    "ready for release",
];

// ============================================================================
// LOOKUPS (shared with the search engine and memory tools)
// ============================================================================

/// Find an initiative by ID (`initiative:...`) or by name within a
/// repository. Name matching is case-insensitive.
pub fn find_initiative(
    collection: &Collection,
    repository: &str,
    id_or_name: &str,
) -> Result<Option<StoredDocument>> {
    if id_or_name.starts_with("initiative:") {
        return Ok(collection
            .get_by_ids(&[id_or_name.to_string()])?
            .into_iter()
            .next());
    }

    let filter = WhereFilter::And(vec![
        WhereFilter::eq("type", "initiative"),
        WhereFilter::eq("repository", repository),
    ]);
    let wanted = id_or_name.to_lowercase();
    Ok(collection
        .get_where(Some(&filter))?
        .into_iter()
        .find(|doc| {
            meta_str(&doc.metadata, "name")
                .map(|name| name.to_lowercase() == wanted)
                .unwrap_or(false)
        }))
}

/// The initiative currently focused by a repository, if any
pub fn focused_initiative(
    collection: &Collection,
    repository: &str,
) -> Result<Option<StoredDocument>> {
    let filter = WhereFilter::And(vec![
        WhereFilter::eq("type", "initiative"),
        WhereFilter::eq("focused_repository", repository),
    ]);
    Ok(collection.get_where(Some(&filter))?.into_iter().next())
}

/// Resolve the (id, name) pair to tag a new memory document with:
/// the explicit initiative when given, else the repository's focus.
pub fn resolve_initiative_tag(
    collection: &Collection,
    repository: &str,
    explicit: Option<&str>,
) -> Result<(Option<String>, Option<String>)> {
    let found = match explicit {
        Some(id_or_name) => find_initiative(collection, repository, id_or_name)?,
        None => focused_initiative(collection, repository)?,
    };
    Ok(match found {
        Some(doc) => {
            let name = meta_str(&doc.metadata, "name").unwrap_or("").to_string();
            (Some(doc.id), Some(name))
        }
        None => (None, None),
    })
}

/// Bump an initiative's `updated_at` after memory is tagged with it
pub fn touch_initiative(collection: &Collection, initiative_id: &str, timestamp: &str) -> Result<()> {
    let Some(doc) = collection
        .get_by_ids(&[initiative_id.to_string()])?
        .into_iter()
        .next()
    else {
        return Ok(());
    };
    let mut metadata = doc.metadata;
    if let Some(obj) = metadata.as_object_mut() {
        obj.insert("updated_at".to_string(), json!(timestamp));
    }
    collection.upsert(vec![DocumentEntry::new(doc.id, doc.text, metadata)])?;
    Ok(())
}

/// Whether a session summary reads like the workstream finished
pub fn detect_completion_signals(summary: &str) -> bool {
    let lower = summary.to_lowercase();
    COMPLETION_SIGNALS.iter().any(|signal| lower.contains(signal))
}

fn age_days(meta: &Value, field: &str) -> Option<i64> {
    meta_str(meta, field)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| (Utc::now() - t.with_timezone(&Utc)).num_days())
}

/// An active initiative untouched past the threshold is stale
pub fn is_stale(meta: &Value) -> bool {
    meta_str(meta, "initiative_status") != Some("completed")
        && age_days(meta, "updated_at")
            .map(|days| days >= STALE_THRESHOLD_DAYS)
            .unwrap_or(false)
}

// ============================================================================
// MANAGER
// ============================================================================

/// Initiative lifecycle operations
pub struct InitiativeManager {
    collection: Arc<Collection>,
    lexical: Arc<LexicalIndex>,
}

impl InitiativeManager {
    pub fn new(collection: Arc<Collection>, lexical: Arc<LexicalIndex>) -> Self {
        Self { collection, lexical }
    }

    /// Create an initiative, optionally focusing it immediately
    pub fn create(
        &self,
        repository: &str,
        name: &str,
        goal: Option<&str>,
        auto_focus: bool,
    ) -> Result<Value> {
        if name.trim().is_empty() {
            return Err(EngramError::InvalidArgument("initiative name must not be empty".to_string()));
        }
        if find_initiative(&self.collection, repository, name)?.is_some() {
            return Err(EngramError::Conflict(format!(
                "initiative '{}' already exists for {}",
                name, repository
            )));
        }

        let id = memory_doc_id(DocumentType::Initiative);
        let timestamp = now_iso();
        let goal_text = goal.unwrap_or("");
        let text = if goal_text.is_empty() {
            format!("Initiative: {}", name)
        } else {
            format!("Initiative: {}\n\nGoal: {}", name, goal_text)
        };

        self.collection.upsert(vec![DocumentEntry::new(
            id.clone(),
            text,
            json!({
                "type": "initiative",
                "repository": repository,
                "branch": UNKNOWN_BRANCH,
                "status": "active",
                "initiative_status": "active",
                "initiative_id": id,
                "name": name,
                "goal": goal_text,
                "focused_repository": "",
                "created_at": timestamp,
                "updated_at": timestamp,
            }),
        )])?;

        if auto_focus {
            self.focus(repository, &id)?;
        }
        self.lexical.mark_dirty();

        tracing::info!(initiative = %id, repository, "initiative created");
        Ok(json!({
            "status": "created",
            "initiative_id": id,
            "name": name,
            "focused": auto_focus,
        }))
    }

    /// Legacy upsert-by-name: create (and focus) if absent, else update
    /// the goal/status text
    pub fn set(&self, repository: &str, name: &str, status: Option<&str>) -> Result<Value> {
        match find_initiative(&self.collection, repository, name)? {
            Some(doc) => {
                let mut metadata = doc.metadata;
                if let Some(obj) = metadata.as_object_mut() {
                    if let Some(status) = status {
                        obj.insert("goal".to_string(), json!(status));
                    }
                    obj.insert("updated_at".to_string(), json!(now_iso()));
                }
                let id = doc.id.clone();
                self.collection
                    .upsert(vec![DocumentEntry::new(doc.id, doc.text, metadata)])?;
                self.lexical.mark_dirty();
                Ok(json!({"status": "updated", "initiative_id": id, "name": name}))
            }
            None => self.create(repository, name, status, true),
        }
    }

    /// List a repository's initiatives, optionally filtered by status
    /// (`all`, `active`, `completed`), newest first, with staleness flags
    pub fn list(&self, repository: &str, status_filter: &str) -> Result<Value> {
        if !matches!(status_filter, "all" | "active" | "completed") {
            return Err(EngramError::InvalidArgument(format!(
                "unknown status filter: {}",
                status_filter
            )));
        }

        let filter = WhereFilter::And(vec![
            WhereFilter::eq("type", "initiative"),
            WhereFilter::eq("repository", repository),
        ]);
        let mut docs = self.collection.get_where(Some(&filter))?;
        docs.sort_by(|a, b| {
            meta_str(&b.metadata, "updated_at")
                .unwrap_or("")
                .cmp(meta_str(&a.metadata, "updated_at").unwrap_or(""))
        });

        let items: Vec<Value> = docs
            .into_iter()
            .filter(|doc| {
                let completed = meta_str(&doc.metadata, "initiative_status") == Some("completed");
                match status_filter {
                    "active" => !completed,
                    "completed" => completed,
                    _ => true,
                }
            })
            .map(|doc| {
                json!({
                    "id": doc.id,
                    "name": meta_str(&doc.metadata, "name").unwrap_or(""),
                    "goal": meta_str(&doc.metadata, "goal").unwrap_or(""),
                    "status": meta_str(&doc.metadata, "initiative_status").unwrap_or("active"),
                    "focused": meta_str(&doc.metadata, "focused_repository") == Some(repository),
                    "stale": is_stale(&doc.metadata),
                    "created_at": meta_str(&doc.metadata, "created_at").unwrap_or(""),
                    "updated_at": meta_str(&doc.metadata, "updated_at").unwrap_or(""),
                    "completed_at": meta_str(&doc.metadata, "completed_at"),
                })
            })
            .collect();

        Ok(json!({"repository": repository, "total": items.len(), "initiatives": items}))
    }

    /// Focus an initiative for a repository. The swap is atomic from the
    /// caller's perspective: any previous focus held by this repository
    /// is cleared before the new one is set, under the store's write
    /// serialization.
    pub fn focus(&self, repository: &str, id_or_name: &str) -> Result<Value> {
        let target = find_initiative(&self.collection, repository, id_or_name)?
            .ok_or_else(|| EngramError::NotFound(format!("initiative: {}", id_or_name)))?;
        if meta_str(&target.metadata, "initiative_status") == Some("completed") {
            return Err(EngramError::PreconditionFailed(format!(
                "initiative {} is completed and cannot be focused",
                target.id
            )));
        }

        let mut updates = Vec::new();
        for doc in self.collection.get_where(Some(&WhereFilter::And(vec![
            WhereFilter::eq("type", "initiative"),
            WhereFilter::eq("focused_repository", repository),
        ])))? {
            if doc.id == target.id {
                continue;
            }
            let mut metadata = doc.metadata;
            if let Some(obj) = metadata.as_object_mut() {
                obj.insert("focused_repository".to_string(), json!(""));
            }
            updates.push(DocumentEntry::new(doc.id, doc.text, metadata));
        }

        let target_id = target.id.clone();
        let target_name = meta_str(&target.metadata, "name").unwrap_or("").to_string();
        let mut metadata = target.metadata;
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("focused_repository".to_string(), json!(repository));
            obj.insert("updated_at".to_string(), json!(now_iso()));
        }
        updates.push(DocumentEntry::new(target.id, target.text, metadata));
        self.collection.upsert(updates)?;
        self.lexical.mark_dirty();

        tracing::info!(initiative = %target_id, repository, "initiative focused");
        Ok(json!({
            "status": "focused",
            "initiative_id": target_id,
            "name": target_name,
            "repository": repository,
        }))
    }

    /// Complete an initiative with a summary. Soft: the document keeps
    /// its memory tags and stays searchable.
    pub fn complete(
        &self,
        id_or_name: &str,
        summary: &str,
        repository: Option<&str>,
    ) -> Result<Value> {
        let repo = repository.unwrap_or("global");
        let target = find_initiative(&self.collection, repo, id_or_name)?
            .ok_or_else(|| EngramError::NotFound(format!("initiative: {}", id_or_name)))?;

        let timestamp = now_iso();
        let target_id = target.id.clone();
        let name = meta_str(&target.metadata, "name").unwrap_or("").to_string();
        let mut metadata = target.metadata;
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("initiative_status".to_string(), json!("completed"));
            obj.insert("completed_at".to_string(), json!(timestamp));
            obj.insert("completion_summary".to_string(), json!(summary));
            obj.insert("focused_repository".to_string(), json!(""));
            obj.insert("updated_at".to_string(), json!(timestamp));
        }
        let text = format!("{}\n\nCompleted: {}", target.text, summary);
        self.collection
            .upsert(vec![DocumentEntry::new(target.id, text, metadata)])?;
        self.lexical.mark_dirty();

        tracing::info!(initiative = %target_id, "initiative completed");
        Ok(json!({
            "status": "completed",
            "initiative_id": target_id,
            "name": name,
            "completed_at": timestamp,
        }))
    }

    /// Deterministic timeline of an initiative's tagged memory: session
    /// summaries and notes grouped by day, plus current state.
    pub fn summarize(&self, id_or_name: &str, repository: Option<&str>) -> Result<Value> {
        let repo = repository.unwrap_or("global");
        let target = find_initiative(&self.collection, repo, id_or_name)?
            .ok_or_else(|| EngramError::NotFound(format!("initiative: {}", id_or_name)))?;

        let filter = WhereFilter::And(vec![
            WhereFilter::is_in("type", ["note", "session_summary", "insight"]),
            WhereFilter::eq("initiative_id", target.id.as_str()),
        ]);
        let mut docs = self.collection.get_where(Some(&filter))?;
        docs.sort_by(|a, b| {
            meta_str(&a.metadata, "created_at")
                .unwrap_or("")
                .cmp(meta_str(&b.metadata, "created_at").unwrap_or(""))
        });

        let mut by_day: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for doc in &docs {
            let day = meta_str(&doc.metadata, "created_at")
                .map(|t| t.chars().take(10).collect::<String>())
                .unwrap_or_else(|| "unknown".to_string());
            by_day.entry(day).or_default().push(json!({
                "id": doc.id,
                "type": meta_str(&doc.metadata, "type").unwrap_or(""),
                "excerpt": doc.text.chars().take(300).collect::<String>(),
            }));
        }

        let timeline: Vec<Value> = by_day
            .into_iter()
            .map(|(day, entries)| json!({"date": day, "entries": entries}))
            .collect();

        Ok(json!({
            "initiative_id": target.id,
            "name": meta_str(&target.metadata, "name").unwrap_or(""),
            "goal": meta_str(&target.metadata, "goal").unwrap_or(""),
            "status": meta_str(&target.metadata, "initiative_status").unwrap_or("active"),
            "completion_summary": meta_str(&target.metadata, "completion_summary"),
            "memory_count": docs.len(),
            "timeline": timeline,
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
