//! Memory Tools

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::{orient, EngramError, Result, SaveOptions, ValidationResult};

use crate::server::ServiceContext;

use super::parse_args;

fn save_options<'a>(
    ctx: &'a ServiceContext,
    title: Option<&'a str>,
    tags: Option<&'a [String]>,
    repository: Option<&'a str>,
    initiative: Option<&'a str>,
) -> SaveOptions<'a> {
    SaveOptions {
        title,
        tags,
        repository,
        initiative,
        repo_path: ctx.workspace_root.as_deref(),
    }
}

// ============================================================================
// SAVE NOTE
// ============================================================================

pub fn note_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "content": {"type": "string", "description": "Note content"},
            "title": {"type": "string", "description": "Optional title"},
            "tags": {"type": "array", "items": {"type": "string"}, "description": "Optional tags"},
            "repository": {"type": "string", "description": "Repository identifier"},
            "initiative": {
                "type": "string",
                "description": "Initiative ID or name to tag (uses the focused initiative if not specified)"
            }
        },
        "required": ["content"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct NoteArgs {
    content: String,
    title: Option<String>,
    tags: Option<Vec<String>>,
    repository: Option<String>,
    initiative: Option<String>,
}

pub fn execute_save_note(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: NoteArgs = parse_args(arguments)?;
    ctx.memory.save_note(
        &args.content,
        save_options(
            ctx,
            args.title.as_deref(),
            args.tags.as_deref(),
            args.repository.as_deref(),
            args.initiative.as_deref(),
        ),
    )
}

// ============================================================================
// SAVE INSIGHT
// ============================================================================

pub fn insight_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "insight": {"type": "string", "description": "The analysis/understanding to save"},
            "files": {
                "type": "array",
                "items": {"type": "string"},
                "description": "File paths this insight is about (REQUIRED, non-empty)"
            },
            "title": {"type": "string", "description": "Optional title"},
            "tags": {"type": "array", "items": {"type": "string"}, "description": "Optional tags"},
            "repository": {"type": "string", "description": "Repository identifier"},
            "initiative": {
                "type": "string",
                "description": "Initiative ID or name to tag (uses the focused initiative if not specified)"
            }
        },
        "required": ["insight", "files"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct InsightArgs {
    insight: String,
    files: Vec<String>,
    title: Option<String>,
    tags: Option<Vec<String>>,
    repository: Option<String>,
    initiative: Option<String>,
}

pub fn execute_save_insight(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: InsightArgs = parse_args(arguments)?;
    ctx.memory.save_insight(
        &args.insight,
        &args.files,
        save_options(
            ctx,
            args.title.as_deref(),
            args.tags.as_deref(),
            args.repository.as_deref(),
            args.initiative.as_deref(),
        ),
    )
}

// ============================================================================
// SAVE SESSION SUMMARY
// ============================================================================

pub fn session_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "description": "Detailed session summary: what changed and why, decisions made, problems solved, remaining work"
            },
            "changed_files": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Modified file paths; they are re-indexed after the save"
            },
            "repository": {"type": "string", "description": "Repository identifier"},
            "initiative": {
                "type": "string",
                "description": "Initiative ID or name to tag (uses the focused initiative if not specified)"
            }
        },
        "required": ["summary", "changed_files"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct SessionArgs {
    summary: String,
    changed_files: Vec<String>,
    repository: Option<String>,
    initiative: Option<String>,
}

pub fn execute_save_session(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: SessionArgs = parse_args(arguments)?;
    let mut response = ctx.memory.save_session_summary(
        &args.summary,
        &args.changed_files,
        save_options(
            ctx,
            None,
            None,
            args.repository.as_deref(),
            args.initiative.as_deref(),
        ),
    )?;

    if let Some(reindex) = ctx.reindex_changed_files(&args.changed_files) {
        response["reindex"] = reindex;
    }
    Ok(response)
}

// ============================================================================
// VALIDATE INSIGHT
// ============================================================================

pub fn validate_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "insight_id": {"type": "string", "description": "The insight ID to validate (e.g. 'insight:abc123')"},
            "validation_result": {
                "type": "string",
                "enum": ["still_valid", "partially_valid", "no_longer_valid"],
                "description": "Assessment after re-reading the linked files"
            },
            "notes": {"type": "string", "description": "What changed or why validation failed"},
            "deprecate": {
                "type": "boolean",
                "description": "With no_longer_valid, mark the insight deprecated",
                "default": false
            },
            "replacement_insight": {
                "type": "string",
                "description": "When deprecating, replacement content saved as a new insight"
            },
            "repository": {"type": "string", "description": "Repository identifier"}
        },
        "required": ["insight_id", "validation_result"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct ValidateArgs {
    insight_id: String,
    validation_result: String,
    notes: Option<String>,
    #[serde(default)]
    deprecate: bool,
    replacement_insight: Option<String>,
    #[allow(dead_code)]
    repository: Option<String>,
}

pub fn execute_validate(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: ValidateArgs = parse_args(arguments)?;
    let result = ValidationResult::parse_name(&args.validation_result).ok_or_else(|| {
        EngramError::InvalidArgument(format!(
            "unknown validation_result: {} (valid: still_valid, partially_valid, no_longer_valid)",
            args.validation_result
        ))
    })?;

    ctx.memory.validate_insight(
        &args.insight_id,
        result,
        args.notes.as_deref(),
        args.deprecate,
        args.replacement_insight.as_deref(),
        ctx.workspace_root.as_deref(),
    )
}

// ============================================================================
// TECH STACK / REPO CONTEXT / RECALL
// ============================================================================

pub fn tech_stack_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {"type": "string", "description": "Repository identifier"},
            "tech_stack": {
                "type": "string",
                "description": "Languages, frameworks, architecture patterns. Stable structural info only; avoid counts, versions, and dates that go stale."
            }
        },
        "required": ["repository", "tech_stack"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct TechStackArgs {
    repository: String,
    tech_stack: String,
}

pub fn execute_set_tech_stack(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: TechStackArgs = parse_args(arguments)?;
    ctx.memory.set_tech_stack(&args.repository, &args.tech_stack)
}

pub fn repo_context_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {"type": "string", "description": "Repository identifier"}
        },
        "required": ["repository"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct RepoContextArgs {
    repository: String,
}

pub fn execute_repo_context(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: RepoContextArgs = parse_args(arguments)?;
    orient::get_repo_context(&ctx.collection, &args.repository)
}

pub fn recall_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {"type": "string", "description": "Repository identifier"},
            "days": {"type": "integer", "description": "Days to look back (default: 7)", "default": 7},
            "limit": {"type": "integer", "description": "Maximum items (default: 20)", "default": 20},
            "include_code": {
                "type": "boolean",
                "description": "Include re-indexed code documents (default: false)",
                "default": false
            }
        },
        "required": ["repository"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct RecallArgs {
    repository: String,
    #[serde(default = "default_days")]
    days: i64,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    include_code: bool,
}

fn default_days() -> i64 {
    7
}

fn default_limit() -> usize {
    20
}

pub fn execute_recall(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: RecallArgs = parse_args(arguments)?;
    orient::recall_recent_work(
        &ctx.collection,
        &args.repository,
        args.days,
        args.limit,
        args.include_code,
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::NoProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_context() -> (TempDir, ServiceContext) {
        let dir = TempDir::new().unwrap();
        let ctx = ServiceContext::new(dir.path().to_path_buf(), None, Arc::new(NoProvider)).unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_insight_without_files_rejected() {
        let (_dir, ctx) = test_context();
        let err = execute_save_insight(&ctx, json!({"insight": "x", "files": []})).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_validate_rejects_unknown_result() {
        let (_dir, ctx) = test_context();
        let err = execute_validate(
            &ctx,
            json!({"insight_id": "insight:x", "validation_result": "maybe"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_save_validate_supersede_flow() {
        let (_dir, ctx) = test_context();
        let saved = execute_save_insight(
            &ctx,
            json!({
                "insight": "the retry loop is unbounded",
                "files": ["src/retry.rs"],
                "repository": "repo"
            }),
        )
        .unwrap();
        let insight_id = saved["insight_id"].as_str().unwrap();

        let validated = execute_validate(
            &ctx,
            json!({
                "insight_id": insight_id,
                "validation_result": "no_longer_valid",
                "deprecate": true,
                "replacement_insight": "retries are now capped at 5 attempts"
            }),
        )
        .unwrap();
        assert_eq!(validated["deprecated"], true);
        assert!(validated["replacement_id"].is_string());
    }

    #[test]
    fn test_tech_stack_and_context() {
        let (_dir, ctx) = test_context();
        execute_set_tech_stack(
            &ctx,
            json!({"repository": "repo", "tech_stack": "Rust workspace, SQLite, tokio daemon"}),
        )
        .unwrap();

        let context = execute_repo_context(&ctx, json!({"repository": "repo"})).unwrap();
        assert!(context["tech_stack"]["content"]
            .as_str()
            .unwrap()
            .contains("SQLite"));
    }
}
