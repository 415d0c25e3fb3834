//! Ingestion Tools

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::{gitctx, orient, IngestOutcome, IngestRequest, Result};

use crate::server::ServiceContext;

use super::parse_args;

pub fn ingest_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Absolute path to the codebase root"
            },
            "repository": {
                "type": "string",
                "description": "Repository identifier (defaults to the directory name)"
            },
            "force_full": {
                "type": "boolean",
                "description": "Force full re-ingestion instead of delta sync",
                "default": false
            },
            "include_patterns": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Glob patterns for selective ingestion (OR semantics), e.g. ['src/**', 'tests/**']"
            },
            "use_ignore_files": {
                "type": "boolean",
                "description": "Load global and in-tree .engramignore files",
                "default": true
            }
        },
        "required": ["path"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct IngestArgs {
    path: PathBuf,
    repository: Option<String>,
    #[serde(default)]
    force_full: bool,
    include_patterns: Option<Vec<String>>,
    #[serde(default = "default_true")]
    use_ignore_files: bool,
}

fn default_true() -> bool {
    true
}

pub fn execute_ingest(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: IngestArgs = parse_args(arguments)?;
    let request = IngestRequest {
        path: args.path,
        repository: args.repository,
        force_full: args.force_full,
        include_patterns: args.include_patterns,
        use_ignore_files: args.use_ignore_files,
    };

    match ctx.ingestor.ingest(request)? {
        IngestOutcome::Completed(stats) => Ok(json!({
            "status": "completed",
            "stats": serde_json::to_value(stats)?,
        })),
        IngestOutcome::Queued { task_id, total_files } => Ok(json!({
            "status": "queued",
            "task_id": task_id,
            "total_files": total_files,
            "hint": "Poll with get_ingest_status",
        })),
    }
}

pub fn status_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "task_id": {
                "type": "string",
                "description": "Task ID returned by an async ingest"
            }
        },
        "required": ["task_id"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct StatusArgs {
    task_id: String,
}

pub fn execute_status(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: StatusArgs = parse_args(arguments)?;
    let status = ctx.ingestor.task_status(&args.task_id)?;
    let mut result = serde_json::to_value(status)?;
    result["task_id"] = json!(args.task_id);
    Ok(result)
}

pub fn skeleton_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {
                "type": "string",
                "description": "Repository name (defaults to the daemon's workspace)"
            }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct SkeletonArgs {
    repository: Option<String>,
}

pub fn execute_skeleton(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: SkeletonArgs = parse_args(arguments)?;
    let repository = args
        .repository
        .or_else(|| {
            ctx.workspace_root
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
        })
        .ok_or_else(|| {
            engram_core::EngramError::InvalidArgument(
                "repository is required when no workspace is configured".to_string(),
            )
        })?;

    let branch = ctx
        .workspace_root
        .as_deref()
        .map(gitctx::current_branch)
        .unwrap_or_else(|| engram_core::UNKNOWN_BRANCH.to_string());
    let skeleton = orient::fetch_skeleton(&ctx.collection, &repository, &branch)?;

    Ok(match skeleton {
        Some(skeleton) => json!({"repository": repository, "skeleton": skeleton}),
        None => json!({
            "repository": repository,
            "skeleton": null,
            "message": "No skeleton stored; run ingest first.",
        }),
    })
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
    fn test_ingest_then_skeleton() {
        let (_dir, ctx) = test_context();
        let repo = TempDir::new().unwrap();
        std::fs::write(repo.path().join("main.py"), "def main():\n    pass\n").unwrap();

        let result = execute_ingest(
            &ctx,
            json!({"path": repo.path(), "repository": "demo"}),
        )
        .unwrap();
        assert_eq!(result["status"], "completed");
        assert_eq!(result["stats"]["files_processed"], 1);

        let skeleton = execute_skeleton(&ctx, json!({"repository": "demo"})).unwrap();
        assert!(skeleton["skeleton"]["tree"]
            .as_str()
            .unwrap()
            .contains("main.py"));
    }

    #[test]
    fn test_missing_path_is_invalid() {
        let (_dir, ctx) = test_context();
        let err = execute_ingest(&ctx, json!({"path": "/no/such/dir"})).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_unknown_task_not_found() {
        let (_dir, ctx) = test_context();
        let err = execute_status(&ctx, json!({"task_id": "ingest:unknown"})).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
