//! Session Capture Tools

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::Result;

use crate::server::ServiceContext;

use super::parse_args;

pub fn capture_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "session_id": {"type": "string", "description": "Unique session identifier"},
            "transcript_path": {
                "type": "string",
                "description": "Path to the session transcript (line-delimited JSON)"
            },
            "repository": {
                "type": "string",
                "description": "Repository identifier (derived from the transcript's cwd if omitted)"
            }
        },
        "required": ["session_id", "transcript_path"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct CaptureArgs {
    session_id: String,
    transcript_path: PathBuf,
    repository: Option<String>,
}

pub fn execute_capture(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: CaptureArgs = parse_args(arguments)?;
    ctx.capture
        .capture(&args.session_id, &args.transcript_path, args.repository.as_deref())
}

pub fn status_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct StatusArgs {}

pub fn execute_status(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let _args: StatusArgs = parse_args(arguments)?;
    ctx.capture.status()
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
    fn test_status_reports_thresholds() {
        let (_dir, ctx) = test_context();
        let status = execute_status(&ctx, json!({})).unwrap();
        assert_eq!(status["enabled"], true);
        assert_eq!(status["thresholds"]["min_tokens"], 5000);
        assert_eq!(status["provider"], "none");
    }

    #[test]
    fn test_capture_missing_transcript() {
        let (_dir, ctx) = test_context();
        let err = execute_capture(
            &ctx,
            json!({"session_id": "s1", "transcript_path": "/no/such/file.jsonl"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
