//! Orientation and Version Tools

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::{orient, Result};

use crate::server::ServiceContext;

use super::parse_args;

pub fn orient_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_path": {
                "type": "string",
                "description": "Absolute path to the project repository"
            }
        },
        "required": ["project_path"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct OrientArgs {
    project_path: PathBuf,
}

pub fn execute_orient(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: OrientArgs = parse_args(arguments)?;
    orient::orient_session(&ctx.collection, &args.project_path)
}

pub fn version_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "expected_commit": {
                "type": "string",
                "description": "Commit hash to compare against; adds a needs_rebuild flag"
            }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct VersionArgs {
    expected_commit: Option<String>,
}

pub fn execute_version(_ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: VersionArgs = parse_args(arguments)?;
    Ok(orient::version_info(args.expected_commit.as_deref()))
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
    fn test_orient_reports_unindexed() {
        let (_dir, ctx) = test_context();
        let project = TempDir::new().unwrap();
        let result = execute_orient(&ctx, json!({"project_path": project.path()})).unwrap();
        assert_eq!(result["indexed"], false);
    }

    #[test]
    fn test_version() {
        let (_dir, ctx) = test_context();
        let result = execute_version(&ctx, json!({})).unwrap();
        assert!(result["version"].is_string());
    }
}
