//! Configuration Tool

use serde_json::{json, Map, Value};

use engram_core::{ConfigPatch, Result};

use crate::server::ServiceContext;

use super::parse_args;

pub fn configure_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "enabled": {"type": "boolean", "description": "Enable or disable the engine"},
            "min_score": {"type": "number", "description": "Minimum relevance score (clamped to [0, 1])"},
            "verbose": {"type": "boolean", "description": "Per-stage score diagnostics in search output"},
            "top_k_retrieve": {"type": "integer", "description": "Candidates per retrieval path (clamped to [10, 200])"},
            "top_k_rerank": {"type": "integer", "description": "Results kept after reranking (clamped to [1, 50])"},
            "llm_provider": {
                "type": "string",
                "description": "Summarization backend: anthropic, claude-cli, ollama, openrouter, or none"
            },
            "recency_boost": {"type": "boolean", "description": "Recency boost for notes and session summaries"},
            "recency_half_life_days": {"type": "number", "description": "Recency half-life (clamped to [1, 365])"},
            "autocapture_enabled": {"type": "boolean", "description": "Enable session capture"},
            "autocapture_async": {"type": "boolean", "description": "Async capture mode (hook returns immediately)"},
            "autocapture_sync_timeout": {"type": "integer", "description": "Sync-mode timeout in seconds (clamped to [10, 300])"},
            "autocapture_min_tokens": {"type": "integer", "description": "Significance threshold: tokens"},
            "autocapture_min_tool_calls": {"type": "integer", "description": "Significance threshold: tool calls"},
            "autocapture_min_file_edits": {"type": "integer", "description": "Significance threshold: file edits"}
        }
    })
}

pub fn execute_configure(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let patch: ConfigPatch = parse_args(arguments)?;
    let changed = ctx
        .config
        .write()
        .map_err(|_| engram_core::error::lock_poisoned("runtime config"))?
        .apply(patch)?;

    let mut fields = Map::new();
    for (field, value) in changed {
        fields.insert(field, value);
    }
    Ok(json!({"status": "ok", "changed": fields}))
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
    fn test_configure_echoes_clamped_values() {
        let (_dir, ctx) = test_context();
        let result = execute_configure(
            &ctx,
            json!({"top_k_retrieve": 9999, "min_score": 0.7}),
        )
        .unwrap();
        assert_eq!(result["changed"]["top_k_retrieve"], 200);
        assert_eq!(result["changed"]["min_score"], 0.7);

        assert_eq!(ctx.config.read().unwrap().top_k_retrieve, 200);
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let (_dir, ctx) = test_context();
        let err = execute_configure(&ctx, json!({"llm_provider": "skynet"})).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let (_dir, ctx) = test_context();
        let err = execute_configure(&ctx, json!({"not_a_knob": true})).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
