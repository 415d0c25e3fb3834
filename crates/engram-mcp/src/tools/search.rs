//! Search Tool

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::document::meta_str;
use engram_core::{DocumentType, EngramError, Result, SearchPreset, SearchRequest};

use crate::server::ServiceContext;

use super::parse_args;

pub fn search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Natural language search query"
            },
            "repository": {
                "type": "string",
                "description": "Repository identifier for filtering"
            },
            "branch": {
                "type": "string",
                "description": "Branch filter; defaults to the detected branch. Navigation/usage documents are branch-filtered, memory is not."
            },
            "min_score": {
                "type": "number",
                "description": "Minimum relevance score (0-1, overrides config)",
                "minimum": 0.0,
                "maximum": 1.0
            },
            "initiative": {
                "type": "string",
                "description": "Initiative ID or name to filter results"
            },
            "include_completed": {
                "type": "boolean",
                "description": "Include completed initiatives (default: true)",
                "default": true
            },
            "types": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Filter by document types, e.g. ['note', 'insight']"
            },
            "preset": {
                "type": "string",
                "description": "Type preset; overrides types. One of: understanding, navigation, structure, trace, memory"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct SearchArgs {
    query: String,
    repository: Option<String>,
    branch: Option<String>,
    min_score: Option<f32>,
    initiative: Option<String>,
    #[serde(default = "default_true")]
    include_completed: bool,
    types: Option<Vec<String>>,
    preset: Option<String>,
}

fn default_true() -> bool {
    true
}

pub fn execute_search(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: SearchArgs = parse_args(arguments)?;

    let types = args
        .types
        .map(|names| {
            names
                .iter()
                .map(|name| {
                    DocumentType::parse_name(name).ok_or_else(|| {
                        EngramError::InvalidArgument(format!("unknown document type: {}", name))
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;
    let preset = args
        .preset
        .map(|name| {
            SearchPreset::parse_name(&name)
                .ok_or_else(|| EngramError::InvalidArgument(format!("unknown preset: {}", name)))
        })
        .transpose()?;

    let request = SearchRequest {
        query: args.query,
        repository: args.repository,
        branch: args.branch,
        min_score: args.min_score,
        types,
        preset,
        initiative: args.initiative,
        include_completed: args.include_completed,
        rebuild_index: false,
    };

    let verbose = ctx
        .config
        .read()
        .map(|c| c.verbose)
        .unwrap_or(false);
    let response = ctx.engine.search(request, ctx.workspace_root.as_deref())?;

    let results: Vec<Value> = response
        .results
        .iter()
        .map(|result| {
            let mut item = json!({
                "id": result.id,
                "content": result.text,
                "type": meta_str(&result.metadata, "type").unwrap_or("unknown"),
                "repository": meta_str(&result.metadata, "repository").unwrap_or("unknown"),
                "branch": meta_str(&result.metadata, "branch").unwrap_or("unknown"),
                "score": round4(result.boosted_score),
            });
            if let Some(file_path) = meta_str(&result.metadata, "file_path") {
                item["file_path"] = json!(file_path);
            }
            if let Some(title) = meta_str(&result.metadata, "title").filter(|t| !t.is_empty()) {
                item["title"] = json!(title);
            }
            if verbose {
                item["rrf_score"] = json!(result.rrf_score);
                item["rerank_score"] = json!(round4(result.rerank_score));
                item["recency_boost"] = json!(round4(result.recency_boost));
                item["vector_rank"] = json!(result.vector_rank);
                item["bm25_rank"] = json!(result.bm25_rank);
            }
            item
        })
        .collect();

    let mut output = json!({
        "query": response.query,
        "results": results,
        "total_candidates": response.total_candidates,
        "returned": response.results.len(),
    });
    if let Some(message) = response.message {
        output["message"] = json!(message);
    }
    if let Some(skeleton) = response.skeleton {
        output["project_skeleton"] = serde_json::to_value(skeleton)?;
    }
    if let Some(context) = response.project_context {
        output["project_context"] = serde_json::to_value(context)?;
    }
    if verbose {
        output["branch_context"] = json!(response.branch_context);
    }
    Ok(output)
}

fn round4(value: f32) -> f64 {
    (value as f64 * 10_000.0).round() / 10_000.0
}

// ============================================================================
// TESTS
// ============================================================================
