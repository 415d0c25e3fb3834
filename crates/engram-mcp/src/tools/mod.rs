//! Tool Registry and Dispatch
//!
//! Each operation is a `{name, input_schema, handler}` triple. Dispatch
//! validates arguments against the handler's typed input record and
//! folds every failure into the uniform
//! `{status: "error", error, kind}` envelope; no error type crosses the
//! wire.

pub mod autocapture;
pub mod configure;
pub mod ingest;
pub mod initiatives;
pub mod memory;
pub mod orient;
pub mod search;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use engram_core::{EngramError, Result};

use crate::server::ServiceContext;

// ============================================================================
// REGISTRY
// ============================================================================

pub type Handler = fn(&ServiceContext, Value) -> Result<Value>;

/// One dispatchable operation
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: fn() -> Value,
    pub handler: Handler,
}

/// The full operation surface, in the order it is listed to clients
pub fn registry() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "orient_session",
            description: "Entry point for starting a session. Returns indexed status, skeleton, \
                          tech stack, focused initiative, and stale-insight probes.",
            input_schema: orient::orient_schema,
            handler: orient::execute_orient,
        },
        ToolDef {
            name: "search",
            description: "Hybrid search over code, navigation metadata, and memory. Lexical + \
                          semantic retrieval fused with RRF, reranked, and shaped by type and \
                          recency.",
            input_schema: search::search_schema,
            handler: search::execute_search,
        },
        ToolDef {
            name: "ingest",
            description: "Ingest a codebase directory. Delta-syncs against the last run; large \
                          deltas return a task_id for polling.",
            input_schema: ingest::ingest_schema,
            handler: ingest::execute_ingest,
        },
        ToolDef {
            name: "get_ingest_status",
            description: "Poll an async ingestion task by task_id.",
            input_schema: ingest::status_schema,
            handler: ingest::execute_status,
        },
        ToolDef {
            name: "get_skeleton",
            description: "Fetch the stored directory tree for a repository.",
            input_schema: ingest::skeleton_schema,
            handler: ingest::execute_skeleton,
        },
        ToolDef {
            name: "save_note",
            description: "Save a note, documentation snippet, or decision to memory.",
            input_schema: memory::note_schema,
            handler: memory::execute_save_note,
        },
        ToolDef {
            name: "save_insight",
            description: "Save analysis linked to specific files. Insights are anchored by \
                          content hash so staleness is detected when the files change.",
            input_schema: memory::insight_schema,
            handler: memory::execute_save_insight,
        },
        ToolDef {
            name: "save_session_summary",
            description: "Save an end-of-session summary and re-index the changed files.",
            input_schema: memory::session_schema,
            handler: memory::execute_save_session,
        },
        ToolDef {
            name: "validate_insight",
            description: "Validate a stored insight against current code; optionally deprecate \
                          it and save a replacement.",
            input_schema: memory::validate_schema,
            handler: memory::execute_validate,
        },
        ToolDef {
            name: "set_tech_stack",
            description: "Set the stable tech-stack context for a repository.",
            input_schema: memory::tech_stack_schema,
            handler: memory::execute_set_tech_stack,
        },
        ToolDef {
            name: "get_repo_context",
            description: "Get stored tech stack and focused initiative for a repository.",
            input_schema: memory::repo_context_schema,
            handler: memory::execute_repo_context,
        },
        ToolDef {
            name: "recall_recent_work",
            description: "Day-grouped timeline of recent notes and session summaries.",
            input_schema: memory::recall_schema,
            handler: memory::execute_recall,
        },
        ToolDef {
            name: "create_initiative",
            description: "Create a multi-session initiative; new memory is tagged with the \
                          focused initiative.",
            input_schema: initiatives::create_schema,
            handler: initiatives::execute_create,
        },
        ToolDef {
            name: "set_initiative",
            description: "(Legacy) Create or update an initiative by name.",
            input_schema: initiatives::set_schema,
            handler: initiatives::execute_set,
        },
        ToolDef {
            name: "list_initiatives",
            description: "List a repository's initiatives with status and staleness flags.",
            input_schema: initiatives::list_schema,
            handler: initiatives::execute_list,
        },
        ToolDef {
            name: "focus_initiative",
            description: "Focus an initiative; new memory writes are tagged with it.",
            input_schema: initiatives::focus_schema,
            handler: initiatives::execute_focus,
        },
        ToolDef {
            name: "complete_initiative",
            description: "Mark an initiative completed with a summary. Soft: it stays \
                          searchable.",
            input_schema: initiatives::complete_schema,
            handler: initiatives::execute_complete,
        },
        ToolDef {
            name: "summarize_initiative",
            description: "Timeline summary of an initiative's tagged memory.",
            input_schema: initiatives::summarize_schema,
            handler: initiatives::execute_summarize,
        },
        ToolDef {
            name: "configure",
            description: "Update runtime settings. Out-of-range values clamp; invalid provider \
                          names are rejected.",
            input_schema: configure::configure_schema,
            handler: configure::execute_configure,
        },
        ToolDef {
            name: "capture_session",
            description: "Capture a finished session transcript: significance-gated, dedup'd, \
                          summarized by the configured LLM provider.",
            input_schema: autocapture::capture_schema,
            handler: autocapture::execute_capture,
        },
        ToolDef {
            name: "get_autocapture_status",
            description: "Queue depth, worker mode, thresholds, and provider for session \
                          capture.",
            input_schema: autocapture::status_schema,
            handler: autocapture::execute_status,
        },
        ToolDef {
            name: "get_version",
            description: "Daemon build and version info; pass expected_commit to check whether \
                          a rebuild is needed.",
            input_schema: orient::version_schema,
            handler: orient::execute_version,
        },
    ]
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Dispatch one operation, always producing a JSON-encodable envelope
pub fn dispatch(ctx: &ServiceContext, name: &str, arguments: Value) -> Value {
    let registry = registry();
    let Some(tool) = registry.iter().find(|tool| tool.name == name) else {
        return error_envelope(&EngramError::InvalidArgument(format!(
            "unknown tool: {}",
            name
        )));
    };

    match (tool.handler)(ctx, arguments) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(tool = name, "tool failed: {}", e);
            error_envelope(&e)
        }
    }
}

fn error_envelope(error: &EngramError) -> Value {
    json!({
        "status": "error",
        "kind": error.kind(),
        "error": error.to_string(),
    })
}

/// Deserialize tool arguments into their typed input record
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| EngramError::InvalidArgument(format!("invalid arguments: {}", e)))
}

// ============================================================================
// TESTS
// ============================================================================
