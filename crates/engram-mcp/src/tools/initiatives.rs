//! Initiative Tools

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::Result;

use crate::server::ServiceContext;

use super::parse_args;

pub fn create_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {"type": "string", "description": "Repository identifier"},
            "name": {"type": "string", "description": "Initiative name, e.g. 'Auth Migration'"},
            "goal": {"type": "string", "description": "Optional goal/description"},
            "auto_focus": {
                "type": "boolean",
                "description": "Focus this initiative on creation (default: true)",
                "default": true
            }
        },
        "required": ["repository", "name"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct CreateArgs {
    repository: String,
    name: String,
    goal: Option<String>,
    #[serde(default = "default_true")]
    auto_focus: bool,
}

fn default_true() -> bool {
    true
}

pub fn execute_create(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: CreateArgs = parse_args(arguments)?;
    ctx.initiatives
        .create(&args.repository, &args.name, args.goal.as_deref(), args.auto_focus)
}

pub fn set_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {"type": "string", "description": "Repository identifier"},
            "name": {"type": "string", "description": "Initiative name"},
            "status": {"type": "string", "description": "Current state/progress"}
        },
        "required": ["repository", "name"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct SetArgs {
    repository: String,
    name: String,
    status: Option<String>,
}

pub fn execute_set(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: SetArgs = parse_args(arguments)?;
    ctx.initiatives
        .set(&args.repository, &args.name, args.status.as_deref())
}

pub fn list_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {"type": "string", "description": "Repository identifier"},
            "status": {
                "type": "string",
                "enum": ["all", "active", "completed"],
                "description": "Status filter (default: all)",
                "default": "all"
            }
        },
        "required": ["repository"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct ListArgs {
    repository: String,
    #[serde(default = "default_all")]
    status: String,
}

fn default_all() -> String {
    "all".to_string()
}

pub fn execute_list(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: ListArgs = parse_args(arguments)?;
    ctx.initiatives.list(&args.repository, &args.status)
}

pub fn focus_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "repository": {"type": "string", "description": "Repository identifier"},
            "initiative": {"type": "string", "description": "Initiative ID or name to focus"}
        },
        "required": ["repository", "initiative"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct FocusArgs {
    repository: String,
    initiative: String,
}

pub fn execute_focus(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: FocusArgs = parse_args(arguments)?;
    ctx.initiatives.focus(&args.repository, &args.initiative)
}

pub fn complete_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "initiative": {"type": "string", "description": "Initiative ID or name to complete"},
            "summary": {"type": "string", "description": "What was accomplished"},
            "repository": {"type": "string", "description": "Repository identifier (optional with an initiative ID)"}
        },
        "required": ["initiative", "summary"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct CompleteArgs {
    initiative: String,
    summary: String,
    repository: Option<String>,
}

pub fn execute_complete(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: CompleteArgs = parse_args(arguments)?;
    ctx.initiatives
        .complete(&args.initiative, &args.summary, args.repository.as_deref())
}

pub fn summarize_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "initiative": {"type": "string", "description": "Initiative ID or name"},
            "repository": {"type": "string", "description": "Repository identifier (optional with an initiative ID)"}
        },
        "required": ["initiative"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
struct SummarizeArgs {
    initiative: String,
    repository: Option<String>,
}

pub fn execute_summarize(ctx: &ServiceContext, arguments: Value) -> Result<Value> {
    let args: SummarizeArgs = parse_args(arguments)?;
    ctx.initiatives
        .summarize(&args.initiative, args.repository.as_deref())
}

// ============================================================================
// TESTS
// ============================================================================
