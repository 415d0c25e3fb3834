//! MCP Server and Composition Root
//!
//! All engine services are constructed once at daemon start and carried
//! on a [`ServiceContext`] passed to every tool handler; nothing is
//! obtained through globals. The server itself speaks the MCP subset
//! the daemon needs: initialize, ping, tools/list, tools/call.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde_json::{json, Value};
use tracing::{debug, info};

use engram_core::{
    Collection, Embedder, IngestRequest, Ingestor, InitiativeManager, LexicalIndex, LlmProvider,
    MemoryStore, Reranker, RuntimeConfig, SearchEngine,
};
use engram_core::capture::{CaptureQueue, CaptureService};

use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;

// ============================================================================
// COMPOSITION ROOT
// ============================================================================

/// Every service a tool handler can reach
pub struct ServiceContext {
    pub collection: Arc<Collection>,
    pub lexical: Arc<LexicalIndex>,
    pub engine: Arc<SearchEngine>,
    pub ingestor: Arc<Ingestor>,
    pub memory: Arc<MemoryStore>,
    pub initiatives: Arc<InitiativeManager>,
    pub capture: Arc<CaptureService>,
    pub config: Arc<RwLock<RuntimeConfig>>,
    pub data_dir: PathBuf,
    /// Working tree the daemon serves; anchors branch detection and
    /// session-summary re-indexing
    pub workspace_root: Option<PathBuf>,
}

impl ServiceContext {
    /// Wire up the engine against a data directory
    pub fn new(
        data_dir: PathBuf,
        workspace_root: Option<PathBuf>,
        provider: Arc<dyn LlmProvider>,
    ) -> engram_core::Result<Self> {
        std::fs::create_dir_all(&data_dir)?;

        let embedder = Arc::new(Embedder::new());
        let collection = Arc::new(Collection::open(data_dir.join("engram.db"), embedder)?);
        let lexical = Arc::new(LexicalIndex::new());
        let config = Arc::new(RwLock::new(RuntimeConfig::default()));

        let engine = Arc::new(SearchEngine::new(
            Arc::clone(&collection),
            Arc::clone(&lexical),
            Reranker::default(),
            Arc::clone(&config),
        ));
        let ingestor = Arc::new(Ingestor::new(
            Arc::clone(&collection),
            Arc::clone(&lexical),
            data_dir.clone(),
        ));
        let memory = Arc::new(MemoryStore::new(
            Arc::clone(&collection),
            Arc::clone(&lexical),
        ));
        let initiatives = Arc::new(InitiativeManager::new(
            Arc::clone(&collection),
            Arc::clone(&lexical),
        ));
        let capture = Arc::new(CaptureService::new(
            Arc::new(CaptureQueue::open(&data_dir)?),
            Arc::clone(&memory),
            provider,
            Arc::clone(&config),
        ));

        Ok(Self {
            collection,
            lexical,
            engine,
            ingestor,
            memory,
            initiatives,
            capture,
            config,
            data_dir,
            workspace_root,
        })
    }

    /// Re-ingest specific files after a session summary names them
    pub fn reindex_changed_files(&self, changed_files: &[String]) -> Option<Value> {
        let root = self.workspace_root.as_ref()?;
        if changed_files.is_empty() {
            return None;
        }
        let mut request = IngestRequest::new(root.clone());
        request.include_patterns = Some(changed_files.to_vec());
        match self.ingestor.ingest(request) {
            Ok(engram_core::IngestOutcome::Completed(stats)) => {
                serde_json::to_value(stats).ok()
            }
            Ok(engram_core::IngestOutcome::Queued { task_id, .. }) => {
                Some(json!({"status": "queued", "task_id": task_id}))
            }
            Err(e) => {
                tracing::warn!("session re-index failed: {}", e);
                Some(json!({"status": "failed", "error": e.to_string()}))
            }
        }
    }
}

// ============================================================================
// SERVER
// ============================================================================

/// MCP request handler
pub struct McpServer {
    ctx: Arc<ServiceContext>,
}

impl McpServer {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Handle one JSON-RPC request. Notifications return `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.id.is_none() && request.method.starts_with("notifications/") {
            debug!("notification: {}", request.method);
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                request.id,
                json!({
                    "protocolVersion": MCP_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "engram-mcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => {
                let tools: Vec<Value> = tools::registry()
                    .iter()
                    .map(|tool| {
                        json!({
                            "name": tool.name,
                            "description": tool.description,
                            "inputSchema": (tool.input_schema)(),
                        })
                    })
                    .collect();
                JsonRpcResponse::success(request.id, json!({"tools": tools}))
            }
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                let Some(name) = params.get("name").and_then(Value::as_str) else {
                    return Some(JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::invalid_params("missing tool name"),
                    ));
                };
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                info!("tools/call: {}", name);

                let result = tools::dispatch(&self.ctx, name, arguments);
                let is_error = result.get("status").and_then(Value::as_str) == Some("error");
                let text = serde_json::to_string_pretty(&result)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"serialization\"}".to_string());

                JsonRpcResponse::success(
                    request.id,
                    json!({
                        "content": [{"type": "text", "text": text}],
                        "isError": is_error,
                    }),
                )
            }
            other => JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }
}

// ============================================================================
// TESTS
// ============================================================================
