//! JSON-RPC Protocol
//!
//! JSON-RPC 2.0 types and the stdio transport loop. One request per
//! line on stdin, one response per line on stdout; logs go to stderr so
//! the stream stays clean.

use std::io::{self, BufRead, BufReader, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::server::McpServer;

/// MCP protocol revision spoken by this daemon
pub const MCP_VERSION: &str = "2025-03-26";

/// JSON-RPC version
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: format!("Invalid params: {}", detail),
            data: None,
        }
    }
}

// ============================================================================
// STDIO TRANSPORT
// ============================================================================

/// Line-delimited JSON-RPC over stdin/stdout
pub struct StdioTransport;

impl Default for StdioTransport {
    fn default() -> Self {
        Self
    }
}

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }

    /// Run the server until stdin closes
    pub async fn run(self, server: McpServer) -> Result<(), io::Error> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let reader = BufReader::new(stdin.lock());
        let mut stdout = stdout.lock();

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("failed to read line: {}", e);
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            debug!("received {} bytes", line.len());

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    warn!("unparseable request: {}", e);
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    write_response(&mut stdout, &response)?;
                    continue;
                }
            };

            if let Some(response) = server.handle_request(request).await {
                write_response(&mut stdout, &response)?;
            }
        }
        Ok(())
    }
}

fn write_response(stdout: &mut impl Write, response: &JsonRpcResponse) -> Result<(), io::Error> {
    match serde_json::to_string(response) {
        Ok(json) => {
            writeln!(stdout, "{}", json)?;
            stdout.flush()
        }
        Err(e) => {
            error!("failed to serialize response: {}", e);
            // Minimal fallback so the client never hangs on silence
            let fallback =
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;
            writeln!(stdout, "{}", fallback)?;
            stdout.flush()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
