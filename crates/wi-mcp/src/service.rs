//! MCP request dispatch
//!
//! Routes JSON-RPC requests from the HTTP endpoint to the protocol
//! handlers: lifecycle (initialize/ping), tool listing, and tool calls.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::pages::PageRegistry;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::tools;

/// Server name advertised during initialization
pub const SERVER_NAME: &str = "web-interact-server";

/// The MCP service: one instance per running server
pub struct McpService {
    pages: Arc<PageRegistry>,
}

impl McpService {
    pub fn new(pages: Arc<PageRegistry>) -> Self {
        Self { pages }
    }

    /// The page registry backing tool execution
    pub fn pages(&self) -> &Arc<PageRegistry> {
        &self.pages
    }

    /// Handle a single JSON-RPC request
    ///
    /// Returns `None` for notifications: JSON-RPC 2.0 forbids responding
    /// to requests without an id.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling MCP request: method={}", request.method);

        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params.as_ref()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params.as_ref()).await,
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };

        Some(response)
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                info!("MCP client completed initialization");
            }
            other => {
                debug!("Ignoring notification: {}", other);
            }
        }
    }

    fn handle_initialize(&self, id: Value, params: Option<&Value>) -> JsonRpcResponse {
        if let Some(requested) = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
        {
            if requested != PROTOCOL_VERSION {
                debug!(
                    "Client requested protocol version {}, answering with {}",
                    requested, PROTOCOL_VERSION
                );
            }
        }

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools = tools::tool_definitions();
        match serde_json::to_value(&tools) {
            Ok(tools) => JsonRpcResponse::success(id, json!({ "tools": tools })),
            Err(e) => JsonRpcResponse::error(
                id,
                JsonRpcError::internal_error(format!("Failed to serialize tools: {}", e)),
            ),
        }
    }

    async fn handle_tools_call(&self, id: Value, params: Option<&Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing params for tools/call"),
                );
            }
        };

        let name = match params.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("tools/call params must include a tool name"),
                );
            }
        };

        if !tools::tool_exists(name) {
            return JsonRpcResponse::error(id, JsonRpcError::tool_not_found(name));
        }

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        match tools::call_tool(&self.pages, name, &arguments).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => JsonRpcResponse::error(
                    id,
                    JsonRpcError::internal_error(format!("Failed to serialize result: {}", e)),
                ),
            },
            Err(wi_types::AppError::InvalidParams(msg)) => {
                JsonRpcResponse::error(id, JsonRpcError::invalid_params(msg))
            }
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
        }
    }
}
