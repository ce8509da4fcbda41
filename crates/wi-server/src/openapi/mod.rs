//! OpenAPI specification generation module
//!
//! Generates OpenAPI 3.1 specification from code annotations using utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation builder
///
/// This struct uses utoipa's derive macro to automatically generate
/// an OpenAPI 3.1 specification from the annotated route handlers and types.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "web-interact API",
        version = "0.3.2",
        description = "MCP server that relays snapshot, confirmation, and question commands to connected browser pages over WebSocket"
    ),
    servers(
        (url = "http://127.0.0.1:8000", description = "Local server")
    ),
    paths(
        // MCP endpoints
        crate::routes::mcp::mcp_post_handler,
        crate::routes::mcp::mcp_get_handler,

        // Page WebSocket
        crate::routes::page_ws::page_websocket_handler,

        // System endpoints
        crate::health_check,
        crate::serve_openapi_json,
        crate::serve_openapi_yaml
    ),
    components(
        schemas(
            // MCP protocol types
            wi_mcp::protocol::JsonRpcRequest,
            wi_mcp::protocol::JsonRpcResponse,
            wi_mcp::protocol::JsonRpcError,
            wi_mcp::protocol::McpTool,

            // Response types
            crate::types::ErrorResponse,
            crate::types::MessageResponse,
            crate::types::HealthResponse,
        )
    ),
    tags(
        (name = "mcp", description = "MCP JSON-RPC endpoints"),
        (name = "pages", description = "Browser page WebSocket sessions"),
        (name = "system", description = "System health and information")
    )
)]
pub struct ApiDoc;

/// Get the OpenAPI specification as JSON
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ApiDoc::openapi())
}

/// Get the OpenAPI specification as YAML
pub fn get_openapi_yaml() -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&ApiDoc::openapi())
}
