//! MCP endpoint routes
//!
//! Handles JSON-RPC requests from bridge processes (mcp-remote and
//! compatibles) at POST /mcp/mcp. GET /mcp/mcp returns an SSE stream of
//! page lifecycle notifications if Accept: text/event-stream, otherwise
//! endpoint info text.

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use std::convert::Infallible;

use crate::state::AppState;
use wi_mcp::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// MCP JSON-RPC endpoint
///
/// Single endpoint consumed by bridge processes. Notifications are
/// accepted with 202 and an empty body; requests get a JSON-RPC response.
#[utoipa::path(
    post,
    path = "/mcp/mcp",
    tag = "mcp",
    request_body = wi_mcp::protocol::JsonRpcRequest,
    responses(
        (status = 200, description = "JSON-RPC response", body = wi_mcp::protocol::JsonRpcResponse),
        (status = 202, description = "Notification accepted, no response"),
        (status = 400, description = "Malformed JSON-RPC request", body = crate::types::ErrorResponse)
    )
)]
pub async fn mcp_post_handler(
    State(state): State<AppState>,
    body: Result<Json<JsonRpcRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            // Malformed body: answer with a JSON-RPC parse error like any
            // other MCP transport would
            let error = JsonRpcError::parse_error(rejection.body_text());
            let response = JsonRpcResponse::error(serde_json::Value::Null, error);
            return (axum::http::StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let method = request.method.clone();
    match state.mcp.handle_request(request).await {
        Some(response) => {
            if let Some(error) = &response.error {
                tracing::debug!(
                    "MCP request {} answered with error {}: {}",
                    method,
                    error.code,
                    error.message
                );
            }
            Json(response).into_response()
        }
        None => {
            // Notification: nothing to send back
            (axum::http::StatusCode::ACCEPTED, "").into_response()
        }
    }
}

/// MCP endpoint with content negotiation
///
/// Returns an SSE stream of page connect/disconnect notifications when the
/// client accepts text/event-stream, endpoint info text otherwise.
#[utoipa::path(
    get,
    path = "/mcp/mcp",
    tag = "mcp",
    responses(
        (status = 200, description = "SSE event stream or endpoint info", content_type = "text/event-stream")
    )
)]
pub async fn mcp_get_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Response {
    let accepts_sse = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);

    if !accepts_sse {
        return (
            axum::http::StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "web-interact - MCP endpoint\n\
             \n\
             This endpoint speaks JSON-RPC 2.0:\n\
               POST /mcp/mcp - MCP requests (initialize, tools/list, tools/call)\n\
               GET  /mcp/mcp (Accept: text/event-stream) - page lifecycle notifications\n\
             \n\
             Browser pages connect at:\n\
               GET  /ws?session_id=<id> - WebSocket page session\n",
        )
            .into_response();
    }

    let mut events = state.pages.subscribe();

    tracing::debug!("SSE notification stream established");

    let sse_stream = async_stream::stream! {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let notification = event.to_notification();
                    match serde_json::to_string(&notification) {
                        Ok(json) => {
                            yield Ok::<_, Infallible>(Event::default().event("message").data(json));
                        }
                        Err(e) => {
                            tracing::error!("Failed to serialize page notification: {}", e);
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("SSE client lagged, missed {} page notifications", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Page event broadcast closed, ending SSE stream");
                    break;
                }
            }
        }
    };

    Sse::new(sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use futures::StreamExt;
    use std::sync::Arc;
    use wi_config::{AppConfig, ConfigManager};
    use wi_mcp::PageRegistry;

    fn test_state() -> AppState {
        let config_manager = Arc::new(ConfigManager::new(
            AppConfig::default(),
            std::path::PathBuf::from("/tmp/settings.yaml"),
        ));
        let pages = Arc::new(PageRegistry::new(60));
        AppState::new(config_manager, pages)
    }

    #[tokio::test]
    async fn test_get_without_sse_accept_returns_info_text() {
        let state = test_state();

        let response = mcp_get_handler(State(state), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("POST /mcp/mcp"));
        assert!(text.contains("/ws?session_id="));
    }

    #[tokio::test]
    async fn test_get_with_sse_accept_streams_page_events() {
        let state = test_state();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        let response = mcp_get_handler(State(state.clone()), headers).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        // A page connecting after the stream opens surfaces as a
        // page/connected notification frame
        let (_rx, _gen) = state.pages.register("default");

        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.contains("page/connected"));
        assert!(text.contains("default"));
    }
}
