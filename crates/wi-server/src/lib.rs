//! Web server module
//!
//! Axum HTTP server exposing the MCP endpoint, page WebSocket sessions,
//! and the OpenAPI specification.

pub mod manager;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod types;

// Re-export manager types for convenience
pub use manager::{ServerManager, ServerStatus};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use wi_config::{ConfigManager, PageConfig};
use wi_mcp::PageRegistry;

use self::state::AppState;
use self::types::HealthResponse;

/// Start the web server
///
/// Endpoints:
/// - POST /mcp/mcp - MCP JSON-RPC (bridge processes connect here)
/// - GET  /mcp/mcp - SSE page notifications / endpoint info
/// - GET  /ws      - Page WebSocket sessions
/// - GET  /health  - Health and connection summary
///
/// Returns the AppState, JoinHandle, and the actual port used
pub async fn start_server(
    config_manager: Arc<ConfigManager>,
    pages: Arc<PageRegistry>,
) -> anyhow::Result<(AppState, tokio::task::JoinHandle<()>, u16)> {
    let config = config_manager.get();
    let host = config.server.host.clone();
    let configured_port = config.server.port;
    let enable_cors = config.server.enable_cors;
    let page_config = config.page.clone();

    info!("Starting web server on {}:{}", host, configured_port);

    let state = AppState::new(config_manager, pages);
    let app = build_app(state.clone(), enable_cors, &page_config);

    // Try to bind to the configured port, incrementing if necessary
    let host_ip = host.parse::<std::net::IpAddr>()?;
    let mut port = configured_port;
    let max_attempts = 100;

    let listener = loop {
        let addr = SocketAddr::from((host_ip, port));

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if port != configured_port {
                    info!("Port {} was taken, using port {} instead", configured_port, port);
                }
                break listener;
            }
            Err(e) => {
                if port - configured_port >= max_attempts {
                    return Err(anyhow::anyhow!(
                        "Could not bind to any port between {} and {} (last error: {})",
                        configured_port,
                        port,
                        e
                    ));
                }
                tracing::debug!("Port {} is taken, trying next port", port);
                port += 1;
            }
        }
    };

    // Port 0 asks the OS for an ephemeral port, so report the real one
    let port = listener.local_addr()?.port();

    info!("Web server listening on http://{}:{}", host, port);
    info!("MCP endpoint available at http://{}:{}/mcp/mcp", host, port);

    let state_clone = state.clone();

    // Start server (this runs forever)
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok((state_clone, handle, port))
}

/// Build the Axum app with all routes and middleware
pub fn build_app(state: AppState, enable_cors: bool, page_config: &PageConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        // OpenAPI specification endpoints
        .route("/openapi.json", get(serve_openapi_json))
        .route("/openapi.yaml", get(serve_openapi_yaml))
        // MCP endpoint consumed by bridge processes
        .route(
            "/mcp/mcp",
            post(routes::mcp_post_handler).get(routes::mcp_get_handler),
        )
        // Page WebSocket sessions
        .route("/ws", get(routes::page_websocket_handler))
        .with_state(state);

    // Add logging middleware
    router = router.layer(axum::middleware::from_fn(logging_middleware));

    // Add CORS if enabled
    if enable_cors {
        router = router.layer(build_cors_layer(&page_config.allowed_origins));
    }

    router
}

/// Build the CORS layer from the configured page origins
///
/// A literal "*" entry switches to a permissive wildcard policy (no
/// credentials, as required by the CORS spec).
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Skipping invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connected_pages: state.pages.connection_count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// Root handler
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses(
        (status = 200, description = "API information", content_type = "text/plain")
    )
)]
async fn root_handler() -> &'static str {
    "web-interact - MCP server for browser page interaction\n\
     \n\
     MCP Endpoints:\n\
       POST /mcp/mcp - MCP JSON-RPC (initialize, tools/list, tools/call)\n\
       GET  /mcp/mcp - SSE page notifications (Accept: text/event-stream)\n\
     \n\
     Page Endpoints:\n\
       GET  /ws?session_id=<id> - WebSocket page session\n\
     \n\
     Documentation:\n\
       GET  /openapi.json - OpenAPI specification (JSON)\n\
       GET  /openapi.yaml - OpenAPI specification (YAML)\n"
}

/// Serve OpenAPI specification as JSON
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format", content_type = "application/json"),
        (status = 500, description = "Failed to generate specification")
    )
)]
async fn serve_openapi_json() -> impl IntoResponse {
    match openapi::get_openapi_json() {
        Ok(json) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            json,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to generate OpenAPI spec: {}", e),
        )
            .into_response(),
    }
}

/// Serve OpenAPI specification as YAML
#[utoipa::path(
    get,
    path = "/openapi.yaml",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in YAML format", content_type = "application/yaml"),
        (status = 500, description = "Failed to generate specification")
    )
)]
async fn serve_openapi_yaml() -> impl IntoResponse {
    match openapi::get_openapi_yaml() {
        Ok(yaml) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/yaml")],
            yaml,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to generate OpenAPI spec: {}", e),
        )
            .into_response(),
    }
}

/// Logging middleware to log all requests
async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        error!("{} {} - {} ({:?})", method, uri, status, elapsed);
    } else {
        info!("{} {} - {} ({:?})", method, uri, status, elapsed);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wi_config::AppConfig;

    fn test_state() -> AppState {
        let config_manager = Arc::new(ConfigManager::new(
            AppConfig::default(),
            PathBuf::from("/tmp/settings.yaml"),
        ));
        let pages = Arc::new(PageRegistry::new(60));
        AppState::new(config_manager, pages)
    }

    #[tokio::test]
    async fn test_build_app() {
        let state = test_state();
        let _app = build_app(state, true, &PageConfig::default());
    }

    #[tokio::test]
    async fn test_health_check_reports_connections() {
        let state = test_state();
        let (_rx, _gen) = state.pages.register("default");

        let Json(health) = health_check(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.connected_pages, 1);
    }

    #[test]
    fn test_cors_layer_wildcard() {
        let _layer = build_cors_layer(&["*".to_string()]);
        let _layer = build_cors_layer(&["http://localhost:3000".to_string()]);
    }

    #[tokio::test]
    async fn test_start_server_binds_and_increments() {
        let config_manager = Arc::new(ConfigManager::new(
            AppConfig {
                server: wi_config::ServerConfig {
                    port: 0, // let the OS pick
                    ..Default::default()
                },
                ..Default::default()
            },
            PathBuf::from("/tmp/settings.yaml"),
        ));
        let pages = Arc::new(PageRegistry::new(60));

        let (_state, handle, port) = start_server(config_manager, pages).await.unwrap();
        assert!(port > 0);
        handle.abort();
    }
}
