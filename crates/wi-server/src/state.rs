//! Shared application state for the HTTP server

use std::sync::Arc;
use std::time::Instant;

use wi_config::ConfigManager;
use wi_mcp::{McpService, PageRegistry};

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (hot-reloadable)
    pub config_manager: Arc<ConfigManager>,

    /// Connected page sessions and in-flight commands
    pub pages: Arc<PageRegistry>,

    /// MCP request dispatcher
    pub mcp: Arc<McpService>,

    /// Server start time (for uptime reporting)
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config_manager: Arc<ConfigManager>, pages: Arc<PageRegistry>) -> Self {
        let mcp = Arc::new(McpService::new(pages.clone()));
        Self {
            config_manager,
            pages,
            mcp,
            started_at: Instant::now(),
        }
    }
}
