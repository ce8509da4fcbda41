//! Server manager for controlling the web server lifecycle

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use wi_config::ConfigManager;
use wi_mcp::PageRegistry;

use super::{start_server, state::AppState};

/// Server status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Running,
}

/// Manages the web server task
pub struct ServerManager {
    app_state: Arc<RwLock<Option<AppState>>>,
    server_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
    status: Arc<RwLock<ServerStatus>>,
    bound_port: Arc<RwLock<Option<u16>>>,
}

impl ServerManager {
    pub fn new() -> Self {
        Self {
            app_state: Arc::new(RwLock::new(None)),
            server_handle: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(ServerStatus::Stopped)),
            bound_port: Arc::new(RwLock::new(None)),
        }
    }

    /// Start the web server
    pub async fn start(
        &self,
        config_manager: Arc<ConfigManager>,
        pages: Arc<PageRegistry>,
    ) -> anyhow::Result<u16> {
        if *self.status.read() == ServerStatus::Running {
            info!("Server is already running");
            return Ok(self.bound_port.read().unwrap_or_default());
        }

        // Stop any existing server first
        self.stop().await;

        let (state, handle, port) = start_server(config_manager, pages).await?;

        *self.app_state.write() = Some(state);
        *self.server_handle.write() = Some(handle);
        *self.status.write() = ServerStatus::Running;
        *self.bound_port.write() = Some(port);

        info!("Server started successfully on port {}", port);
        Ok(port)
    }

    /// Stop the web server
    pub async fn stop(&self) {
        if *self.status.read() == ServerStatus::Stopped {
            return;
        }

        info!("Stopping server...");

        if let Some(handle) = self.server_handle.write().take() {
            handle.abort();
        }

        *self.app_state.write() = None;
        *self.status.write() = ServerStatus::Stopped;
        *self.bound_port.write() = None;

        info!("Server stopped");
    }

    /// Get the server status
    pub fn get_status(&self) -> ServerStatus {
        *self.status.read()
    }

    /// Get the app state
    pub fn get_state(&self) -> Option<AppState> {
        self.app_state.read().clone()
    }

    /// Port the server is actually bound to, if running
    pub fn get_port(&self) -> Option<u16> {
        *self.bound_port.read()
    }
}

impl Default for ServerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_starts_stopped() {
        let manager = ServerManager::new();
        assert_eq!(manager.get_status(), ServerStatus::Stopped);
        assert!(manager.get_state().is_none());
        assert!(manager.get_port().is_none());
    }
}
