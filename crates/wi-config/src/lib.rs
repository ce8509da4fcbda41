//! Configuration management module
//!
//! Handles loading, saving, and managing application configuration.
//! Supports file watching for hot reload of the YAML settings file.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};
use wi_types::AppResult;

pub mod paths;
pub mod registration;
mod storage;
pub mod types;
mod validation;

pub use storage::{load_config, save_config};
pub use types::*;

/// Thread-safe configuration manager with file watching
#[derive(Debug)]
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    config_path: PathBuf,
    /// Mutex to serialize disk writes, preventing concurrent save races
    save_mutex: Arc<AsyncMutex<()>>,
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            config_path: self.config_path.clone(),
            save_mutex: self.save_mutex.clone(),
        }
    }
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new(config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
            save_mutex: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Load configuration from default location
    pub async fn load() -> AppResult<Self> {
        let config_path = paths::config_file()?;
        let config = load_config(&config_path).await?;
        Ok(Self::new(config, config_path))
    }

    /// Load configuration with custom path
    pub async fn load_from_path(path: PathBuf) -> AppResult<Self> {
        let config = load_config(&path).await?;
        Ok(Self::new(config, path))
    }

    /// Get a snapshot of the current configuration
    pub fn get(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// The path this manager loads from and saves to
    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Replace the in-memory configuration and persist it
    pub async fn update(&self, config: AppConfig) -> AppResult<()> {
        let _guard = self.save_mutex.lock().await;
        *self.config.write() = config.clone();
        save_config(&config, &self.config_path).await
    }

    /// Reload configuration from disk
    pub async fn reload(&self) -> AppResult<()> {
        let config = load_config(&self.config_path).await?;
        *self.config.write() = config;
        info!("Configuration reloaded from {:?}", self.config_path);
        Ok(())
    }

    /// Start watching the configuration file for changes
    ///
    /// When the config file changes externally (e.g., user edits it), the
    /// in-memory configuration is reloaded from disk.
    ///
    /// Returns a file watcher that must be kept alive. Drop it to stop watching.
    pub fn start_watching(&self) -> AppResult<RecommendedWatcher> {
        let config_path = self.config_path.clone();
        let config_arc = self.config.clone();

        // Capture the Tokio runtime handle for spawning tasks from the file watcher thread
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher =
            notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
                match result {
                    Ok(event) => {
                        // Only respond to modify events
                        if matches!(event.kind, EventKind::Modify(_)) {
                            info!("Configuration file changed, reloading...");

                            let config_path = config_path.clone();
                            let config_arc = config_arc.clone();

                            runtime_handle.spawn(async move {
                                match load_config(&config_path).await {
                                    Ok(new_config) => {
                                        *config_arc.write() = new_config;
                                        info!("Configuration hot-reloaded");
                                    }
                                    Err(e) => {
                                        error!("Failed to reload configuration: {}", e);
                                    }
                                }
                            });
                        }
                    }
                    Err(e) => {
                        error!("Configuration watcher error: {}", e);
                    }
                }
            })
            .map_err(|e| {
                wi_types::AppError::Config(format!("Failed to create file watcher: {}", e))
            })?;

        watcher
            .watch(&self.config_path, RecursiveMode::NonRecursive)
            .map_err(|e| {
                wi_types::AppError::Config(format!(
                    "Failed to watch {:?}: {}",
                    self.config_path, e
                ))
            })?;

        info!("Watching configuration file {:?}", self.config_path);
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_from_path_and_get() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let manager = ConfigManager::load_from_path(path.clone()).await.unwrap();
        assert_eq!(manager.get(), AppConfig::default());
        assert_eq!(manager.path(), &path);
    }

    #[tokio::test]
    async fn test_update_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let manager = ConfigManager::load_from_path(path.clone()).await.unwrap();

        let mut config = manager.get();
        config.server.port = 8765;
        manager.update(config).await.unwrap();

        // Fresh manager sees the persisted change
        let reloaded = ConfigManager::load_from_path(path).await.unwrap();
        assert_eq!(reloaded.get().server.port, 8765);
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_edit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let manager = ConfigManager::load_from_path(path.clone()).await.unwrap();
        assert_eq!(manager.get().server.port, 8000);

        tokio::fs::write(&path, "server:\n  port: 9100\n")
            .await
            .unwrap();
        manager.reload().await.unwrap();
        assert_eq!(manager.get().server.port, 9100);
    }
}
