//! Configuration storage - loading and saving YAML files

use crate::types::{AppConfig, CONFIG_VERSION};
use crate::{paths, validation};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};
use wi_types::{AppError, AppResult};

/// Load configuration from a file
///
/// If the file doesn't exist, writes and returns a default configuration.
pub async fn load_config(path: &Path) -> AppResult<AppConfig> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir_exists(&parent.to_path_buf())?;
    }

    if !path.exists() {
        info!(
            "Configuration file not found at {:?}, creating default configuration",
            path
        );
        let default_config = AppConfig::default();
        save_config(&default_config, path).await?;
        return Ok(default_config);
    }

    debug!("Loading configuration from {:?}", path);

    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Config(format!("Failed to read configuration file: {}", e)))?;

    let config: AppConfig = serde_yaml::from_str(&contents)
        .map_err(|e| AppError::Config(format!("Failed to parse configuration YAML: {}", e)))?;

    if config.version > CONFIG_VERSION {
        warn!(
            "Configuration version {} is newer than supported version {}",
            config.version, CONFIG_VERSION
        );
    }

    validation::validate_config(&config)?;

    Ok(config)
}

/// Save configuration to a file
///
/// Writes to a temporary file in the same directory and renames it into
/// place, so a crash mid-write never leaves a truncated config behind.
pub async fn save_config(config: &AppConfig, path: &Path) -> AppResult<()> {
    debug!("Saving configuration to {:?}", path);

    if let Some(parent) = path.parent() {
        paths::ensure_dir_exists(&parent.to_path_buf())?;
    }

    validation::validate_config(config)?;

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize configuration: {}", e)))?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml)
        .await
        .map_err(|e| AppError::Config(format!("Failed to write configuration file: {}", e)))?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| AppError::Config(format!("Failed to replace configuration file: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let config = load_config(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let mut config = AppConfig::default();
        config.server.port = 8123;
        config.page.command_timeout_secs = 30;

        save_config(&config, &path).await.unwrap();
        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_invalid_yaml_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        tokio::fs::write(&path, "server: [not a mapping").await.unwrap();

        let result = load_config(&path).await;
        assert!(result.is_err());
    }
}
