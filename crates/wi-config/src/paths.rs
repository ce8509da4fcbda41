//! OS-specific path resolution for configuration files

use std::path::PathBuf;
use wi_types::{AppError, AppResult};

/// Get the configuration directory
///
/// Priority:
/// 1. Runtime override via `WEB_INTERACT_ENV` environment variable: `~/.web-interact-{env}/`
/// 2. Development mode (debug builds): `~/.web-interact-dev/`
/// 3. Production mode (release builds): `~/.web-interact/`
pub fn config_dir() -> AppResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("Could not determine home directory".to_string()))?;

    // Runtime override via environment variable (for testing)
    if let Ok(env_suffix) = std::env::var("WEB_INTERACT_ENV") {
        return Ok(home.join(format!(".web-interact-{}", env_suffix)));
    }

    #[cfg(debug_assertions)]
    let dir = home.join(".web-interact-dev");

    #[cfg(not(debug_assertions))]
    let dir = home.join(".web-interact");

    Ok(dir)
}

/// Get the configuration file path
pub fn config_file() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("settings.yaml"))
}

/// Get the logs directory
pub fn logs_dir() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("logs"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_config_dir_default() {
        env::remove_var("WEB_INTERACT_ENV");

        let dir = config_dir().unwrap();
        assert!(dir.to_string_lossy().contains(".web-interact"));
    }

    #[test]
    #[serial]
    fn test_config_dir_env_override() {
        env::set_var("WEB_INTERACT_ENV", "test");

        let dir = config_dir().unwrap();
        assert!(dir.to_string_lossy().ends_with(".web-interact-test"));

        env::remove_var("WEB_INTERACT_ENV");
    }

    #[test]
    #[serial]
    fn test_config_file_name() {
        env::remove_var("WEB_INTERACT_ENV");

        let file = config_file().unwrap();
        assert_eq!(file.file_name().unwrap(), "settings.yaml");
    }
}
