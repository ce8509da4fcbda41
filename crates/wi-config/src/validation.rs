//! Configuration validation

use crate::types::AppConfig;
use wi_types::{AppError, AppResult};

/// Validate a configuration before use or persistence
pub fn validate_config(config: &AppConfig) -> AppResult<()> {
    if config.server.host.trim().is_empty() {
        return Err(AppError::Config(
            "server.host must not be empty".to_string(),
        ));
    }

    config.server.host.parse::<std::net::IpAddr>().map_err(|_| {
        AppError::Config(format!(
            "server.host '{}' is not a valid IP address",
            config.server.host
        ))
    })?;

    if config.page.command_timeout_secs == 0 {
        return Err(AppError::Config(
            "page.command_timeout_secs must be greater than zero".to_string(),
        ));
    }

    for origin in &config.page.allowed_origins {
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(AppError::Config(format!(
                "page.allowed_origins entry '{}' must be an http(s) origin",
                origin
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_host() {
        let mut config = AppConfig::default();
        config.server.host = "not-an-ip".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.page.command_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_non_http_origin() {
        let mut config = AppConfig::default();
        config.page.allowed_origins = vec!["ftp://example.com".to_string()];
        assert!(validate_config(&config).is_err());
    }
}
