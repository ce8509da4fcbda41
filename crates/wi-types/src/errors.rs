//! Error types and conversions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Page session error: {0}")]
    PageSession(String),

    #[error("No connected page for session: {0}")]
    PageNotConnected(String),

    #[error("Page did not respond within {0} seconds")]
    PageTimeout(u64),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::PageNotConnected("default".to_string());
        assert_eq!(err.to_string(), "No connected page for session: default");

        let err = AppError::PageTimeout(60);
        assert_eq!(err.to_string(), "Page did not respond within 60 seconds");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
