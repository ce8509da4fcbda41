//! API response types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "No connected page for session: default")]
    pub error: String,
}

/// Simple message response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Server status summary returned by `/health`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,

    /// Number of currently connected page sessions
    pub connected_pages: usize,

    /// Seconds since the server started
    pub uptime_secs: u64,
}
