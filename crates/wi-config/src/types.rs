use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_VERSION: u32 = 1;

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Connected-page behavior
    #[serde(default)]
    pub page: PageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            page: PageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether CORS headers are emitted at all
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    /// The MCP endpoint URL a bridge process should be pointed at
    pub fn mcp_endpoint_url(&self) -> String {
        format!("http://{}:{}/mcp/mcp", self.host, self.port)
    }
}

/// Configuration for the browser-page side of the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageConfig {
    /// Seconds to wait for a page to answer a command before giving up
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Origins allowed to open WebSocket connections (CORS allowlist)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_command_timeout() -> u64 {
    60
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
