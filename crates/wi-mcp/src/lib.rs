//! MCP server core for web-interact
//!
//! JSON-RPC 2.0 protocol types, the page-session relay, the tool surface,
//! and the request dispatcher that ties them together.

pub mod pages;
pub mod protocol;
pub mod service;
pub mod tools;

pub use pages::{PageCommand, PageEvent, PageRegistry};
pub use service::McpService;
