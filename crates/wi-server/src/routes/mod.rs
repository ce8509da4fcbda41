//! Route handlers

pub mod mcp;
pub mod page_ws;

pub use mcp::{mcp_get_handler, mcp_post_handler};
pub use page_ws::page_websocket_handler;
