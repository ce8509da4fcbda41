//! Shared types for web-interact
//!
//! Common error types used across all crates in the workspace.

pub mod errors;

pub use errors::{AppError, AppResult};
