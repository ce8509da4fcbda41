//! Page interaction tools
//!
//! The three tools exposed over MCP, each relaying a command to the
//! connected page and shaping its reply into an MCP tool result. Relay
//! failures are reported inside the result (`isError`) rather than as
//! protocol errors, so the calling model sees what went wrong.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use crate::pages::{PageCommand, PageRegistry};
use crate::protocol::McpTool;
use wi_types::AppResult;

/// How many characters of captured HTML to include in the snapshot summary
const SNAPSHOT_PREVIEW_CHARS: usize = 500;

pub const TOOL_TAKE_HTML_SNAPSHOT: &str = "take_html_snapshot";
pub const TOOL_SHOW_CONFIRMATION_ALERT: &str = "show_confirmation_alert";
pub const TOOL_SHOW_QUESTION_POPUP: &str = "show_question_popup";

/// Result of a tool call, in MCP `tools/call` shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,

    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolCallResult {
    fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// The text payload of the first content block
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|ToolContent::Text { text }| text.as_str())
    }
}

/// Tool definitions advertised via `tools/list`
pub fn tool_definitions() -> Vec<McpTool> {
    vec![
        McpTool {
            name: TOOL_TAKE_HTML_SNAPSHOT.to_string(),
            description: Some(
                "Take a HTML snapshot of the connected web page.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url_or_session": {
                        "type": "string",
                        "description": "Session ID for the connected page",
                        "default": "default"
                    }
                }
            }),
        },
        McpTool {
            name: TOOL_SHOW_CONFIRMATION_ALERT.to_string(),
            description: Some(
                "Show a confirmation alert on the user's web page and return the result."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The confirmation message"
                    },
                    "session_id": {
                        "type": "string",
                        "description": "Session ID for the connected page",
                        "default": "default"
                    }
                },
                "required": ["message"]
            }),
        },
        McpTool {
            name: TOOL_SHOW_QUESTION_POPUP.to_string(),
            description: Some(
                "Show a question popup on the web page and return the user's answer.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to ask"
                    },
                    "session_id": {
                        "type": "string",
                        "description": "Session ID for the connected page",
                        "default": "default"
                    }
                },
                "required": ["question"]
            }),
        },
    ]
}

/// Whether a tool with this name exists
pub fn tool_exists(name: &str) -> bool {
    matches!(
        name,
        TOOL_TAKE_HTML_SNAPSHOT | TOOL_SHOW_CONFIRMATION_ALERT | TOOL_SHOW_QUESTION_POPUP
    )
}

/// Execute a tool against the page registry
///
/// `arguments` is the raw `arguments` object from `tools/call`. Unknown
/// tool names must be filtered out by the caller (`tool_exists`); argument
/// shape problems surface as `AppError::InvalidParams`.
pub async fn call_tool(
    registry: &PageRegistry,
    name: &str,
    arguments: &Value,
) -> AppResult<ToolCallResult> {
    match name {
        TOOL_TAKE_HTML_SNAPSHOT => take_html_snapshot(registry, arguments).await,
        TOOL_SHOW_CONFIRMATION_ALERT => show_confirmation_alert(registry, arguments).await,
        TOOL_SHOW_QUESTION_POPUP => show_question_popup(registry, arguments).await,
        other => Err(wi_types::AppError::Mcp(format!("Unknown tool: {}", other))),
    }
}

fn optional_string(arguments: &Value, key: &str, default: &str) -> String {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn required_string(arguments: &Value, key: &str) -> AppResult<String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            wi_types::AppError::InvalidParams(format!("Missing required argument '{}'", key))
        })
}

async fn take_html_snapshot(registry: &PageRegistry, arguments: &Value) -> AppResult<ToolCallResult> {
    let session_id = optional_string(arguments, "url_or_session", "default");

    match registry.send_and_await(&session_id, PageCommand::snapshot()).await {
        Ok(reply) => {
            if reply.get("success").and_then(Value::as_bool).unwrap_or(false) {
                let html = reply.get("html").and_then(Value::as_str).unwrap_or("");
                let preview: String = html.chars().take(SNAPSHOT_PREVIEW_CHARS).collect();
                Ok(ToolCallResult::text(format!(
                    "HTML Snapshot captured successfully (length: {} chars). Preview: {}...",
                    html.chars().count(),
                    preview
                )))
            } else {
                let reason = reply
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error");
                Ok(ToolCallResult::error(format!(
                    "Failed to capture snapshot: {}",
                    reason
                )))
            }
        }
        Err(e) => {
            error!("Snapshot error for session '{}': {}", session_id, e);
            Ok(ToolCallResult::error(format!("Error taking snapshot: {}", e)))
        }
    }
}

async fn show_confirmation_alert(
    registry: &PageRegistry,
    arguments: &Value,
) -> AppResult<ToolCallResult> {
    let message = required_string(arguments, "message")?;
    let session_id = optional_string(arguments, "session_id", "default");

    match registry
        .send_and_await(&session_id, PageCommand::Confirm { message })
        .await
    {
        Ok(reply) => {
            let confirmed = reply
                .get("confirmed")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(ToolCallResult::text(confirmed.to_string()))
        }
        Err(e) => {
            error!("Alert error for session '{}': {}", session_id, e);
            // The original reports false when the relay fails
            Ok(ToolCallResult {
                content: vec![ToolContent::Text {
                    text: "false".to_string(),
                }],
                is_error: true,
            })
        }
    }
}

async fn show_question_popup(
    registry: &PageRegistry,
    arguments: &Value,
) -> AppResult<ToolCallResult> {
    let question = required_string(arguments, "question")?;
    let session_id = optional_string(arguments, "session_id", "default");

    match registry
        .send_and_await(&session_id, PageCommand::Prompt { question })
        .await
    {
        Ok(reply) => {
            let answer = reply.get("answer").and_then(Value::as_str).unwrap_or("");
            Ok(ToolCallResult::text(answer.to_string()))
        }
        Err(e) => {
            error!("Popup error for session '{}': {}", session_id, e);
            Ok(ToolCallResult::error(format!("Error getting answer: {}", e)))
        }
    }
}
