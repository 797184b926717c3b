//! The minimal tool-call contract the Parallel Executor and Conflict Model
//! operate over.
//!
//! Specific tool implementations are out of scope (SPEC_FULL.md §1); this
//! crate only needs enough of a `ToolCall`/`ToolResult` shape to partition,
//! dispatch, and collect results in order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool invocation awaiting dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Best-effort string lookup into `arguments`, used by the Conflict
    /// Model to derive resource keys (`file_path`, `bash_id`,
    /// `session_id`, ...) without assuming a fixed argument schema.
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// The class + message of a tool-handler exception, carried into a
/// synthesized failed `ToolResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub class: String,
    pub message: String,
}

/// The outcome of dispatching one `ToolCall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(
        tool_call_id: impl Into<String>,
        class: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: String::new(),
            success: false,
            error: Some(ToolError {
                class: class.into(),
                message: message.into(),
            }),
        }
    }
}
