use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use sonar_core::{Error, ToolKind, ValidationError};

/// Successful call: one text block.
pub(crate) fn tool_ok(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

/// Upstream failure, surfaced to the caller as an error-flagged result rather than a protocol error.
pub(crate) fn tool_error(e: &Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("Error: {e}"))])
}

/// Out-of-bounds arguments are rejected at the protocol level, before any upstream call.
pub(crate) fn invalid_params(kind: ToolKind, e: &ValidationError) -> McpError {
    McpError::invalid_params(
        format!("{}: {e}", kind.tool_name()),
        Some(serde_json::json!({
            "tool": kind.tool_name(),
            "limits": kind.limits(),
        })),
    )
}
