//! MCP client error types.

use docbridge_core::SourceError;
use thiserror::Error;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The event stream could not be opened or never announced an endpoint.
    #[error("failed to connect to '{url}': {reason}")]
    ConnectFailed { url: String, reason: String },

    /// The `initialize` handshake failed.
    #[error("initialization failed: {reason}")]
    InitFailed { reason: String },

    /// HTTP or framing failure after the session was established.
    #[error("transport error: {reason}")]
    TransportError { reason: String },

    /// The event stream ended; no further responses can arrive.
    #[error("session closed")]
    Closed,

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A tool call completed with `isError: true`.
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// A response did not have the expected shape.
    #[error("invalid response to '{method}': {reason}")]
    InvalidResponse { method: String, reason: String },

    /// A call did not complete in time.
    #[error("'{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },
}

impl McpError {
    /// Map onto the tool-server error the chat loop understands.
    pub fn into_source_error(self, tool: &str) -> SourceError {
        match self {
            McpError::Timeout { timeout_ms, .. } => SourceError::Timeout {
                tool: tool.to_string(),
                timeout_secs: timeout_ms / 1000,
            },
            McpError::ToolFailed { message, .. } => SourceError::ToolFailed {
                tool: tool.to_string(),
                message,
            },
            McpError::ServerError { message, .. } => SourceError::ToolFailed {
                tool: tool.to_string(),
                message,
            },
            other => SourceError::Transport(other.to_string()),
        }
    }
}
