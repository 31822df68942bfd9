//! MCP session lifecycle: handshake, tool discovery, tool calls, shutdown.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::McpError;
use crate::transport::SseTransport;
use crate::types::{
    CallToolResult, InitializeResult, ListToolsResult, McpToolDefinition, PROTOCOL_VERSION,
    ServerInfo,
};

/// Name and version the client reports in `initialize`.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "docbridge".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// An initialized MCP session over the SSE transport.
pub struct McpSession {
    transport: SseTransport,
    server_info: ServerInfo,
    request_timeout: Duration,
}

impl McpSession {
    /// Open the event stream and perform the `initialize` handshake.
    ///
    /// `connect_timeout` bounds the stream setup and the `initialize` call.
    pub async fn connect(
        url: &str,
        client_info: &ClientInfo,
        connect_timeout: Duration,
    ) -> Result<Self, McpError> {
        let transport = SseTransport::connect(url, connect_timeout).await?;

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_info.name,
                "version": client_info.version,
            },
        });

        let raw = tokio::time::timeout(
            connect_timeout,
            transport.request("initialize", Some(params)),
        )
        .await
        .map_err(|_| McpError::InitFailed {
            reason: format!("no initialize response within {connect_timeout:?}"),
        })?
        .map_err(|e| McpError::InitFailed {
            reason: e.to_string(),
        })?;

        let init: InitializeResult =
            serde_json::from_value(raw).map_err(|e| McpError::InitFailed {
                reason: format!("malformed initialize result: {e}"),
            })?;

        if let Some(version) = init.protocol_version.as_deref()
            && version != PROTOCOL_VERSION
        {
            warn!(
                server_version = version,
                client_version = PROTOCOL_VERSION,
                "MCP server negotiated a different protocol version"
            );
        }

        transport
            .notify("notifications/initialized", None)
            .await
            .map_err(|e| McpError::InitFailed {
                reason: e.to_string(),
            })?;

        let server_info = init.server_info.unwrap_or_default();
        info!(
            server = server_info.name.as_deref().unwrap_or("unknown"),
            version = server_info.version.as_deref().unwrap_or("unknown"),
            "MCP session initialized"
        );

        Ok(Self {
            transport,
            server_info,
            request_timeout: connect_timeout,
        })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Tools advertised by the server (`tools/list`).
    pub async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        let raw = self
            .with_timeout(
                "tools/list",
                self.request_timeout,
                self.transport.request("tools/list", None),
            )
            .await?;

        let listed: ListToolsResult =
            serde_json::from_value(raw).map_err(|e| McpError::InvalidResponse {
                method: "tools/list".into(),
                reason: e.to_string(),
            })?;

        debug!(count = listed.tools.len(), "Listed MCP tools");
        Ok(listed.tools)
    }

    /// Invoke a tool (`tools/call`) and wait at most `timeout` for its result.
    ///
    /// A result flagged `isError` becomes [`McpError::ToolFailed`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> Result<CallToolResult, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        let raw = self
            .with_timeout(
                "tools/call",
                timeout,
                self.transport.request("tools/call", Some(params)),
            )
            .await?;

        let result: CallToolResult =
            serde_json::from_value(raw).map_err(|e| McpError::InvalidResponse {
                method: "tools/call".into(),
                reason: e.to_string(),
            })?;

        if result.is_error {
            return Err(McpError::ToolFailed {
                tool: name.to_string(),
                message: result.texts().join("\n"),
            });
        }

        Ok(result)
    }

    /// End the session. Safe to call more than once.
    pub fn close(&self) {
        if !self.transport.is_closed() {
            info!("Closing MCP session");
        }
        self.transport.close();
    }

    async fn with_timeout<F>(
        &self,
        method: &str,
        timeout: Duration,
        call: F,
    ) -> Result<serde_json::Value, McpError>
    where
        F: std::future::Future<Output = Result<serde_json::Value, McpError>>,
    {
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| McpError::Timeout {
                method: method.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
    }
}
