//! `DocumentSource` over an MCP session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbridge_core::article::ArticleId;
use docbridge_core::error::SourceError;
use docbridge_core::source::{ASK_TOOL, DocumentSource, SEARCH_TOOL, ToolOutput, VIEW_TOOL};
use serde_json::json;
use tracing::debug;

use crate::errors::McpError;
use crate::session::McpSession;
use crate::types::McpToolDefinition;

/// Upper bounds for each remote tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolTimeouts {
    pub search: Duration,
    pub view: Duration,
    pub ask: Duration,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            search: Duration::from_secs(180),
            view: Duration::from_secs(60),
            ask: Duration::from_secs(300),
        }
    }
}

/// The documentation tool server, reached through an MCP session.
pub struct McpDocumentSource {
    name: String,
    session: Arc<McpSession>,
    tools: Vec<McpToolDefinition>,
    timeouts: ToolTimeouts,
}

impl McpDocumentSource {
    /// Discover the server's tools and wrap the session.
    pub async fn discover(
        session: Arc<McpSession>,
        timeouts: ToolTimeouts,
    ) -> Result<Self, McpError> {
        let tools = session.list_tools().await?;
        let name = session
            .server_info()
            .name
            .clone()
            .unwrap_or_else(|| "mcp".to_string());
        Ok(Self {
            name,
            session,
            tools,
            timeouts,
        })
    }

    /// Tool definitions as advertised.
    pub fn tools(&self) -> &[McpToolDefinition] {
        &self.tools
    }

    pub fn session(&self) -> &Arc<McpSession> {
        &self.session
    }

    async fn call(
        &self,
        tool: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> Result<ToolOutput, SourceError> {
        debug!(tool, "Calling MCP tool");
        let result = self
            .session
            .call_tool(tool, arguments, timeout)
            .await
            .map_err(|e| e.into_source_error(tool))?;
        Ok(ToolOutput::new(result.texts()))
    }
}

#[async_trait]
impl DocumentSource for McpDocumentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    async fn search(&self, query: &str) -> Result<ToolOutput, SourceError> {
        self.call(SEARCH_TOOL, json!({ "query": query }), self.timeouts.search)
            .await
    }

    async fn view(&self, id: &ArticleId) -> Result<ToolOutput, SourceError> {
        self.call(VIEW_TOOL, json!({ "article_id": id.to_json() }), self.timeouts.view)
            .await
    }

    async fn ask(&self, query: &str) -> Result<ToolOutput, SourceError> {
        if !self.supports(ASK_TOOL) {
            return Err(SourceError::Unavailable(ASK_TOOL.into()));
        }
        self.call(ASK_TOOL, json!({ "query": query }), self.timeouts.ask)
            .await
    }
}
