//! The DocumentSource trait: the abstraction over the documentation tool server.
//!
//! The chat loop only needs three remote operations: search for articles,
//! view one article, and (when the server offers it) ask a server-side agent
//! directly. Everything about sessions and transports stays behind this trait.

use async_trait::async_trait;
use crate::article::ArticleId;
use crate::error::SourceError;

/// Tool that searches articles by keyword: `{query}` → `[{article_id, title}]`.
pub const SEARCH_TOOL: &str = "search_articles";

/// Tool that returns one article: `{article_id}` → `{title, content, ...}`.
pub const VIEW_TOOL: &str = "view_article";

/// Tool that answers a question end to end: `{query}` → text.
pub const ASK_TOOL: &str = "ask_agent";

/// The payload of a tool call: one or more text blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub blocks: Vec<String>,
}

impl ToolOutput {
    pub fn new(blocks: Vec<String>) -> Self {
        Self { blocks }
    }

    /// A payload made of a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            blocks: vec![text.into()],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.blocks.first().map(String::as_str)
    }

    /// All blocks joined with newlines.
    pub fn joined(&self) -> String {
        self.blocks.join("\n")
    }

    /// True when no block carries any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.blocks.iter().all(|b| b.trim().is_empty())
    }
}

/// The documentation tool server as seen by the chat loop.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// A human-readable name for logs (e.g. the server's advertised name).
    fn name(&self) -> &str;

    /// Tool names discovered when the session was established.
    fn tool_names(&self) -> Vec<String>;

    /// Whether the server advertised a tool with this name.
    fn supports(&self, tool: &str) -> bool {
        self.tool_names().iter().any(|t| t == tool)
    }

    /// Run the search tool with the user's question.
    async fn search(&self, query: &str) -> Result<ToolOutput, SourceError>;

    /// Fetch one article body.
    async fn view(&self, id: &ArticleId) -> Result<ToolOutput, SourceError>;

    /// Ask the server-side agent for a final answer.
    async fn ask(&self, _query: &str) -> Result<ToolOutput, SourceError> {
        Err(SourceError::Unavailable(ASK_TOOL.into()))
    }
}
