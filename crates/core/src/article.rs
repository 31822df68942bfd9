//! Articles and the context block built from them.
//!
//! An [`Article`] is produced by the search tool (id and title only) and
//! completed by the view tool (content). Articles live for a single turn;
//! once their bodies are folded into a [`Context`] they are dropped.

use serde::{Deserialize, Serialize};

/// Identifier of a documentation article, as issued by the tool server.
///
/// Passed back to the view tool exactly as it was received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleId {
    Number(i64),
    Text(String),
}

impl ArticleId {
    /// The identifier as a JSON value for tool arguments.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArticleId::Number(n) => serde_json::Value::from(*n),
            ArticleId::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl From<i64> for ArticleId {
    fn from(n: i64) -> Self {
        ArticleId::Number(n)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        ArticleId::Text(s.to_string())
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArticleId::Number(n) => write!(f, "{n}"),
            ArticleId::Text(s) => f.write_str(s),
        }
    }
}

/// A documentation article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Identifier used for the view call
    #[serde(alias = "article_id", alias = "ixWikiPage")]
    pub id: ArticleId,

    /// Headline shown in the context separator
    #[serde(default, alias = "sHeadline", alias = "name")]
    pub title: String,

    /// Body, filled in by the view call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Article {
    pub fn new(id: impl Into<ArticleId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: None,
        }
    }
}

/// Concatenated article bodies handed to the completion requester.
///
/// Each body is preceded by a `--- Article: <title> ---` header line.
/// An empty context is a valid state meaning "no documentation found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context(String);

impl Context {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append one article body under its title header.
    pub fn push_article(&mut self, title: &str, content: &str) {
        self.0.push_str(&separator(title));
        self.0.push('\n');
        self.0.push_str(content);
        self.0.push_str("\n\n");
    }

    /// True when there is nothing but whitespace to ground an answer on.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Context {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The header line placed before each article body.
pub fn separator(title: &str) -> String {
    format!("--- Article: {title} ---")
}
