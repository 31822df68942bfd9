//! Context Aggregator: search, pick the top articles, fetch their bodies.
//!
//! # Flow
//!
//! 1. Call the search tool with the raw question (bounded by the search timeout)
//! 2. Parse the result into ranked articles
//! 3. Keep the first `max_articles`, in rank order
//! 4. Fetch each body with the view tool, one after another
//! 5. Concatenate the bodies under `--- Article: <title> ---` headers
//!
//! A failed view only loses that one article.

use std::sync::Arc;
use std::time::Duration;

use docbridge_config::AppConfig;
use docbridge_core::article::{Article, Context};
use docbridge_core::error::SourceError;
use docbridge_core::source::{DocumentSource, ToolOutput};
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ARTICLES: usize = 3;
const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_VIEW_TIMEOUT: Duration = Duration::from_secs(60);

/// Why no context could be built for a turn.
///
/// "No results" is not an error: it yields an empty [`Context`].
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error(
        "Search timed out after {timeout_secs}s. The documentation server may still be indexing; try again in a moment."
    )]
    SearchTimedOut { timeout_secs: u64 },

    #[error("Search failed: {0}")]
    SearchFailed(SourceError),

    #[error("Could not read search results: {0}")]
    SearchParse(String),
}

pub struct ContextAggregator {
    source: Arc<dyn DocumentSource>,
    max_articles: usize,
    search_timeout: Duration,
    view_timeout: Duration,
}

impl ContextAggregator {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            source,
            max_articles: DEFAULT_MAX_ARTICLES,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            view_timeout: DEFAULT_VIEW_TIMEOUT,
        }
    }

    pub fn from_config(source: Arc<dyn DocumentSource>, config: &AppConfig) -> Self {
        Self::new(source)
            .with_max_articles(config.max_articles)
            .with_timeouts(config.mcp.search_timeout(), config.mcp.view_timeout())
    }

    pub fn with_max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = max_articles.max(1);
        self
    }

    pub fn with_timeouts(mut self, search: Duration, view: Duration) -> Self {
        self.search_timeout = search;
        self.view_timeout = view;
        self
    }

    /// Build the context for one question.
    pub async fn aggregate(&self, question: &str) -> Result<Context, RetrievalError> {
        let articles = self.search(question).await?;

        if articles.is_empty() {
            info!("Search returned no articles");
            return Ok(Context::empty());
        }

        let selected: Vec<Article> = articles.into_iter().take(self.max_articles).collect();
        debug!(count = selected.len(), "Fetching article bodies");

        let mut context = Context::empty();
        for article in &selected {
            match self.view(article).await {
                Some(body) => context.push_article(&article.title, &body),
                None => continue,
            }
        }

        Ok(context)
    }

    async fn search(&self, question: &str) -> Result<Vec<Article>, RetrievalError> {
        let output = match tokio::time::timeout(self.search_timeout, self.source.search(question))
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(SourceError::Timeout { timeout_secs, .. })) => {
                warn!(timeout_secs, "Search timed out at the tool server");
                return Err(RetrievalError::SearchTimedOut { timeout_secs });
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Search failed");
                return Err(RetrievalError::SearchFailed(e));
            }
            Err(_) => {
                let timeout_secs = self.search_timeout.as_secs();
                warn!(timeout_secs, "Search timed out");
                return Err(RetrievalError::SearchTimedOut { timeout_secs });
            }
        };

        let articles = parse_search_results(&output).map_err(|reason| {
            warn!(reason = %reason, "Search results were not structured data");
            RetrievalError::SearchParse(reason)
        })?;

        info!(found = articles.len(), "Search complete");
        Ok(articles)
    }

    /// Fetch one body. `None` means the article is skipped.
    async fn view(&self, article: &Article) -> Option<String> {
        match tokio::time::timeout(self.view_timeout, self.source.view(&article.id)).await {
            Ok(Ok(output)) => Some(extract_view_content(&output.joined())),
            Ok(Err(e)) => {
                warn!(article_id = %article.id, error = %e, "Skipping article: view failed");
                None
            }
            Err(_) => {
                warn!(
                    article_id = %article.id,
                    timeout_secs = self.view_timeout.as_secs(),
                    "Skipping article: view timed out"
                );
                None
            }
        }
    }
}

/// Turn a search payload into ranked articles.
///
/// Accepted shapes: an array of article objects, an object holding an
/// `articles` or `results` array, or one article object per content block.
/// A payload with no text at all means no results.
pub fn parse_search_results(output: &ToolOutput) -> Result<Vec<Article>, String> {
    if output.is_blank() {
        return Ok(Vec::new());
    }

    let mut articles = Vec::new();
    for block in output.blocks.iter().filter(|b| !b.trim().is_empty()) {
        let value: serde_json::Value =
            serde_json::from_str(block).map_err(|e| format!("not JSON ({e})"))?;
        collect_articles(value, &mut articles)?;
    }

    Ok(articles)
}

fn collect_articles(value: serde_json::Value, out: &mut Vec<Article>) -> Result<(), String> {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                out.push(to_article(item)?);
            }
            Ok(())
        }
        serde_json::Value::Object(mut map) => {
            for key in ["articles", "results"] {
                if let Some(list @ serde_json::Value::Array(_)) = map.remove(key) {
                    return collect_articles(list, out);
                }
            }
            out.push(to_article(serde_json::Value::Object(map))?);
            Ok(())
        }
        serde_json::Value::Null => Ok(()),
        other => Err(format!("unexpected search payload: {other}")),
    }
}

fn to_article(value: serde_json::Value) -> Result<Article, String> {
    serde_json::from_value(value).map_err(|e| format!("not an article ({e})"))
}

/// The body of a view payload.
///
/// The `content` string of a JSON object when there is one; the raw text
/// otherwise.
pub fn extract_view_content(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => match map.get("content") {
            Some(serde_json::Value::String(content)) => content.clone(),
            _ => raw.to_string(),
        },
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeSource;
    use docbridge_core::article::ArticleId;
    use docbridge_core::source::{SEARCH_TOOL, VIEW_TOOL};

    fn aggregator(source: &Arc<FakeSource>) -> ContextAggregator {
        ContextAggregator::new(source.clone() as Arc<dyn DocumentSource>)
    }

    // ── Search parsing ──────────────────────────────────────────────────

    #[test]
    fn parses_plain_array() {
        let out = ToolOutput::text(r#"[{"article_id": 1, "title": "A"}, {"article_id": 2, "title": "B"}]"#);
        let articles = parse_search_results(&out).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].id, ArticleId::Number(1));
        assert_eq!(articles[1].title, "B");
    }

    #[test]
    fn parses_wrapped_results() {
        let out = ToolOutput::text(r#"{"count": 1, "results": [{"id": "kb-1", "title": "Setup"}]}"#);
        let articles = parse_search_results(&out).unwrap();
        assert_eq!(articles, vec![Article::new("kb-1", "Setup")]);

        let out = ToolOutput::text(r#"{"articles": []}"#);
        assert!(parse_search_results(&out).unwrap().is_empty());
    }

    #[test]
    fn parses_one_article_per_block() {
        let out = ToolOutput::new(vec![
            r#"{"article_id": 5, "title": "First"}"#.into(),
            r#"{"article_id": 9, "title": "Second"}"#.into(),
        ]);
        let articles = parse_search_results(&out).unwrap();
        let ids: Vec<_> = articles.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec![ArticleId::Number(5), ArticleId::Number(9)]);
    }

    #[test]
    fn empty_payload_means_no_results() {
        assert!(parse_search_results(&ToolOutput::default()).unwrap().is_empty());
        assert!(parse_search_results(&ToolOutput::text("[]")).unwrap().is_empty());
    }

    #[test]
    fn prose_is_a_parse_error() {
        let err = parse_search_results(&ToolOutput::text("Error: wiki offline")).unwrap_err();
        assert!(err.contains("not JSON"));
        assert!(parse_search_results(&ToolOutput::text(r#"[{"title": "no id"}]"#)).is_err());
    }

    // ── View content ────────────────────────────────────────────────────

    #[test]
    fn view_content_field_is_extracted() {
        let raw = r#"{"article_id": 1, "title": "A", "content": "foo", "revision": 3, "tags": []}"#;
        assert_eq!(extract_view_content(raw), "foo");
    }

    #[test]
    fn view_falls_back_to_raw_text() {
        assert_eq!(extract_view_content("plain body"), "plain body");
        assert_eq!(
            extract_view_content(r#"{"title": "no content field"}"#),
            r#"{"title": "no content field"}"#
        );
        assert_eq!(extract_view_content(r#"{"content": 42}"#), r#"{"content": 42}"#);
    }

    // ── Aggregation ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn zero_results_is_empty_context_without_views() {
        let source = Arc::new(FakeSource::searching("[]"));
        let context = aggregator(&source).aggregate("anything").await.unwrap();
        assert!(context.is_blank());
        assert_eq!(source.count(SEARCH_TOOL), 1);
        assert_eq!(source.count(VIEW_TOOL), 0);
    }

    #[tokio::test]
    async fn only_first_three_results_are_fetched_in_order() {
        let source = Arc::new(FakeSource::searching(
            r#"[{"article_id": 1, "title": "One"}, {"article_id": 2, "title": "Two"},
                {"article_id": 3, "title": "Three"}, {"article_id": 4, "title": "Four"},
                {"article_id": 5, "title": "Five"}]"#,
        ));
        let context = aggregator(&source).aggregate("q").await.unwrap();

        assert_eq!(
            source.calls(),
            vec!["search_articles:q", "view_article:1", "view_article:2", "view_article:3"]
        );
        let text = context.as_str();
        let one = text.find("--- Article: One ---").unwrap();
        let two = text.find("--- Article: Two ---").unwrap();
        let three = text.find("--- Article: Three ---").unwrap();
        assert!(one < two && two < three);
        assert!(text.contains("body 1") && text.contains("body 3"));
        assert!(!text.contains("Four"));
    }

    #[tokio::test]
    async fn max_articles_is_configurable() {
        let source = Arc::new(FakeSource::searching(
            r#"[{"article_id": 1, "title": "One"}, {"article_id": 2, "title": "Two"}]"#,
        ));
        aggregator(&source)
            .with_max_articles(1)
            .aggregate("q")
            .await
            .unwrap();
        assert_eq!(source.count(VIEW_TOOL), 1);
    }

    #[tokio::test]
    async fn unparseable_view_is_used_verbatim() {
        let source = Arc::new(
            FakeSource::searching(r#"[{"article_id": 1, "title": "A"}, {"article_id": 2, "title": "B"}]"#)
                .with_view("1", Ok(ToolOutput::text("<html>raw page</html>"))),
        );
        let context = aggregator(&source).aggregate("q").await.unwrap();
        assert!(context.as_str().contains("--- Article: A ---\n<html>raw page</html>"));
        assert!(context.as_str().contains("--- Article: B ---\nbody 2"));
    }

    #[tokio::test]
    async fn failed_view_skips_only_that_article() {
        let source = Arc::new(
            FakeSource::searching(r#"[{"article_id": 1, "title": "A"}, {"article_id": 2, "title": "B"}]"#)
                .with_view(
                    "1",
                    Err(SourceError::ToolFailed {
                        tool: VIEW_TOOL.into(),
                        message: "not found".into(),
                    }),
                ),
        );
        let context = aggregator(&source).aggregate("q").await.unwrap();
        assert!(!context.as_str().contains("--- Article: A ---"));
        assert!(context.as_str().contains("--- Article: B ---"));
        assert_eq!(source.count(VIEW_TOOL), 2);
    }

    #[tokio::test]
    async fn search_failure_is_distinguishable() {
        let source = Arc::new(FakeSource::searching("[]").with_search(Err(
            SourceError::Transport("connection reset".into()),
        )));
        let err = aggregator(&source).aggregate("q").await.unwrap_err();
        assert!(matches!(err, RetrievalError::SearchFailed(_)));

        let source = Arc::new(FakeSource::searching("not json"));
        let err = aggregator(&source).aggregate("q").await.unwrap_err();
        assert!(matches!(err, RetrievalError::SearchParse(_)));
    }

    #[tokio::test]
    async fn server_side_timeout_is_a_search_timeout() {
        let source = Arc::new(FakeSource::searching("[]").with_search(Err(SourceError::Timeout {
            tool: SEARCH_TOOL.into(),
            timeout_secs: 180,
        })));
        let err = aggregator(&source).aggregate("q").await.unwrap_err();
        assert!(matches!(err, RetrievalError::SearchTimedOut { timeout_secs: 180 }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_search_times_out() {
        let source = Arc::new(FakeSource::searching("[]").with_delay(Duration::from_secs(600)));
        let err = aggregator(&source)
            .with_timeouts(Duration::from_secs(180), Duration::from_secs(60))
            .aggregate("q")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::SearchTimedOut { timeout_secs: 180 }));
        assert!(err.to_string().contains("timed out"));
    }
}
