//! Shared fakes for the agent tests.

use async_trait::async_trait;
use docbridge_core::article::ArticleId;
use docbridge_core::error::{ProviderError, SourceError};
use docbridge_core::message::Message;
use docbridge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use docbridge_core::source::{ASK_TOOL, DocumentSource, SEARCH_TOOL, ToolOutput, VIEW_TOOL};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A documentation source with scripted tool results.
///
/// Every call is recorded as `"<tool>:<argument>"`.
pub struct FakeSource {
    tools: Vec<String>,
    search: Result<ToolOutput, SourceError>,
    views: HashMap<String, Result<ToolOutput, SourceError>>,
    ask: Result<ToolOutput, SourceError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    /// A search + view server whose search returns `search_body`.
    pub fn searching(search_body: &str) -> Self {
        Self {
            tools: vec![SEARCH_TOOL.into(), VIEW_TOOL.into()],
            search: Ok(ToolOutput::text(search_body)),
            views: HashMap::new(),
            ask: Err(SourceError::Unavailable(ASK_TOOL.into())),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A server that only offers the `ask_agent` tool.
    pub fn asking(answer: Result<ToolOutput, SourceError>) -> Self {
        Self {
            tools: vec![ASK_TOOL.into()],
            search: Err(SourceError::Unavailable(SEARCH_TOOL.into())),
            views: HashMap::new(),
            ask: answer,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_search(mut self, result: Result<ToolOutput, SourceError>) -> Self {
        self.search = result;
        self
    }

    pub fn with_view(mut self, id: &str, result: Result<ToolOutput, SourceError>) -> Self {
        self.views.insert(id.to_string(), result);
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Sleep this long before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(&format!("{tool}:")))
            .count()
    }

    async fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.clone()
    }

    async fn search(&self, query: &str) -> Result<ToolOutput, SourceError> {
        self.record(format!("{SEARCH_TOOL}:{query}")).await;
        self.search.clone()
    }

    async fn view(&self, id: &ArticleId) -> Result<ToolOutput, SourceError> {
        self.record(format!("{VIEW_TOOL}:{id}")).await;
        self.views
            .get(&id.to_string())
            .cloned()
            .unwrap_or_else(|| Ok(ToolOutput::text(format!("{{\"content\": \"body {id}\"}}"))))
    }

    async fn ask(&self, query: &str) -> Result<ToolOutput, SourceError> {
        self.record(format!("{ASK_TOOL}:{query}")).await;
        self.ask.clone()
    }
}

/// A provider that returns scripted results in order and records every request.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    base_url: String,
    results: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            base_url: "https://example.openai.azure.com/openai".into(),
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers once with `text`.
    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(make_text_response(text))])
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut results = self.results.lock().unwrap();
        assert!(!results.is_empty(), "ScriptedProvider: no more results");
        results.remove(0)
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
