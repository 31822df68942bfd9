//! One chat turn, in whichever mode the session settled on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbridge_config::AppConfig;
use docbridge_core::provider::Provider;
use docbridge_core::source::{ASK_TOOL, DocumentSource, SEARCH_TOOL, VIEW_TOOL};
use tracing::{debug, info, warn};

use crate::aggregator::ContextAggregator;
use crate::completion::CompletionRequester;
use crate::repl::TurnHandler;

/// Printed when the server-side agent answers with nothing.
pub const NO_AGENT_CONTENT: &str = "No response content from agent.";

const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(300);

/// What a turn produced. Every turn yields exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Text from the model or the server-side agent.
    Answer(String),
    /// Nothing went wrong, but there is nothing to answer from.
    Advisory(String),
    /// Something went wrong during the turn.
    Diagnostic(String),
}

impl TurnOutcome {
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Answer(t) | TurnOutcome::Advisory(t) | TurnOutcome::Diagnostic(t) => t,
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, TurnOutcome::Answer(_))
    }
}

/// How questions are answered for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// The server's `ask_agent` tool answers directly.
    Ask,
    /// Search, view, then the completion endpoint.
    Pipeline,
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatMode::Ask => f.write_str("ask"),
            ChatMode::Pipeline => f.write_str("pipeline"),
        }
    }
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModePreference {
    /// Ask when the server offers `ask_agent`, pipeline otherwise.
    #[default]
    Auto,
    Ask,
    Pipeline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSelection {
    pub mode: ChatMode,
    /// Startup warnings about missing tools; never fatal.
    pub warnings: Vec<String>,
}

/// Pick the session's mode from the tools the server advertised.
pub fn select_mode(source: &dyn DocumentSource, preference: ModePreference) -> ModeSelection {
    let has_ask = source.supports(ASK_TOOL);
    let has_retrieval = source.supports(SEARCH_TOOL) && source.supports(VIEW_TOOL);

    let mode = match preference {
        ModePreference::Ask => ChatMode::Ask,
        ModePreference::Pipeline => ChatMode::Pipeline,
        ModePreference::Auto if has_ask => ChatMode::Ask,
        ModePreference::Auto => ChatMode::Pipeline,
    };

    let mut warnings = Vec::new();
    if !has_ask && preference != ModePreference::Pipeline {
        warnings.push(format!(
            "'{ASK_TOOL}' tool not found on the documentation server."
        ));
    }
    if mode == ChatMode::Pipeline && !has_retrieval {
        warnings.push(format!(
            "'{SEARCH_TOOL}'/'{VIEW_TOOL}' tools not found on the documentation server; \
questions will fail until they are available."
        ));
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    info!(mode = %mode, "Chat mode selected");

    ModeSelection { mode, warnings }
}

/// Answers one question at a time.
pub struct ChatPipeline {
    mode: ChatMode,
    source: Arc<dyn DocumentSource>,
    aggregator: ContextAggregator,
    requester: CompletionRequester,
    ask_timeout: Duration,
}

impl ChatPipeline {
    pub fn new(
        mode: ChatMode,
        source: Arc<dyn DocumentSource>,
        aggregator: ContextAggregator,
        requester: CompletionRequester,
    ) -> Self {
        Self {
            mode,
            source,
            aggregator,
            requester,
            ask_timeout: DEFAULT_ASK_TIMEOUT,
        }
    }

    /// Wire the pipeline from configuration.
    pub fn from_config(
        mode: ChatMode,
        source: Arc<dyn DocumentSource>,
        provider: Arc<dyn Provider>,
        config: &AppConfig,
    ) -> Self {
        let aggregator = ContextAggregator::from_config(source.clone(), config);
        let requester = CompletionRequester::from_config(provider, config);
        Self::new(mode, source, aggregator, requester).with_ask_timeout(config.mcp.ask_timeout())
    }

    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Run one turn to completion.
    pub async fn answer(&self, question: &str) -> TurnOutcome {
        debug!(mode = %self.mode, question, "Handling turn");
        match self.mode {
            ChatMode::Ask => self.ask(question).await,
            ChatMode::Pipeline => match self.aggregator.aggregate(question).await {
                Ok(context) => self.requester.complete(question, &context).await,
                Err(e) => TurnOutcome::Diagnostic(e.to_string()),
            },
        }
    }

    async fn ask(&self, question: &str) -> TurnOutcome {
        match tokio::time::timeout(self.ask_timeout, self.source.ask(question)).await {
            Ok(Ok(output)) => match output.first_text() {
                Some(text) if !text.trim().is_empty() => TurnOutcome::Answer(text.to_string()),
                _ => TurnOutcome::Advisory(NO_AGENT_CONTENT.to_string()),
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Agent call failed");
                TurnOutcome::Diagnostic(format!("Error asking agent: {e}"))
            }
            Err(_) => {
                warn!(timeout_secs = self.ask_timeout.as_secs(), "Agent call timed out");
                TurnOutcome::Diagnostic(format!(
                    "Error asking agent: no answer within {}s",
                    self.ask_timeout.as_secs()
                ))
            }
        }
    }
}

#[async_trait]
impl TurnHandler for ChatPipeline {
    async fn handle_turn(&self, question: &str) -> TurnOutcome {
        self.answer(question).await
    }
}
