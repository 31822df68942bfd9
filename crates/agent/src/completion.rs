//! Completion Requester: one grounded question to the completion endpoint.
//!
//! Never fails. Empty context, empty replies and endpoint errors all come
//! back as text the loop can print.

use std::sync::Arc;

use docbridge_config::AppConfig;
use docbridge_core::article::Context;
use docbridge_core::error::ProviderError;
use docbridge_core::message::Message;
use docbridge_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

use crate::pipeline::TurnOutcome;

/// Persona for every grounded request.
pub const SYSTEM_PROMPT: &str = "You are a documentation assistant. Answer the user's question \
using the documentation context provided. If the context does not cover the question, say so \
plainly instead of guessing.";

/// Returned instead of calling the model when retrieval found nothing.
pub const NO_DOCUMENTATION_ADVISORY: &str = "No documentation found for this question. \
An answer now would rely on general knowledge rather than the documentation, so none was \
requested. Try rephrasing the question with terms the documentation is likely to use.";

/// Returned when the endpoint answers without any text.
pub const EMPTY_RESPONSE_DIAGNOSTIC: &str = "The model returned an empty response.";

pub struct CompletionRequester {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl CompletionRequester {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Answer `question` from `context`, or explain why there is no answer.
    pub async fn complete(&self, question: &str, context: &Context) -> TurnOutcome {
        if context.is_blank() {
            debug!("Empty context, not calling the model");
            return TurnOutcome::Advisory(NO_DOCUMENTATION_ADVISORY.to_string());
        }

        let request = ProviderRequest::new(&self.model, build_messages(question, context))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            context_chars = context.as_str().len(),
            "Requesting completion"
        );

        match self.provider.complete(request).await {
            Ok(response) if response.message.content.trim().is_empty() => {
                warn!("Completion endpoint returned no text");
                TurnOutcome::Diagnostic(EMPTY_RESPONSE_DIAGNOSTIC.to_string())
            }
            Ok(response) => TurnOutcome::Answer(response.message.content),
            Err(ProviderError::EmptyResponse) => {
                warn!("Completion endpoint returned no choices");
                TurnOutcome::Diagnostic(EMPTY_RESPONSE_DIAGNOSTIC.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Completion request failed");
                TurnOutcome::Diagnostic(describe_failure(&e, self.provider.base_url()))
            }
        }
    }
}

/// The two messages of a grounded request: persona, then context and question.
pub fn build_messages(question: &str, context: &Context) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(format!("Context:\n{context}\n\nQuestion: {question}")),
    ]
}

/// Map an endpoint failure to something a user can act on.
///
/// The HTTP status decides when there is one. Otherwise the error text is
/// searched for status words, ignoring any URL it quotes.
pub fn describe_failure(error: &ProviderError, endpoint: &str) -> String {
    if let ProviderError::NotConfigured(reason) = error {
        return format!(
            "No usable completion endpoint ({reason}). Set AZURE_OPENAI_ENDPOINT to the \
endpoint base URL."
        );
    }

    let failure = match error.status_code() {
        Some(404) => Failure::NotFound,
        Some(status @ (401 | 403)) => Failure::Rejected(status),
        Some(_) => Failure::Other,
        None => classify_text(&error.to_string()),
    };

    match failure {
        Failure::NotFound => format!(
            "Endpoint not found (404) at {endpoint}. The endpoint path is probably wrong: \
check for a missing or extra '/v1' or a wrong deployment name. \
`docbridge probe` tries the common variants."
        ),
        Failure::Rejected(401) => "Unauthorized (401): the endpoint rejected the credentials. \
Check your API key (AZURE_OPENAI_API_KEY)."
            .to_string(),
        Failure::Rejected(status) => format!(
            "Forbidden ({status}): the endpoint rejected the credentials. \
Check your API key (AZURE_OPENAI_API_KEY) and its access to this deployment."
        ),
        Failure::Other => format!("Error calling the completion endpoint: {error}"),
    }
}

enum Failure {
    NotFound,
    Rejected(u16),
    Other,
}

fn classify_text(text: &str) -> Failure {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|piece| !piece.contains("://"))
        .flat_map(|piece| piece.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|word| !word.is_empty())
        .collect();
    let has = |word: &str| words.iter().any(|w| *w == word);

    if has("404") || has("DeploymentNotFound") || text.contains("Not Found") {
        Failure::NotFound
    } else if has("401") || has("Unauthorized") {
        Failure::Rejected(401)
    } else {
        Failure::Other
    }
}
