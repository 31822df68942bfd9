//! The Provider trait: the abstraction over the chat-completion endpoint.
//!
//! A Provider knows how to send a list of role-tagged messages to a hosted
//! model and get the first candidate completion back.
//!
//! Implementations: OpenAI-compatible endpoints (Azure OpenAI, proxies),
//! plus scripted fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model or deployment to use (e.g., "gpt-4o")
    pub model: String,

    /// The conversation messages, in order
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

impl ProviderRequest {
    /// A request with the default temperature and no token cap.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The first candidate message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The completion requester calls `complete()` without knowing which
/// endpoint sits behind it. Retries and request timeouts are the
/// implementation's business and apply uniformly to every call.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "azure-openai").
    fn name(&self) -> &str;

    /// The base URL requests are sent to, for diagnostics.
    fn base_url(&self) -> &str;

    /// Send a request and get a complete response.
    ///
    /// A response without any choice is reported as
    /// [`ProviderError::EmptyResponse`].
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", vec![Message::user("hi")]);
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn provider_request_builders() {
        let req = ProviderRequest::new("gpt-4o", vec![])
            .with_temperature(0.0)
            .with_max_tokens(Some(10));
        assert_eq!(req.temperature, 0.0);
        assert_eq!(req.max_tokens, Some(10));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"max_tokens\":10"));
    }
}
