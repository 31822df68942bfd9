//! OpenAI-compatible provider implementation.
//!
//! Works with Azure OpenAI (deployment endpoints and OpenAI-style proxies),
//! OpenAI itself, and any endpoint exposing `POST {base}/chat/completions`.
//!
//! Every request carries the credential twice: as `Authorization: Bearer`
//! and as the Azure-style `api-key` header. The HTTP client applies one
//! request timeout and one retry count to every call.

use async_trait::async_trait;
use docbridge_config::AppConfig;
use docbridge_core::error::ProviderError;
use docbridge_core::message::{Message, Role};
use docbridge_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// An OpenAI-compatible chat-completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OpenAiCompatProvider {
    /// Create a provider with the default timeout (30s) and retry count (2).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(DEFAULT_TIMEOUT),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Build the provider described by the loaded configuration.
    ///
    /// A missing key or URL is tolerated here; calls will fail with an
    /// authentication or connection error instead.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            "azure-openai",
            config.api_url_or_empty(),
            config.api_key.clone().unwrap_or_default(),
        )
        .with_http(config.http.timeout(), config.http.max_retries)
    }

    /// Same credentials, different base URL (used by the connectivity probe).
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            name: self.name.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.clone(),
            client: self.client.clone(),
            max_retries: self.max_retries,
            retry_backoff: self.retry_backoff,
        }
    }

    /// Override the request timeout and retry count.
    pub fn with_http(mut self, timeout: Duration, max_retries: u32) -> Self {
        self.client = build_client(timeout);
        self.max_retries = max_retries;
        self
    }

    /// Override the pause between retry attempts (multiplied by the attempt number).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    /// One HTTP round trip, no retries.
    async fn send_once(
        &self,
        body: &serde_json::Value,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("api-key", self.api_key.as_str())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    ProviderError::NotConfigured(format!(
                        "cannot build a request for '{}': {e}",
                        self.completions_url()
                    ))
                } else if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed {
                status_code: status,
                message: if error_body.is_empty() {
                    "Invalid API key or insufficient permissions".into()
                } else {
                    error_body
                },
            });
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: status,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::into_provider_response(api_response)
    }

    fn into_provider_response(
        api_response: ApiResponse,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let role = match choice.message.role.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            _ => Role::Assistant,
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Message {
                role,
                content: choice.message.content.unwrap_or_default(),
            },
            usage,
            model: api_response.model,
        })
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

#[async_trait]
impl docbridge_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request);
        let attempts = self.max_retries + 1;

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let mut attempt = 1;
        loop {
            match self.send_once(&body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        provider = %self.name,
                        attempt,
                        total = attempts,
                        error = %e,
                        "Completion attempt failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
