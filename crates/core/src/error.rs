//! Error types for the docbridge domain.
//!
//! Each collaborator (completion endpoint, tool server) has its own
//! `thiserror` enum. Nothing here wraps both; callers turn failures into
//! user-facing text at the turn boundary.

use thiserror::Error;

/// Failures of the chat-completion endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed (status: {status_code}): {message}")]
    AuthenticationFailed { status_code: u16, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned no choices")]
    EmptyResponse,
}

impl ProviderError {
    /// HTTP status carried by this error, when the endpoint answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } | Self::AuthenticationFailed { status_code, .. } => {
                Some(*status_code)
            }
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether a fresh attempt of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// Failures talking to the documentation tool server.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Tool server unreachable: {0}")]
    Transport(String),

    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Tool '{tool}' timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("Tool '{0}' is not offered by the server")]
    Unavailable(String),
}
