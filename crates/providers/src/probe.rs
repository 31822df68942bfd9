//! Connectivity probe over candidate base URLs.
//!
//! Proxies in front of Azure OpenAI disagree about whether the `/v1` suffix
//! belongs in the base URL. The probe sends a tiny request through each
//! candidate and reports which one answered. It is a one-shot diagnostic,
//! never part of the chat loop.

use docbridge_core::error::ProviderError;
use docbridge_core::message::Message;
use docbridge_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{info, warn};

/// Prompt sent through each candidate.
pub const PROBE_PROMPT: &str = "Say hello";

/// Token cap for the probe request.
pub const PROBE_MAX_TOKENS: u32 = 10;

/// The configured base URL, then the same URL with a `/v1` suffix.
///
/// No candidate is repeated when the base already ends in `/v1`.
pub fn candidate_base_urls(base: &str) -> Vec<String> {
    let trimmed = base.trim_end_matches('/');
    let mut candidates = vec![trimmed.to_string()];
    if !trimmed.ends_with("/v1") {
        candidates.push(format!("{trimmed}/v1"));
    }
    candidates
}

/// One attempt against one base URL.
#[derive(Debug, Clone)]
pub struct ProbeAttempt {
    pub base_url: String,
    pub outcome: Result<String, ProviderError>,
}

/// Every attempt made, in order. Probing stops at the first success.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    pub attempts: Vec<ProbeAttempt>,
}

impl ProbeReport {
    /// The attempt that succeeded, if any.
    pub fn success(&self) -> Option<&ProbeAttempt> {
        self.attempts.iter().find(|a| a.outcome.is_ok())
    }
}

/// Send the probe prompt through each candidate until one answers.
///
/// `connect` builds a provider for a base URL; it is the seam that lets the
/// probe run against fakes.
pub async fn probe<F>(candidates: &[String], model: &str, connect: F) -> ProbeReport
where
    F: Fn(&str) -> Arc<dyn Provider>,
{
    let mut report = ProbeReport::default();

    for (i, base_url) in candidates.iter().enumerate() {
        info!(
            base_url = %base_url,
            attempt = i + 1,
            total = candidates.len(),
            "Probe: trying base URL"
        );

        let provider = connect(base_url);
        let request = ProviderRequest::new(model, vec![Message::user(PROBE_PROMPT)])
            .with_max_tokens(Some(PROBE_MAX_TOKENS));

        let outcome = provider
            .complete(request)
            .await
            .map(|response| response.message.content);

        let succeeded = outcome.is_ok();
        if let Err(e) = &outcome {
            warn!(base_url = %base_url, error = %e, "Probe: attempt failed");
        }

        report.attempts.push(ProbeAttempt {
            base_url: base_url.clone(),
            outcome,
        });

        if succeeded {
            break;
        }
    }

    report
}
