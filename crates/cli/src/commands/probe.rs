//! `docbridge probe`: find the base URL the completion endpoint answers on.

use std::sync::Arc;

use docbridge_core::provider::Provider;
use docbridge_providers::{OpenAiCompatProvider, candidate_base_urls, probe};

use crate::Overrides;

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(overrides)?;

    let Some(base) = config.api_url.as_deref() else {
        return Err("No endpoint configured. Set AZURE_OPENAI_ENDPOINT.".into());
    };
    if !config.has_api_key() {
        eprintln!("WARNING: no API key configured; expect 401 responses.");
    }

    println!("Testing Azure OpenAI connection...");
    println!("  Model: {}", config.model);

    let template = OpenAiCompatProvider::from_config(&config);
    let candidates = candidate_base_urls(base);
    let report = probe(&candidates, &config.model, |url| {
        Arc::new(template.with_base_url(url)) as Arc<dyn Provider>
    })
    .await;

    for attempt in &report.attempts {
        match &attempt.outcome {
            Ok(reply) => {
                println!("  SUCCESS  {}", attempt.base_url);
                println!("           reply: {}", reply.trim());
            }
            Err(e) => {
                let status = e
                    .status_code()
                    .map(|s| format!("HTTP {s}"))
                    .unwrap_or_else(|| "no status".into());
                println!("  FAILED   {} ({status}): {e}", attempt.base_url);
            }
        }
    }

    match report.success() {
        Some(attempt) => {
            println!();
            println!("Use AZURE_OPENAI_ENDPOINT={}", attempt.base_url);
            Ok(())
        }
        None => Err("No candidate base URL answered.".into()),
    }
}
