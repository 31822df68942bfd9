//! `docbridge chat`: the interactive question loop.

use std::sync::Arc;

use docbridge_agent::{ChatPipeline, select_mode};
use docbridge_core::provider::Provider;
use docbridge_core::source::DocumentSource;
use docbridge_providers::OpenAiCompatProvider;

use crate::Overrides;

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(overrides)?;

    println!();
    println!("--- docbridge ---");
    println!("Connecting to documentation server at {} ...", config.mcp.url);

    let source = super::connect_source(&config).await?;
    println!("Connected to {}.", source.name());
    println!("Available tools: {}", source.tool_names().join(", "));

    let selection = select_mode(source.as_ref(), overrides.mode);
    for warning in &selection.warnings {
        eprintln!("WARNING: {warning}");
    }

    if !config.has_api_key() {
        eprintln!("WARNING: no API key configured; set AZURE_OPENAI_API_KEY to use the completion endpoint.");
    }

    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(&config));
    let pipeline = ChatPipeline::from_config(
        selection.mode,
        source.clone() as Arc<dyn DocumentSource>,
        provider,
        &config,
    );
    println!("Mode: {}  Model: {}", pipeline.mode(), config.model);
    println!("Type 'exit' or press Ctrl+C to quit.");

    let lines = docbridge_agent::spawn_line_reader(std::io::stdin());
    let mut stdout = std::io::stdout();
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let result = docbridge_agent::run(&pipeline, lines, &mut stdout, interrupt).await;
    source.session().close();
    result?;

    Ok(())
}
