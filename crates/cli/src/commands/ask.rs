//! `docbridge ask`: answer a single question and exit.

use std::sync::Arc;

use docbridge_agent::repl::print_outcome;
use docbridge_agent::{ChatPipeline, TurnOutcome, select_mode};
use docbridge_core::provider::Provider;
use docbridge_core::source::DocumentSource;
use docbridge_providers::OpenAiCompatProvider;

use crate::Overrides;

pub async fn run(overrides: &Overrides, question: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(overrides)?;
    let source = super::connect_source(&config).await?;

    let selection = select_mode(source.as_ref(), overrides.mode);
    for warning in &selection.warnings {
        eprintln!("WARNING: {warning}");
    }

    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(&config));
    let pipeline = ChatPipeline::from_config(
        selection.mode,
        source.clone() as Arc<dyn DocumentSource>,
        provider,
        &config,
    );

    let outcome = pipeline.answer(question).await;
    source.session().close();

    print_outcome(&mut std::io::stdout(), &outcome)?;
    if let TurnOutcome::Diagnostic(text) = outcome {
        return Err(text.into());
    }
    Ok(())
}
