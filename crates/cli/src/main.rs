//! docbridge CLI: the main entry point.
//!
//! Commands:
//! - `chat`   Interactive question loop (default)
//! - `ask`    Answer a single question and exit
//! - `tools`  List the tools the documentation server offers
//! - `probe`  Check which completion base URL answers

use clap::{Parser, Subcommand, ValueEnum};
use docbridge_agent::ModePreference;
use docbridge_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "docbridge",
    about = "docbridge: ask questions of your documentation from the terminal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Documentation server SSE URL (overrides config and DOCBRIDGE_MCP_URL)
    #[arg(long, global = true)]
    mcp_url: Option<String>,

    /// Model or deployment name (overrides config and AZURE_OPENAI_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// How questions are answered
    #[arg(long, value_enum, global = true, default_value_t = ModeArg::Auto)]
    mode: ModeArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask questions interactively until 'exit'
    Chat,

    /// Answer one question and exit
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// List the tools the documentation server offers
    Tools,

    /// Try the configured completion endpoint with and without '/v1'
    Probe,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Use the server's ask_agent tool when it has one
    Auto,
    /// Always use the server's ask_agent tool
    Ask,
    /// Always search, fetch articles, and call the completion endpoint
    Pipeline,
}

impl From<ModeArg> for ModePreference {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => ModePreference::Auto,
            ModeArg::Ask => ModePreference::Ask,
            ModeArg::Pipeline => ModePreference::Pipeline,
        }
    }
}

/// Command-line values that win over the loaded configuration.
pub struct Overrides {
    pub mcp_url: Option<String>,
    pub model: Option<String>,
    pub mode: ModePreference,
}

impl Overrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.mcp_url {
            config.mcp.url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr and default to warnings so they stay out of the chat.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        mcp_url: cli.mcp_url,
        model: cli.model,
        mode: cli.mode.into(),
    };

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => commands::chat::run(&overrides).await?,
        Commands::Ask { question } => commands::ask::run(&overrides, &question.join(" ")).await?,
        Commands::Tools => commands::tools::run(&overrides).await?,
        Commands::Probe => commands::probe::run(&overrides).await?,
    }

    Ok(())
}
