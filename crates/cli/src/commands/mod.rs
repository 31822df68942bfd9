pub mod ask;
pub mod chat;
pub mod probe;
pub mod tools;

use std::sync::Arc;

use docbridge_config::AppConfig;
use docbridge_mcp::{ClientInfo, McpDocumentSource, McpError, McpSession, ToolTimeouts};

use crate::Overrides;

/// Load configuration and apply command-line overrides.
pub fn load_config(overrides: &Overrides) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Connect to the documentation server and discover its tools.
///
/// Failure here is fatal for every command that needs the server.
pub async fn connect_source(
    config: &AppConfig,
) -> Result<Arc<McpDocumentSource>, Box<dyn std::error::Error>> {
    match open_source(config).await {
        Ok(source) => Ok(Arc::new(source)),
        Err(e) => {
            eprintln!("Error connecting to MCP server: {e}");
            eprintln!(
                "Make sure the documentation MCP server is running at {}",
                config.mcp.url
            );
            Err(e.into())
        }
    }
}

async fn open_source(config: &AppConfig) -> Result<McpDocumentSource, McpError> {
    let session = Arc::new(
        McpSession::connect(
            &config.mcp.url,
            &ClientInfo::default(),
            config.mcp.connect_timeout(),
        )
        .await?,
    );
    let timeouts = ToolTimeouts {
        search: config.mcp.search_timeout(),
        view: config.mcp.view_timeout(),
        ask: config.mcp.ask_timeout(),
    };
    McpDocumentSource::discover(session.clone(), timeouts)
        .await
        .inspect_err(|_| session.close())
}
