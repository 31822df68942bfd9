//! `docbridge tools`: list the documentation server's tools.

use docbridge_core::source::{ASK_TOOL, SEARCH_TOOL, VIEW_TOOL};

use crate::Overrides;

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(overrides)?;
    let source = super::connect_source(&config).await?;

    let server = source.session().server_info();
    println!(
        "{} {} at {}",
        server.name.as_deref().unwrap_or("MCP server"),
        server.version.as_deref().unwrap_or(""),
        config.mcp.url
    );
    println!();

    for tool in source.tools() {
        let used = [SEARCH_TOOL, VIEW_TOOL, ASK_TOOL].contains(&tool.name.as_str());
        let marker = if used { "*" } else { " " };
        let summary = tool.description.lines().next().unwrap_or("").trim();
        println!("  {marker} {:<20} {summary}", tool.name);
    }
    println!();
    println!("  * used by docbridge");

    source.session().close();
    Ok(())
}
