//! Serve command - MCP server on stdin/stdout
//!
//! Runs until the client closes stdin or the process is interrupted.

use std::path::Path;

use anyhow::Result;
use argos_core::VERSION;
use argos_mcp::McpServer;
use tracing::info;

use super::{build_dispatcher, load_config};

pub async fn execute(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let name = config.server.name.clone();
    let dispatcher = build_dispatcher(config)?;

    let server = McpServer::new(dispatcher, name, VERSION);
    tokio::select! {
        result = server.serve_stdio() => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    info!("MCP server stopped");
    Ok(())
}
