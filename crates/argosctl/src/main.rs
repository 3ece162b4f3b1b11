use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to command output and the MCP protocol; logs go to stderr
    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    cli.execute().await
}
