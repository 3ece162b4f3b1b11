use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::commands;

/// Argos - AWS RDS and Percona Toolkit diagnostics for MCP clients
#[derive(Parser, Debug)]
#[command(name = "argosctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(long, short = 'c', global = true, env = "ARGOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `argos_tools=debug` (defaults to RUST_LOG)
    #[arg(long, global = true, env = "ARGOS_LOG")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the registered tools to an MCP client over stdin/stdout
    Serve,

    /// List registered tools
    Tools {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Call a single tool and print its result
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl Cli {
    /// Log level used when neither `--log-level` nor `RUST_LOG` is set
    pub fn default_log_level(&self) -> &'static str {
        match self.command {
            Commands::Serve => "info",
            _ => "warn",
        }
    }

    pub async fn execute(self) -> anyhow::Result<()> {
        let config = self.config.as_deref();

        match self.command {
            Commands::Serve => commands::serve::execute(config).await,
            Commands::Tools { output } => commands::tools::execute(config, output).await,
            Commands::Call { ref tool, ref args } => {
                commands::call::execute(config, tool, args).await
            }
            Commands::Version => commands::version::execute().await,
        }
    }
}
