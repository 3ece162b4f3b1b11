//! Argos Tools - built-in tool plugins
//!
//! Every plugin is an independent constructor returning one
//! [`ToolDescriptor`]. The composition root calls [`build_registry`], which
//! walks [`builtin_plugins`] in order and registers what each one returns.
//!
//! # Example
//!
//! ```rust,ignore
//! use argos_tools::{build_registry, PluginEnv};
//!
//! let env = PluginEnv::from_config(config);
//! let dispatcher = build_registry(&env)?.into_dispatcher();
//! ```

pub mod runner;
pub mod sink;
pub mod tools;

use std::sync::Arc;

use argos_core::{ArgosConfig, ArgosResult, ToolDescriptor, ToolRegistry};
use tracing::{info, warn};

pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};

/// Builds one tool descriptor
pub type PluginConstructor = fn(&PluginEnv) -> ToolDescriptor;

/// What plugin constructors get to work with
#[derive(Clone)]
pub struct PluginEnv {
    pub config: Arc<ArgosConfig>,
    pub runner: Arc<dyn CommandRunner>,
}

impl PluginEnv {
    pub fn new(config: ArgosConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    /// Environment backed by real child processes
    pub fn from_config(config: ArgosConfig) -> Self {
        Self::new(config, Arc::new(ProcessRunner::new()))
    }
}

/// A built-in plugin and the executable it depends on
pub struct Plugin {
    pub name: &'static str,
    pub executable: fn(&ArgosConfig) -> String,
    pub build: PluginConstructor,
}

fn aws_cli(config: &ArgosConfig) -> String {
    config.aws.cli_path.clone()
}

fn pt_query_digest(_: &ArgosConfig) -> String {
    tools::percona::QUERY_DIGEST_BIN.to_string()
}

fn pt_variable_advisor(_: &ArgosConfig) -> String {
    tools::percona::VARIABLE_ADVISOR_BIN.to_string()
}

/// Every built-in plugin, in registration order
pub fn builtin_plugins() -> Vec<Plugin> {
    vec![
        Plugin {
            name: "aws_rds_instances",
            executable: aws_cli,
            build: tools::rds::instances,
        },
        Plugin {
            name: "aws_rds_logs",
            executable: aws_cli,
            build: tools::rds::logs,
        },
        Plugin {
            name: "aws_rds_log_download",
            executable: aws_cli,
            build: tools::rds::log_download,
        },
        Plugin {
            name: "aws_rds_parameter_groups",
            executable: aws_cli,
            build: tools::rds::parameter_groups,
        },
        Plugin {
            name: "aws_rds_metrics",
            executable: aws_cli,
            build: tools::cloudwatch::metrics,
        },
        Plugin {
            name: "aws_rds_performance_insights",
            executable: aws_cli,
            build: tools::performance_insights::performance_insights,
        },
        Plugin {
            name: "pt_query_digest",
            executable: pt_query_digest,
            build: tools::percona::query_digest,
        },
        Plugin {
            name: "pt_variable_advisor",
            executable: pt_variable_advisor,
            build: tools::percona::variable_advisor,
        },
    ]
}

/// Constructors that pass the config filters and availability checks
pub fn selected_plugins(env: &PluginEnv) -> Vec<PluginConstructor> {
    let config = &env.config;

    builtin_plugins()
        .into_iter()
        .filter(|plugin| {
            if !config.is_tool_enabled(plugin.name) {
                info!(tool = plugin.name, "Tool disabled by configuration");
                return false;
            }

            let executable = (plugin.executable)(config);
            if runner::is_available(&executable) {
                return true;
            }
            if config.tools.skip_unavailable {
                warn!(tool = plugin.name, executable = %executable, "Skipping tool, executable not found");
                false
            } else {
                warn!(tool = plugin.name, executable = %executable, "Executable not found, calls will fail");
                true
            }
        })
        .map(|plugin| plugin.build)
        .collect()
}

/// Composition root: register every selected plugin
pub fn build_registry(env: &PluginEnv) -> ArgosResult<ToolRegistry> {
    let mut registry = ToolRegistry::with_policy(env.config.server.duplicate_policy);
    registry.register_plugins(&selected_plugins(env), env)?;
    info!(count = registry.len(), "Tool registry ready");
    Ok(registry)
}
