//! AWS CLI client shared by the AWS plugins
//!
//! ## Prerequisites
//!
//! - AWS CLI v2 must be installed (or `aws.cli_path` set)
//! - Valid AWS credentials configured (aws configure, env vars or instance role)
//! - A region from `aws.region` or `AWS_REGION`

use std::sync::Arc;
use std::time::Duration;

use argos_core::{ArgosConfig, ArgosError, ArgosResult, ToolContext};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::runner::{CommandRunner, CommandSpec};
use crate::PluginEnv;

#[derive(Clone)]
pub struct AwsCli {
    config: Arc<ArgosConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl AwsCli {
    pub fn new(env: &PluginEnv) -> Self {
        Self {
            config: env.config.clone(),
            runner: env.runner.clone(),
        }
    }

    fn spec(&self, service: &str, operation: &str, args: &[String], output: &str) -> ArgosResult<CommandSpec> {
        let region = self.config.resolved_region()?;

        let mut spec = CommandSpec::new(
            &self.config.aws.cli_path,
            Duration::from_secs(self.config.tools.command_timeout_secs),
        )
        .arg(service)
        .arg(operation)
        .args(args.iter().cloned())
        .arg("--region")
        .arg(region)
        .arg("--output")
        .arg(output);

        if let Some(ref profile) = self.config.aws.profile {
            spec = spec.arg("--profile").arg(profile.clone());
        }

        Ok(spec)
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        service: &str,
        operation: &str,
        args: &[String],
        output: &str,
    ) -> ArgosResult<String> {
        let spec = self.spec(service, operation, args, output)?;
        debug!(service, operation, args = ?args, "Executing aws");

        let result = self.runner.run(spec, ctx.cancellation_token()).await?;
        if !result.success {
            return Err(ArgosError::tool(format!(
                "aws {} {} failed: {}",
                service,
                operation,
                result.stderr.trim()
            )));
        }
        Ok(result.stdout)
    }

    /// Run an operation with `--output json` and decode the response
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        ctx: &ToolContext,
        service: &str,
        operation: &str,
        args: &[String],
    ) -> ArgosResult<T> {
        let stdout = self.run(ctx, service, operation, args, "json").await?;
        serde_json::from_str(&stdout).map_err(|e| {
            ArgosError::tool(format!(
                "aws {} {} returned unexpected output: {}",
                service, operation, e
            ))
        })
    }

    /// Run an operation with `--output text` and return stdout as-is
    pub async fn call_text(
        &self,
        ctx: &ToolContext,
        service: &str,
        operation: &str,
        args: &[String],
    ) -> ArgosResult<String> {
        self.run(ctx, service, operation, args, "text").await
    }
}

/// Build `["--flag", value]` pairs
pub fn flag(name: &str, value: impl Into<String>) -> [String; 2] {
    [format!("--{}", name), value.into()]
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::runner::scripted::ScriptedRunner;
    use crate::runner::CommandOutput;

    /// Plugin environment with a fixed region and a scripted runner
    pub(crate) fn scripted_env<F>(script: F) -> (PluginEnv, Arc<ScriptedRunner>)
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        let mut config = ArgosConfig::default();
        config.aws.region = Some("eu-west-1".to_string());
        let runner = Arc::new(ScriptedRunner::new(script));
        let env = PluginEnv::new(config, runner.clone());
        (env, runner)
    }

    /// The AWS operation (second argument) of a recorded call
    pub(crate) fn operation(spec: &CommandSpec) -> &str {
        spec.args.get(1).map(String::as_str).unwrap_or("")
    }
}
