//! External executables as a capability
//!
//! Plugins never spawn processes directly; they go through a
//! [`CommandRunner`] so the AWS CLI and the Percona tools can be replaced by
//! a scripted runner in tests.

use std::process::Stdio;
use std::time::Duration;

use argos_core::{ArgosError, ArgosResult};
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A single program invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Command execution output
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A non-zero exit is reported in the output, not as an error.
    async fn run(&self, spec: CommandSpec, cancel: &CancellationToken) -> ArgosResult<CommandOutput>;
}

/// Runs commands as child processes
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: CommandSpec, cancel: &CancellationToken) -> ArgosResult<CommandOutput> {
        debug!(program = %spec.program, argc = spec.args.len(), "Spawning command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| ArgosError::tool(format!("Failed to spawn {}: {}", spec.program, e)))?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ArgosError::Cancelled),
            result = tokio::time::timeout(spec.timeout, child.wait_with_output()) => match result {
                Err(_) => {
                    return Err(ArgosError::tool(format!(
                        "{} timed out after {}s",
                        spec.program,
                        spec.timeout.as_secs()
                    )))
                }
                Ok(output) => output.map_err(|e| {
                    ArgosError::tool(format!("{} failed: {}", spec.program, e))
                })?,
            },
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

/// Check if an executable is on PATH (or is an existing path)
pub fn is_available(program: &str) -> bool {
    which::which(program).is_ok()
}
