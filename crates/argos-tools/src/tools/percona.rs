//! Percona Toolkit Tools
//!
//! Local diagnostics whose text reports are saved under the configured
//! report directories.
//!
//! ## Prerequisites
//!
//! - `pt-query-digest` and `pt-variable-advisor` on PATH

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use argos_core::{
    get_arg, ArgosError, ArgosResult, ToolArguments, ToolContext, ToolDescriptor, ToolHandler,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::common::{create_schema, positive_int_or};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::sink::write_report;
use crate::PluginEnv;

pub const QUERY_DIGEST_BIN: &str = "pt-query-digest";
pub const VARIABLE_ADVISOR_BIN: &str = "pt-variable-advisor";

const DEFAULT_MYSQL_PORT: i64 = 3306;

/// Run a Percona tool and return its stdout, or fail with its stderr
async fn run_tool(
    runner: &dyn CommandRunner,
    ctx: &ToolContext,
    spec: CommandSpec,
) -> ArgosResult<String> {
    let program = spec.program.clone();
    let output: CommandOutput = runner.run(spec, ctx.cancellation_token()).await?;
    if !output.success {
        return Err(ArgosError::tool(format!(
            "{} failed (exit code {}): {}",
            program,
            output.exit_code,
            output.stderr.trim()
        )));
    }
    Ok(output.stdout)
}

/// `<dir>/<log basename>.txt`
fn digest_report_path(dir: &Path, log_file_path: &str) -> PathBuf {
    let base = Path::new(log_file_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    dir.join(format!("{}.txt", base))
}

/// `<dir>/<host with separators as underscores>_<port>.txt`
///
/// The host comes from the caller, so path separators are flattened and the
/// report always lands directly in `dir`.
fn advisor_report_path(dir: &Path, host: &str, port: i64) -> PathBuf {
    let host: String = host
        .chars()
        .map(|c| match c {
            '.' | '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    dir.join(format!("{}_{}.txt", host, port))
}

// ============================================================================
// pt_query_digest
// ============================================================================

pub struct QueryDigestTool {
    runner: Arc<dyn CommandRunner>,
    output_dir: PathBuf,
    timeout: Duration,
}

#[async_trait]
impl ToolHandler for QueryDigestTool {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        let log_file_path: String = get_arg(&args, "log_file_path")?;

        if tokio::fs::metadata(&log_file_path).await.is_err() {
            return Err(ArgosError::tool(format!(
                "log file not found: {}",
                log_file_path
            )));
        }

        let report_path = digest_report_path(&self.output_dir, &log_file_path);
        debug!(log = %log_file_path, report = %report_path.display(), "Running pt-query-digest");

        let spec = CommandSpec::new(QUERY_DIGEST_BIN, self.timeout).arg(log_file_path.clone());
        let report = run_tool(self.runner.as_ref(), &ctx, spec).await?;
        let size_kb = write_report(&report_path, report.as_bytes()).await?;

        Ok(json!({
            "log_file_path": log_file_path,
            "report_path": report_path.display().to_string(),
            "size_kb": size_kb,
        }))
    }
}

pub fn query_digest(env: &PluginEnv) -> ToolDescriptor {
    let dir = env.config.reports.query_digest_dir.clone();
    let parameters = create_schema(
        json!({
            "log_file_path": {
                "type": "string",
                "description": "Absolute path to the slow query log file to analyze (e.g. a file downloaded by aws_rds_log_download)."
            }
        }),
        vec!["log_file_path"],
    );

    ToolDescriptor::new(
        "pt_query_digest",
        format!(
            "Run pt-query-digest on a downloaded RDS slow query log file and save the report to {}.",
            dir.display()
        ),
        Arc::new(QueryDigestTool {
            runner: env.runner.clone(),
            output_dir: dir,
            timeout: Duration::from_secs(env.config.tools.command_timeout_secs),
        }),
    )
    .with_input_schema(parameters)
}

// ============================================================================
// pt_variable_advisor
// ============================================================================

pub struct VariableAdvisorTool {
    runner: Arc<dyn CommandRunner>,
    output_dir: PathBuf,
    timeout: Duration,
}

#[async_trait]
impl ToolHandler for VariableAdvisorTool {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        let host: String = get_arg(&args, "host")?;
        let username: String = get_arg(&args, "username")?;
        let password: String = get_arg(&args, "password")?;
        let port = positive_int_or(&args, "port", DEFAULT_MYSQL_PORT);

        let report_path = advisor_report_path(&self.output_dir, &host, port);
        debug!(host = %host, port, report = %report_path.display(), "Running pt-variable-advisor");

        let dsn = format!("h={},u={},p={},P={}", host, username, password, port);
        let spec = CommandSpec::new(VARIABLE_ADVISOR_BIN, self.timeout).arg(dsn);
        let report = run_tool(self.runner.as_ref(), &ctx, spec).await?;
        let size_kb = write_report(&report_path, report.as_bytes()).await?;

        Ok(json!({
            "host": host,
            "port": port,
            "report_path": report_path.display().to_string(),
            "size_kb": size_kb,
        }))
    }
}

pub fn variable_advisor(env: &PluginEnv) -> ToolDescriptor {
    let dir = env.config.reports.variable_advisor_dir.clone();
    let parameters = create_schema(
        json!({
            "host": {
                "type": "string",
                "description": "MySQL host or RDS endpoint."
            },
            "port": {
                "type": "integer",
                "description": "MySQL port (default: 3306)."
            },
            "username": {
                "type": "string",
                "description": "MySQL username."
            },
            "password": {
                "type": "string",
                "description": "MySQL password."
            }
        }),
        vec!["host", "username", "password"],
    );

    ToolDescriptor::new(
        "pt_variable_advisor",
        format!(
            "Run pt-variable-advisor against a MySQL/RDS instance and save the report to {}. The host and port can be obtained from aws_rds_instances.",
            dir.display()
        ),
        Arc::new(VariableAdvisorTool {
            runner: env.runner.clone(),
            output_dir: dir,
            timeout: Duration::from_secs(env.config.tools.command_timeout_secs),
        }),
    )
    .with_input_schema(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::aws::testing::scripted_env;

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    fn with_report_dirs(env: &mut PluginEnv, dir: &Path) {
        let mut config = (*env.config).clone();
        config.reports.query_digest_dir = dir.join("digest");
        config.reports.variable_advisor_dir = dir.join("advisor");
        env.config = Arc::new(config);
    }

    #[test]
    fn test_report_paths() {
        let dir = Path::new("/reports");
        assert_eq!(
            digest_report_path(dir, "/tmp/argos/aws_rds_logs/db-1/slowquery/mysql-slowquery.log"),
            PathBuf::from("/reports/mysql-slowquery.log.txt")
        );
        assert_eq!(
            advisor_report_path(dir, "orders.abc.eu-west-1.rds.amazonaws.com", 3306),
            PathBuf::from("/reports/orders_abc_eu-west-1_rds_amazonaws_com_3306.txt")
        );
    }

    #[test]
    fn test_advisor_report_stays_in_dir() {
        let dir = Path::new("/reports/advisor");
        for host in ["/tmp/elsewhere/report", "../../etc/cron.d/x", "..\\up", "::1"] {
            let path = advisor_report_path(dir, host, 3306);
            assert_eq!(path.parent(), Some(dir), "{} escaped to {}", host, path.display());
        }
        assert_eq!(
            advisor_report_path(dir, "/tmp/elsewhere/report", 3306),
            PathBuf::from("/reports/advisor/_tmp_elsewhere_report_3306.txt")
        );
    }

    #[tokio::test]
    async fn test_query_digest_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("mysql-slowquery.log");
        std::fs::write(&log, "# Query_time: 2.5\nSELECT SLEEP(2);\n").unwrap();

        let (mut env, runner) = scripted_env(|_| CommandOutput::ok("# Profile\n# Rank Query ID\n"));
        with_report_dirs(&mut env, dir.path());

        let result = query_digest(&env)
            .handler
            .call(ToolContext::new(), args(json!({"log_file_path": log.display().to_string()})))
            .await
            .unwrap();

        let report = dir.path().join("digest/mysql-slowquery.log.txt");
        assert_eq!(result["report_path"], report.display().to_string());
        assert_eq!(std::fs::read_to_string(report).unwrap(), "# Profile\n# Rank Query ID\n");

        let calls = runner.calls();
        assert_eq!(calls[0].program, QUERY_DIGEST_BIN);
        assert_eq!(calls[0].args, vec![log.display().to_string()]);
    }

    #[tokio::test]
    async fn test_query_digest_missing_log() {
        let (env, runner) = scripted_env(|_| CommandOutput::ok(""));
        let err = query_digest(&env)
            .handler
            .call(ToolContext::new(), args(json!({"log_file_path": "/nonexistent/slow.log"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "log file not found: /nonexistent/slow.log");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_variable_advisor() {
        let dir = tempfile::tempdir().unwrap();
        let (mut env, runner) = scripted_env(|_| CommandOutput::ok("WARN delay_key_write\n"));
        with_report_dirs(&mut env, dir.path());

        let result = variable_advisor(&env)
            .handler
            .call(
                ToolContext::new(),
                args(json!({"host": "db.internal", "username": "admin", "password": "s3cret"})),
            )
            .await
            .unwrap();

        assert_eq!(result["port"], 3306);
        assert_eq!(
            result["report_path"],
            dir.path().join("advisor/db_internal_3306.txt").display().to_string()
        );
        assert_eq!(runner.calls()[0].args, vec!["h=db.internal,u=admin,p=s3cret,P=3306"]);
    }

    #[tokio::test]
    async fn test_variable_advisor_absolute_host_writes_inside_report_dir() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let (mut env, _) = scripted_env(|_| CommandOutput::ok("NOTE ok\n"));
        with_report_dirs(&mut env, dir.path());

        let host = elsewhere.path().join("report").display().to_string();
        let result = variable_advisor(&env)
            .handler
            .call(
                ToolContext::new(),
                args(json!({"host": host, "username": "admin", "password": "s3cret"})),
            )
            .await
            .unwrap();

        let report = PathBuf::from(result["report_path"].as_str().unwrap());
        assert_eq!(report.parent(), Some(dir.path().join("advisor").as_path()));
        assert!(report.exists());
        assert_eq!(std::fs::read_dir(elsewhere.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_variable_advisor_failure_hides_password() {
        let dir = tempfile::tempdir().unwrap();
        let (mut env, _) = scripted_env(|_| CommandOutput::failed(1, "Access denied for user 'admin'\n"));
        with_report_dirs(&mut env, dir.path());

        let err = variable_advisor(&env)
            .handler
            .call(
                ToolContext::new(),
                args(json!({"host": "db", "port": 3307, "username": "admin", "password": "s3cret"})),
            )
            .await
            .unwrap_err();

        let message = err.to_string();
        assert_eq!(
            message,
            "pt-variable-advisor failed (exit code 1): Access denied for user 'admin'"
        );
        assert!(!message.contains("s3cret"));
        assert!(!dir.path().join("advisor/db_3307.txt").exists());
    }

    #[tokio::test]
    async fn test_cancelled_call_does_not_run() {
        let (env, runner) = scripted_env(|_| CommandOutput::ok(""));
        let ctx = ToolContext::new();
        ctx.cancellation_token().cancel();

        let err = variable_advisor(&env)
            .handler
            .call(ctx, args(json!({"host": "db", "username": "u", "password": "p"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ArgosError::Cancelled));
        assert!(runner.calls().is_empty());
    }
}
