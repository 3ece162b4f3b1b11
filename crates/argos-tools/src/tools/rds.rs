//! RDS Tools
//!
//! ## Available Tools
//!
//! - `aws_rds_instances` - List RDS instances with engine, status and endpoint
//! - `aws_rds_logs` - List the log files of an instance
//! - `aws_rds_log_download` - Download a log file to the local log directory
//! - `aws_rds_parameter_groups` - User-modified parameters of an instance's parameter group

use std::path::PathBuf;
use std::sync::Arc;

use argos_core::{
    get_arg, ArgosError, ArgosResult, ToolArguments, ToolContext, ToolDescriptor, ToolHandler,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::aws::{flag, AwsCli};
use super::common::{create_schema, instance_identifier, instance_schema};
use crate::sink::{join_relative, size_kb, write_report};
use crate::PluginEnv;

// ============================================================================
// AWS CLI response shapes
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DescribeDbInstances {
    #[serde(rename = "DBInstances", default)]
    pub db_instances: Vec<DbInstance>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DbInstance {
    #[serde(rename = "DBInstanceIdentifier", default)]
    pub identifier: String,
    #[serde(rename = "DBInstanceClass", default)]
    pub class: String,
    #[serde(rename = "DBInstanceStatus", default)]
    pub status: String,
    #[serde(rename = "Engine", default)]
    pub engine: String,
    #[serde(rename = "EngineVersion", default)]
    pub engine_version: String,
    #[serde(rename = "AvailabilityZone", default)]
    pub availability_zone: String,
    #[serde(rename = "MultiAZ", default)]
    pub multi_az: bool,
    #[serde(rename = "Endpoint")]
    pub endpoint: Option<DbEndpoint>,
    #[serde(rename = "DBParameterGroups", default)]
    pub parameter_groups: Vec<DbParameterGroupStatus>,
    #[serde(rename = "DbiResourceId", default)]
    pub dbi_resource_id: String,
    #[serde(rename = "PerformanceInsightsEnabled", default)]
    pub performance_insights_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DbEndpoint {
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "Port", default)]
    pub port: i64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DbParameterGroupStatus {
    #[serde(rename = "DBParameterGroupName", default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
struct DescribeDbLogFiles {
    #[serde(rename = "DescribeDBLogFiles", default)]
    files: Vec<DbLogFile>,
}

#[derive(Debug, Default, Deserialize)]
struct DbLogFile {
    #[serde(rename = "LogFileName", default)]
    name: String,
    #[serde(rename = "LastWritten")]
    last_written: Option<i64>,
    #[serde(rename = "Size", default)]
    size: i64,
}

#[derive(Debug, Default, Deserialize)]
struct DescribeDbParameters {
    #[serde(rename = "Parameters", default)]
    parameters: Vec<DbParameter>,
}

#[derive(Debug, Default, Deserialize)]
struct DbParameter {
    #[serde(rename = "ParameterName", default)]
    name: String,
    #[serde(rename = "ParameterValue", default)]
    value: String,
    #[serde(rename = "Source", default)]
    source: String,
    #[serde(rename = "DataType", default)]
    data_type: String,
    #[serde(rename = "ApplyType", default)]
    apply_type: String,
    #[serde(rename = "IsModifiable", default)]
    is_modifiable: bool,
    #[serde(rename = "Description", default)]
    description: String,
}

// ============================================================================
// Tool output shapes
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
struct Endpoint {
    address: String,
    port: i64,
}

#[derive(Debug, Serialize, PartialEq)]
struct Instance {
    identifier: String,
    class: String,
    status: String,
    engine: String,
    engine_version: String,
    availability_zone: String,
    multi_az: bool,
    endpoint: Endpoint,
}

impl From<DbInstance> for Instance {
    fn from(db: DbInstance) -> Self {
        let endpoint = db
            .endpoint
            .map(|e| Endpoint {
                address: e.address,
                port: e.port,
            })
            .unwrap_or(Endpoint {
                address: String::new(),
                port: 0,
            });

        Self {
            identifier: db.identifier,
            class: db.class,
            status: db.status,
            engine: db.engine,
            engine_version: db.engine_version,
            availability_zone: db.availability_zone,
            multi_az: db.multi_az,
            endpoint,
        }
    }
}

#[derive(Debug, Serialize)]
struct LogFile {
    name: String,
    size_kb: i64,
    last_written: String,
}

impl From<DbLogFile> for LogFile {
    fn from(f: DbLogFile) -> Self {
        Self {
            name: f.name,
            size_kb: f.size / 1024,
            last_written: f.last_written.map(format_epoch_millis).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Parameter {
    name: String,
    value: String,
    source: String,
    data_type: String,
    apply_type: String,
    is_modifiable: bool,
    description: String,
}

impl From<DbParameter> for Parameter {
    fn from(p: DbParameter) -> Self {
        Self {
            name: p.name,
            value: p.value,
            source: p.source,
            data_type: p.data_type,
            apply_type: p.apply_type,
            is_modifiable: p.is_modifiable,
            description: p.description,
        }
    }
}

/// Milliseconds since the epoch as RFC 3339 UTC, e.g. `2024-03-01T12:00:00Z`
fn format_epoch_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Describe one instance, failing when RDS returns nothing for it
pub(crate) async fn describe_instance(
    aws: &AwsCli,
    ctx: &ToolContext,
    instance_id: &str,
) -> ArgosResult<DbInstance> {
    let output: DescribeDbInstances = aws
        .call_json(
            ctx,
            "rds",
            "describe-db-instances",
            &flag("db-instance-identifier", instance_id),
        )
        .await?;

    output
        .db_instances
        .into_iter()
        .next()
        .ok_or_else(|| ArgosError::tool(format!("instance {:?} not found", instance_id)))
}

// ============================================================================
// aws_rds_instances
// ============================================================================

pub struct RdsInstancesTool {
    aws: AwsCli,
}

#[async_trait]
impl ToolHandler for RdsInstancesTool {
    async fn call(&self, ctx: ToolContext, _args: ToolArguments) -> ArgosResult<Value> {
        let output: DescribeDbInstances = self
            .aws
            .call_json(&ctx, "rds", "describe-db-instances", &[])
            .await?;

        let instances: Vec<Instance> = output.db_instances.into_iter().map(Instance::from).collect();
        Ok(json!({ "instances": instances }))
    }
}

pub fn instances(env: &PluginEnv) -> ToolDescriptor {
    ToolDescriptor::new(
        "aws_rds_instances",
        "List AWS RDS Instances.",
        Arc::new(RdsInstancesTool { aws: AwsCli::new(env) }),
    )
}

// ============================================================================
// aws_rds_logs
// ============================================================================

pub struct RdsLogsTool {
    aws: AwsCli,
}

#[async_trait]
impl ToolHandler for RdsLogsTool {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        let instance_id = instance_identifier(&args)?;

        let output: DescribeDbLogFiles = self
            .aws
            .call_json(
                &ctx,
                "rds",
                "describe-db-log-files",
                &flag("db-instance-identifier", instance_id.clone()),
            )
            .await?;

        let logs: Vec<LogFile> = output.files.into_iter().map(LogFile::from).collect();
        Ok(json!({
            "identifier": instance_id,
            "count": logs.len(),
            "logs": logs,
        }))
    }
}

pub fn logs(env: &PluginEnv) -> ToolDescriptor {
    ToolDescriptor::new(
        "aws_rds_logs",
        "List available log files for an RDS instance.",
        Arc::new(RdsLogsTool { aws: AwsCli::new(env) }),
    )
    .with_input_schema(instance_schema("The RDS DB instance identifier to list logs for."))
}

// ============================================================================
// aws_rds_log_download
// ============================================================================

pub struct RdsLogDownloadTool {
    aws: AwsCli,
    base_dir: PathBuf,
}

#[async_trait]
impl ToolHandler for RdsLogDownloadTool {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        let instance_id = instance_identifier(&args)?;
        let log_file_name: String = get_arg(&args, "log_file_name")?;

        // <base_dir>/<instance>/<log_file_name>
        let output_path = join_relative(&self.base_dir, &instance_id)
            .and_then(|dir| join_relative(&dir, &log_file_name))?;

        // Starting at token 0 makes the CLI page through the whole file;
        // the query keeps only the log text of each page
        let mut cli_args = Vec::new();
        cli_args.extend(flag("db-instance-identifier", instance_id.clone()));
        cli_args.extend(flag("log-file-name", log_file_name.clone()));
        cli_args.extend(flag("starting-token", "0"));
        cli_args.extend(flag("query", "LogFileData"));

        let data = self
            .aws
            .call_text(&ctx, "rds", "download-db-log-file-portion", &cli_args)
            .await?;

        let size_kb = write_report(&output_path, data.as_bytes()).await?;

        Ok(json!({
            "identifier": instance_id,
            "log_file_name": log_file_name,
            "output_path": output_path.display().to_string(),
            "size_kb": size_kb,
        }))
    }
}

pub fn log_download(env: &PluginEnv) -> ToolDescriptor {
    let parameters = create_schema(
        json!({
            "db_instance_identifier": {
                "type": "string",
                "description": "The RDS DB instance identifier."
            },
            "log_file_name": {
                "type": "string",
                "description": "The name of the log file to download (e.g. slowquery/mysql-slowquery.log)."
            }
        }),
        vec!["db_instance_identifier", "log_file_name"],
    );

    ToolDescriptor::new(
        "aws_rds_log_download",
        "Download the content of a specific RDS log file.",
        Arc::new(RdsLogDownloadTool {
            aws: AwsCli::new(env),
            base_dir: env.config.reports.rds_logs_dir.clone(),
        }),
    )
    .with_input_schema(parameters)
}

// ============================================================================
// aws_rds_parameter_groups
// ============================================================================

pub struct RdsParameterGroupsTool {
    aws: AwsCli,
}

#[async_trait]
impl ToolHandler for RdsParameterGroupsTool {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        let instance_id = instance_identifier(&args)?;
        let instance = describe_instance(&self.aws, &ctx, &instance_id).await?;

        let group = instance
            .parameter_groups
            .into_iter()
            .next()
            .map(|g| g.name)
            .ok_or_else(|| {
                ArgosError::tool(format!(
                    "no parameter groups found for instance {:?}",
                    instance_id
                ))
            })?;

        let mut cli_args = Vec::new();
        cli_args.extend(flag("db-parameter-group-name", group.clone()));
        cli_args.extend(flag("source", "user"));

        let output: DescribeDbParameters = self
            .aws
            .call_json(&ctx, "rds", "describe-db-parameters", &cli_args)
            .await?;

        let parameters: Vec<Parameter> = output.parameters.into_iter().map(Parameter::from).collect();
        Ok(json!({
            "identifier": instance_id,
            "parameter_group": group,
            "count": parameters.len(),
            "parameters": parameters,
        }))
    }
}

pub fn parameter_groups(env: &PluginEnv) -> ToolDescriptor {
    ToolDescriptor::new(
        "aws_rds_parameter_groups",
        "List all parameters of the parameter group associated with a given RDS DB instance.",
        Arc::new(RdsParameterGroupsTool { aws: AwsCli::new(env) }),
    )
    .with_input_schema(instance_schema("The RDS DB instance identifier."))
}
