//! CloudWatch metrics for RDS and DocumentDB instances

use std::sync::Arc;

use argos_core::{ArgosResult, ToolArguments, ToolContext, ToolDescriptor, ToolHandler};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::aws::{flag, AwsCli};
use super::common::{instance_identifier, instance_schema};
use super::rds::describe_instance;
use crate::PluginEnv;

const PERIOD_SECS: i64 = 300;
const WINDOW_MINUTES: i64 = 15;

const BYTES_TO_MB: f64 = 1.0 / (1024.0 * 1024.0);
const BYTES_TO_GB: f64 = 1.0 / (1024.0 * 1024.0 * 1024.0);
const SEC_TO_MS: f64 = 1000.0;

/// Namespace and engine-specific metric names
#[derive(Debug, Clone, PartialEq)]
struct MetricNames {
    namespace: &'static str,
    storage: &'static str,
    network_rx: &'static str,
    network_tx: &'static str,
}

impl MetricNames {
    fn for_engine(engine: &str) -> Self {
        if engine == "docdb" {
            Self {
                namespace: "AWS/DocDB",
                storage: "FreeLocalStorage",
                network_rx: "NetworkBytesIn",
                network_tx: "NetworkBytesOut",
            }
        } else {
            Self {
                namespace: "AWS/RDS",
                storage: "FreeStorageSpace",
                network_rx: "NetworkReceiveThroughput",
                network_tx: "NetworkTransmitThroughput",
            }
        }
    }

    /// (query id, metric name) in output order
    fn queries(&self) -> [(&'static str, &'static str); 10] {
        [
            ("cpu", "CPUUtilization"),
            ("connections", "DatabaseConnections"),
            ("memory", "FreeableMemory"),
            ("storage", self.storage),
            ("read_iops", "ReadIOPS"),
            ("write_iops", "WriteIOPS"),
            ("read_latency", "ReadLatency"),
            ("write_latency", "WriteLatency"),
            ("net_rx", self.network_rx),
            ("net_tx", self.network_tx),
        ]
    }
}

fn metric_data_queries(names: &MetricNames, instance_id: &str) -> Value {
    let queries: Vec<Value> = names
        .queries()
        .iter()
        .map(|(id, metric)| {
            json!({
                "Id": id,
                "MetricStat": {
                    "Metric": {
                        "Namespace": names.namespace,
                        "MetricName": metric,
                        "Dimensions": [{"Name": "DBInstanceIdentifier", "Value": instance_id}]
                    },
                    "Period": PERIOD_SECS,
                    "Stat": "Average"
                }
            })
        })
        .collect();
    Value::Array(queries)
}

#[derive(Debug, Default, Deserialize)]
struct GetMetricData {
    #[serde(rename = "MetricDataResults", default)]
    results: Vec<MetricDataResult>,
}

#[derive(Debug, Default, Deserialize)]
struct MetricDataResult {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Values", default)]
    values: Vec<f64>,
}

/// Most recent datapoint for `id` (CloudWatch returns newest first), scaled
fn latest_value(results: &[MetricDataResult], id: &str, multiplier: f64) -> f64 {
    results
        .iter()
        .find(|r| r.id == id && !r.values.is_empty())
        .map(|r| r.values[0] * multiplier)
        .unwrap_or(0.0)
}

#[derive(Debug, Serialize)]
struct Metrics {
    identifier: String,
    engine: String,
    cpu_percent: f64,
    connections: f64,
    freeable_memory_mb: f64,
    free_storage_gb: f64,
    read_iops: f64,
    write_iops: f64,
    read_latency_ms: f64,
    write_latency_ms: f64,
    network_rx_mbps: f64,
    network_tx_mbps: f64,
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct RdsMetricsTool {
    aws: AwsCli,
}

#[async_trait]
impl ToolHandler for RdsMetricsTool {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        let instance_id = instance_identifier(&args)?;

        // The engine decides which namespace to query
        let engine = describe_instance(&self.aws, &ctx, &instance_id).await?.engine;
        let names = MetricNames::for_engine(&engine);

        let end = Utc::now();
        let start = end - Duration::minutes(WINDOW_MINUTES);

        let mut cli_args = Vec::new();
        cli_args.extend(flag("start-time", timestamp(start)));
        cli_args.extend(flag("end-time", timestamp(end)));
        cli_args.extend(flag(
            "metric-data-queries",
            metric_data_queries(&names, &instance_id).to_string(),
        ));

        let output: GetMetricData = self
            .aws
            .call_json(&ctx, "cloudwatch", "get-metric-data", &cli_args)
            .await?;
        let r = &output.results;

        let metrics = Metrics {
            identifier: instance_id,
            engine,
            cpu_percent: latest_value(r, "cpu", 1.0),
            connections: latest_value(r, "connections", 1.0),
            freeable_memory_mb: latest_value(r, "memory", BYTES_TO_MB),
            free_storage_gb: latest_value(r, "storage", BYTES_TO_GB),
            read_iops: latest_value(r, "read_iops", 1.0),
            write_iops: latest_value(r, "write_iops", 1.0),
            read_latency_ms: latest_value(r, "read_latency", SEC_TO_MS),
            write_latency_ms: latest_value(r, "write_latency", SEC_TO_MS),
            network_rx_mbps: latest_value(r, "net_rx", BYTES_TO_MB),
            network_tx_mbps: latest_value(r, "net_tx", BYTES_TO_MB),
        };

        Ok(json!({ "metrics": metrics }))
    }
}

pub fn metrics(env: &PluginEnv) -> ToolDescriptor {
    ToolDescriptor::new(
        "aws_rds_metrics",
        "Get CloudWatch metrics (CPU, connections, memory, storage, IOPS, latency, network) for an RDS instance.",
        Arc::new(RdsMetricsTool { aws: AwsCli::new(env) }),
    )
    .with_input_schema(instance_schema("The RDS DB instance identifier to fetch metrics for."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use crate::tools::aws::testing::{operation, scripted_env};

    fn result(id: &str, values: Vec<f64>) -> MetricDataResult {
        MetricDataResult {
            id: id.to_string(),
            values,
        }
    }

    #[test]
    fn test_latest_value() {
        let results = vec![result("cpu", vec![]), result("memory", vec![2097152.0, 1.0])];
        assert_eq!(latest_value(&results, "cpu", 1.0), 0.0);
        assert_eq!(latest_value(&results, "memory", BYTES_TO_MB), 2.0);
        assert_eq!(latest_value(&results, "absent", 1.0), 0.0);
    }

    #[test]
    fn test_docdb_metric_names() {
        let names = MetricNames::for_engine("docdb");
        assert_eq!(names.namespace, "AWS/DocDB");
        assert_eq!(names.storage, "FreeLocalStorage");

        let names = MetricNames::for_engine("aurora-mysql");
        assert_eq!(names.namespace, "AWS/RDS");
        assert_eq!(names.network_tx, "NetworkTransmitThroughput");
    }

    #[test]
    fn test_metric_data_queries_shape() {
        let queries = metric_data_queries(&MetricNames::for_engine("mysql"), "db-1");
        let queries = queries.as_array().unwrap();
        assert_eq!(queries.len(), 10);
        assert_eq!(queries[3]["Id"], "storage");
        assert_eq!(queries[3]["MetricStat"]["Metric"]["MetricName"], "FreeStorageSpace");
        assert_eq!(queries[0]["MetricStat"]["Period"], 300);
        assert_eq!(
            queries[0]["MetricStat"]["Metric"]["Dimensions"][0]["Value"],
            "db-1"
        );
    }

    #[tokio::test]
    async fn test_metrics_for_docdb() {
        let (env, runner) = scripted_env(|spec| match operation(spec) {
            "describe-db-instances" => CommandOutput::ok(
                r#"{"DBInstances": [{"DBInstanceIdentifier": "catalog", "Engine": "docdb"}]}"#,
            ),
            "get-metric-data" => CommandOutput::ok(
                r#"{"MetricDataResults": [
                    {"Id": "cpu", "Values": [42.5, 10.0]},
                    {"Id": "read_latency", "Values": [0.5]},
                    {"Id": "net_rx", "Values": [1048576.0]}
                ]}"#,
            ),
            other => CommandOutput::failed(1, other.to_string()),
        });

        let value = metrics(&env)
            .handler
            .call(
                ToolContext::new(),
                json!({"db_instance_identifier": "catalog"}).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();

        let m = &value["metrics"];
        assert_eq!(m["engine"], "docdb");
        assert_eq!(m["cpu_percent"], 42.5);
        assert_eq!(m["read_latency_ms"], 500.0);
        assert_eq!(m["network_rx_mbps"], 1.0);
        assert_eq!(m["connections"], 0.0);

        let calls = runner.calls();
        assert_eq!(operation(&calls[1]), "get-metric-data");
        let queries_pos = calls[1]
            .args
            .iter()
            .position(|a| a == "--metric-data-queries")
            .unwrap();
        assert!(calls[1].args[queries_pos + 1].contains("AWS/DocDB"));
    }
}
