//! Performance Insights - top SQL and wait events by database load

use std::collections::HashMap;
use std::sync::Arc;

use argos_core::{ArgosError, ArgosResult, ToolArguments, ToolContext, ToolDescriptor, ToolHandler};
use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::aws::{flag, AwsCli};
use super::common::{create_schema, instance_identifier, positive_int_or};
use super::rds::describe_instance;
use crate::PluginEnv;

const DEFAULT_MINUTES: i64 = 60;
const TOP_LIMIT: u32 = 10;
const LOAD_METRIC: &str = "db.load.avg";

const SQL_GROUP: &str = "db.sql_tokenized";
const SQL_STATEMENT: &str = "db.sql_tokenized.statement";
const WAIT_GROUP: &str = "db.wait_event";
const WAIT_TYPE: &str = "db.wait_event.type";
const WAIT_NAME: &str = "db.wait_event.name";

#[derive(Debug, Default, Deserialize)]
struct DescribeDimensionKeys {
    #[serde(rename = "Keys", default)]
    keys: Vec<DimensionKey>,
}

#[derive(Debug, Default, Deserialize)]
struct DimensionKey {
    #[serde(rename = "Dimensions", default)]
    dimensions: HashMap<String, String>,
    #[serde(rename = "Total", default)]
    total: f64,
}

impl DimensionKey {
    fn dimension(&self, name: &str) -> String {
        self.dimensions.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct TopQuery {
    statement: String,
    db_load_avg: f64,
}

#[derive(Debug, Serialize)]
struct WaitEvent {
    #[serde(rename = "type")]
    event_type: String,
    name: String,
    db_load_avg: f64,
}

/// Service type Performance Insights expects for an engine
fn service_type(engine: &str) -> &'static str {
    if engine == "docdb" {
        "DOCDB"
    } else {
        "RDS"
    }
}

struct Window {
    service_type: &'static str,
    resource_id: String,
    start: String,
    end: String,
}

pub struct PerformanceInsightsTool {
    aws: AwsCli,
}

impl PerformanceInsightsTool {
    async fn top_keys(
        &self,
        ctx: &ToolContext,
        window: &Window,
        group: &str,
        dimensions: &[&str],
    ) -> ArgosResult<Vec<DimensionKey>> {
        let group_by = json!({
            "Group": group,
            "Dimensions": dimensions,
            "Limit": TOP_LIMIT,
        });

        let mut cli_args = Vec::new();
        cli_args.extend(flag("service-type", window.service_type));
        cli_args.extend(flag("identifier", window.resource_id.clone()));
        cli_args.extend(flag("start-time", window.start.clone()));
        cli_args.extend(flag("end-time", window.end.clone()));
        cli_args.extend(flag("metric", LOAD_METRIC));
        cli_args.extend(flag("group-by", group_by.to_string()));

        let output: DescribeDimensionKeys = self
            .aws
            .call_json(ctx, "pi", "describe-dimension-keys", &cli_args)
            .await?;
        Ok(output.keys)
    }
}

#[async_trait]
impl ToolHandler for PerformanceInsightsTool {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        let instance_id = instance_identifier(&args)?;
        let minutes = positive_int_or(&args, "minutes", DEFAULT_MINUTES);
        let end = Utc::now();
        let start = Duration::try_minutes(minutes)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| ArgosError::invalid_argument(format!("minutes out of range: {}", minutes)))?;

        let instance = describe_instance(&self.aws, &ctx, &instance_id).await?;
        if !instance.performance_insights_enabled {
            return Err(ArgosError::tool(format!(
                "Performance Insights is not enabled for instance {:?}",
                instance_id
            )));
        }

        let window = Window {
            service_type: service_type(&instance.engine),
            resource_id: instance.dbi_resource_id,
            start: start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end: end.to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        let top_queries: Vec<TopQuery> = self
            .top_keys(&ctx, &window, SQL_GROUP, &[SQL_STATEMENT])
            .await?
            .into_iter()
            .map(|key| TopQuery {
                statement: key.dimension(SQL_STATEMENT),
                db_load_avg: key.total,
            })
            .collect();

        let wait_events: Vec<WaitEvent> = self
            .top_keys(&ctx, &window, WAIT_GROUP, &[WAIT_TYPE, WAIT_NAME])
            .await?
            .into_iter()
            .map(|key| WaitEvent {
                event_type: key.dimension(WAIT_TYPE),
                name: key.dimension(WAIT_NAME),
                db_load_avg: key.total,
            })
            .collect();

        Ok(json!({
            "identifier": instance_id,
            "period_min": minutes,
            "top_queries": top_queries,
            "wait_events": wait_events,
        }))
    }
}

pub fn performance_insights(env: &PluginEnv) -> ToolDescriptor {
    let parameters = create_schema(
        json!({
            "db_instance_identifier": {
                "type": "string",
                "description": "The RDS DB instance identifier."
            },
            "minutes": {
                "type": "integer",
                "description": "Time window in minutes to analyze (default: 60)."
            }
        }),
        vec!["db_instance_identifier"],
    );

    ToolDescriptor::new(
        "aws_rds_performance_insights",
        "Get top SQL queries and wait events by DB load from Performance Insights for a given RDS instance.",
        Arc::new(PerformanceInsightsTool { aws: AwsCli::new(env) }),
    )
    .with_input_schema(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, CommandSpec};
    use crate::tools::aws::testing::{operation, scripted_env};

    fn group_of(spec: &CommandSpec) -> Value {
        let pos = spec.args.iter().position(|a| a == "--group-by").unwrap();
        serde_json::from_str(&spec.args[pos + 1]).unwrap()
    }

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_top_queries_and_wait_events() {
        let (env, runner) = scripted_env(|spec| match operation(spec) {
            "describe-db-instances" => CommandOutput::ok(
                r#"{"DBInstances": [{
                    "DBInstanceIdentifier": "orders-primary",
                    "Engine": "mysql",
                    "DbiResourceId": "db-ABCDEF",
                    "PerformanceInsightsEnabled": true
                }]}"#,
            ),
            "describe-dimension-keys" if group_of(spec)["Group"] == SQL_GROUP => CommandOutput::ok(
                r#"{"Keys": [{"Dimensions": {"db.sql_tokenized.statement": "SELECT * FROM orders WHERE id = ?"}, "Total": 1.25}]}"#,
            ),
            "describe-dimension-keys" => CommandOutput::ok(
                r#"{"Keys": [
                    {"Dimensions": {"db.wait_event.type": "io", "db.wait_event.name": "wait/io/table/sql/handler"}, "Total": 0.75},
                    {"Dimensions": {"db.wait_event.name": "CPU"}, "Total": 0.5}
                ]}"#,
            ),
            other => CommandOutput::failed(1, other.to_string()),
        });

        let result = performance_insights(&env)
            .handler
            .call(
                ToolContext::new(),
                args(json!({"db_instance_identifier": "orders-primary", "minutes": 30})),
            )
            .await
            .unwrap();

        assert_eq!(result["period_min"], 30);
        assert_eq!(result["top_queries"][0]["statement"], "SELECT * FROM orders WHERE id = ?");
        assert_eq!(result["top_queries"][0]["db_load_avg"], 1.25);
        assert_eq!(result["wait_events"][0]["type"], "io");
        assert_eq!(result["wait_events"][1]["type"], "");
        assert_eq!(result["wait_events"][1]["name"], "CPU");

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].args.windows(2).any(|w| w[0] == "--identifier" && w[1] == "db-ABCDEF"));
        assert!(calls[1].args.windows(2).any(|w| w[0] == "--service-type" && w[1] == "RDS"));
        assert_eq!(group_of(&calls[2])["Dimensions"], json!([WAIT_TYPE, WAIT_NAME]));
        assert_eq!(group_of(&calls[2])["Limit"], 10);
    }

    #[tokio::test]
    async fn test_disabled_performance_insights() {
        let (env, runner) = scripted_env(|_| {
            CommandOutput::ok(r#"{"DBInstances": [{"DBInstanceIdentifier": "legacy", "Engine": "mysql"}]}"#)
        });

        let err = performance_insights(&env)
            .handler
            .call(ToolContext::new(), args(json!({"db_instance_identifier": "legacy"})))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Performance Insights is not enabled for instance \"legacy\""
        );
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_window_out_of_range() {
        let (env, runner) = scripted_env(|_| CommandOutput::ok("{}"));

        let err = performance_insights(&env)
            .handler
            .call(
                ToolContext::new(),
                args(json!({"db_instance_identifier": "orders-primary", "minutes": 1_000_000_000_000_i64})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ArgosError::InvalidArgument(_)));
        assert_eq!(err.to_string(), "Invalid argument: minutes out of range: 1000000000000");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_service_type() {
        assert_eq!(service_type("docdb"), "DOCDB");
        assert_eq!(service_type("postgres"), "RDS");
    }
}
