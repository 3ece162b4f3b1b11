//! Tool plugins
//!
//! Each plugin is a constructor `fn(&PluginEnv) -> ToolDescriptor`. Plugins
//! are grouped by the external system they talk to:
//!
//! - `rds` - RDS instances, log files, log download, parameter groups
//! - `cloudwatch` - RDS/DocumentDB CloudWatch metrics
//! - `performance_insights` - top SQL and wait events by DB load
//! - `percona` - `pt-query-digest` and `pt-variable-advisor`

pub mod aws;
pub mod cloudwatch;
pub mod percona;
pub mod performance_insights;
pub mod rds;

/// Common utilities for tool implementations
pub mod common {
    use argos_core::{get_arg, ArgosResult, ToolArguments};

    /// Create a standard JSON schema for a tool with required and optional parameters
    pub fn create_schema(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Schema for tools that take only an instance identifier
    pub fn instance_schema(description: &str) -> serde_json::Value {
        create_schema(
            serde_json::json!({
                "db_instance_identifier": {
                    "type": "string",
                    "description": description
                }
            }),
            vec!["db_instance_identifier"],
        )
    }

    pub fn instance_identifier(args: &ToolArguments) -> ArgosResult<String> {
        get_arg(args, "db_instance_identifier")
    }

    /// Positive integer argument with a fallback. JSON numbers arrive as
    /// floats from some clients, so fractional values are truncated.
    pub fn positive_int_or(args: &ToolArguments, key: &str, default: i64) -> i64 {
        args.get(key)
            .and_then(|v| v.as_f64())
            .map(|v| v as i64)
            .filter(|v| *v > 0)
            .unwrap_or(default)
    }

}
