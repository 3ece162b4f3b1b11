use std::path::Path;

use anyhow::Result;
use argos_core::ToolDefinition;

use super::{build_dispatcher, load_config};
use crate::cli::OutputFormat;

const DESCRIPTION_WIDTH: usize = 60;

/// List registered tools (get-style: table, json, yaml)
pub async fn execute(config: Option<&Path>, output: OutputFormat) -> Result<()> {
    let dispatcher = build_dispatcher(load_config(config)?)?;
    let definitions = dispatcher.definitions();

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&definitions)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&definitions)?),
        OutputFormat::Table => {
            println!("\n{:<30} {:<40} {}", "NAME", "REQUIRED", "DESCRIPTION");
            println!("{}", "=".repeat(130));
            for definition in &definitions {
                println!(
                    "{:<30} {:<40} {}",
                    definition.name,
                    required_args(definition),
                    truncate(&definition.description, DESCRIPTION_WIDTH)
                );
            }
            println!();
        }
    }

    Ok(())
}

fn required_args(definition: &ToolDefinition) -> String {
    let required: Vec<&str> = definition.input_schema["required"]
        .as_array()
        .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
        .unwrap_or_default();
    if required.is_empty() {
        "-".to_string()
    } else {
        required.join(",")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_args() {
        let with = ToolDefinition {
            name: "t".to_string(),
            description: String::new(),
            input_schema: json!({"type": "object", "required": ["host", "username"]}),
        };
        assert_eq!(required_args(&with), "host,username");

        let without = ToolDefinition {
            input_schema: json!({"type": "object"}),
            ..with
        };
        assert_eq!(required_args(&without), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer description", 10), "a longe...");
    }
}
