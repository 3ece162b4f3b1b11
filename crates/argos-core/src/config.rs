//! Argos configuration
//!
//! Loaded from YAML; every field has a default so an empty file (or no file)
//! is a valid configuration.
//!
//! # Example YAML
//! ```yaml
//! server:
//!   name: argos
//!   duplicate_policy: reject
//! aws:
//!   region: eu-west-1
//!   profile: readonly
//! tools:
//!   disabled:
//!     - pt_variable_advisor
//!   skip_unavailable: true
//! reports:
//!   rds_logs_dir: /var/tmp/argos/aws_rds_logs
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArgosError, ArgosResult};
use crate::registry::DuplicatePolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgosConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub aws: AwsSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub reports: ReportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Name advertised to MCP clients
    #[serde(default = "default_server_name")]
    pub name: String,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSettings {
    /// Region for every AWS call; falls back to `AWS_REGION`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Named profile passed to the AWS CLI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default = "default_aws_cli")]
    pub cli_path: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            cli_path: default_aws_cli(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Only register these tools (empty = all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled: Vec<String>,

    /// Skip plugins whose executable is not on PATH
    #[serde(default)]
    pub skip_unavailable: bool,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            disabled: Vec::new(),
            skip_unavailable: false,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

/// Where tools persist downloaded logs and generated reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_rds_logs_dir")]
    pub rds_logs_dir: PathBuf,

    #[serde(default = "default_query_digest_dir")]
    pub query_digest_dir: PathBuf,

    #[serde(default = "default_variable_advisor_dir")]
    pub variable_advisor_dir: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            rds_logs_dir: default_rds_logs_dir(),
            query_digest_dir: default_query_digest_dir(),
            variable_advisor_dir: default_variable_advisor_dir(),
        }
    }
}

fn default_server_name() -> String {
    "argos".to_string()
}

fn default_aws_cli() -> String {
    "aws".to_string()
}

fn default_command_timeout() -> u64 {
    300
}

fn default_rds_logs_dir() -> PathBuf {
    PathBuf::from("/tmp/argos/aws_rds_logs")
}

fn default_query_digest_dir() -> PathBuf {
    PathBuf::from("/tmp/argos/pt-query-digest")
}

fn default_variable_advisor_dir() -> PathBuf {
    PathBuf::from("/tmp/argos/pt-variable-advisor")
}

impl ArgosConfig {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> ArgosResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ArgosResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArgosError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> ArgosResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values using an arbitrary variable lookup
    ///
    /// `AWS_REGION` only fills an unset region; `AWS_PROFILE` and
    /// `ARGOS_DUPLICATE_POLICY` always win over the file.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ArgosResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.aws.region.is_none() {
            self.aws.region = lookup("AWS_REGION").filter(|r| !r.is_empty());
        }
        if let Some(profile) = lookup("AWS_PROFILE").filter(|p| !p.is_empty()) {
            self.aws.profile = Some(profile);
        }
        if let Some(policy) = lookup("ARGOS_DUPLICATE_POLICY") {
            self.server.duplicate_policy = policy.parse()?;
        }
        Ok(())
    }

    /// Region used for AWS calls
    pub fn resolved_region(&self) -> ArgosResult<String> {
        self.aws
            .region
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ArgosError::config("AWS_REGION environment variable is not set"))
    }

    /// Whether a tool passes the enabled/disabled filters
    pub fn is_tool_enabled(&self, name: &str) -> bool {
        if self.tools.disabled.iter().any(|t| t == name) {
            return false;
        }
        self.tools.enabled.is_empty() || self.tools.enabled.iter().any(|t| t == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ArgosConfig::default();
        assert_eq!(config.server.name, "argos");
        assert_eq!(config.server.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.aws.cli_path, "aws");
        assert_eq!(config.tools.command_timeout_secs, 300);
        assert_eq!(
            config.reports.query_digest_dir,
            PathBuf::from("/tmp/argos/pt-query-digest")
        );
        assert!(config.resolved_region().is_err());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let config = ArgosConfig::from_yaml(
            r#"
server:
  duplicate_policy: replace
aws:
  region: us-east-1
tools:
  disabled: [pt_variable_advisor]
"#,
        )
        .unwrap();

        assert_eq!(config.server.name, "argos");
        assert_eq!(config.server.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.resolved_region().unwrap(), "us-east-1");
        assert!(!config.is_tool_enabled("pt_variable_advisor"));
        assert!(config.is_tool_enabled("aws_rds_instances"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = ArgosConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.server.name, "argos");
    }

    #[test]
    fn test_enabled_list_filters() {
        let mut config = ArgosConfig::default();
        config.tools.enabled = vec!["aws_rds_logs".to_string()];
        assert!(config.is_tool_enabled("aws_rds_logs"));
        assert!(!config.is_tool_enabled("aws_rds_metrics"));
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AWS_REGION", "eu-west-1"),
            ("AWS_PROFILE", "ops"),
            ("ARGOS_DUPLICATE_POLICY", "replace"),
        ]);

        let mut config = ArgosConfig::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.resolved_region().unwrap(), "eu-west-1");
        assert_eq!(config.aws.profile.as_deref(), Some("ops"));
        assert_eq!(config.server.duplicate_policy, DuplicatePolicy::Replace);
    }

    #[test]
    fn test_env_does_not_override_file_region() {
        let mut config = ArgosConfig::from_yaml("aws:\n  region: ap-south-1\n").unwrap();
        config
            .apply_env_from(|k| (k == "AWS_REGION").then(|| "eu-west-1".to_string()))
            .unwrap();
        assert_eq!(config.resolved_region().unwrap(), "ap-south-1");
    }

    #[test]
    fn test_invalid_policy_in_env() {
        let mut config = ArgosConfig::default();
        let result = config
            .apply_env_from(|k| (k == "ARGOS_DUPLICATE_POLICY").then(|| "sometimes".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  name: rds-assistant").unwrap();

        let config = ArgosConfig::load(file.path()).unwrap();
        assert_eq!(config.server.name, "rds-assistant");

        assert!(ArgosConfig::load("/nonexistent/argos.yaml").is_err());
    }
}
