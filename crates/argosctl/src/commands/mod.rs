pub mod call;
pub mod serve;
pub mod tools;
pub mod version;

use std::path::Path;

use anyhow::Context;
use argos_core::{ArgosConfig, Dispatcher};
use argos_tools::{build_registry, PluginEnv};

/// Load the configuration file (if any) and overlay the environment
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ArgosConfig> {
    let mut config = match path {
        Some(path) => ArgosConfig::load(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => ArgosConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

/// Composition root: register the built-in plugins and freeze the registry
pub fn build_dispatcher(config: ArgosConfig) -> anyhow::Result<Dispatcher> {
    let env = PluginEnv::from_config(config);
    let registry = build_registry(&env).context("Failed to register tools")?;
    Ok(registry.into_dispatcher())
}
