//! Tool Registry - name to descriptor store
//!
//! The registry is filled once by the composition root, before any call is
//! served, and then frozen into a [`Dispatcher`]. Nothing writes to it after
//! that point.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{ArgosError, ArgosResult};
use crate::tool::ToolDescriptor;

/// What `register` does when a name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with `RegistrationConflict`; the first descriptor stays
    #[default]
    Reject,
    /// Last write wins
    Replace,
}

impl FromStr for DuplicatePolicy {
    type Err = ArgosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "replace" => Ok(Self::Replace),
            other => Err(ArgosError::config(format!(
                "unknown duplicate policy '{}' (expected reject or replace)",
                other
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
    policy: DuplicatePolicy,
}

impl ToolRegistry {
    /// Create an empty registry that rejects duplicate names
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            tools: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Register a descriptor under its name
    ///
    /// The input schema is not inspected. Duplicate names follow the
    /// registry's [`DuplicatePolicy`].
    pub fn register(&mut self, descriptor: ToolDescriptor) -> ArgosResult<&mut Self> {
        if descriptor.name.is_empty() {
            return Err(ArgosError::config("tool name must not be empty"));
        }

        if self.tools.contains_key(&descriptor.name) {
            match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(ArgosError::RegistrationConflict(descriptor.name));
                }
                DuplicatePolicy::Replace => {
                    warn!(tool = %descriptor.name, "Replacing previously registered tool");
                }
            }
        }

        info!(tool = %descriptor.name, "Registering tool");
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(self)
    }

    /// Invoke each plugin constructor in order and register what it returns
    pub fn register_plugins<E>(
        &mut self,
        plugins: &[fn(&E) -> ToolDescriptor],
        env: &E,
    ) -> ArgosResult<&mut Self> {
        for plugin in plugins {
            self.register(plugin(env))?;
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Snapshot of every registered descriptor. Callers must not rely on order.
    pub fn all(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Freeze the registry into a shareable dispatcher
    pub fn into_dispatcher(self) -> Dispatcher {
        Dispatcher::new(self.tools)
    }
}
