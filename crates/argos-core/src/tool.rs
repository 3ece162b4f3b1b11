//! Tool descriptors and the handler contract
//!
//! A [`ToolDescriptor`] is the registered unit of callable functionality: a
//! unique name, a description, an optional JSON input schema and the
//! [`ToolHandler`] that does the work.
//!
//! # Example
//!
//! ```
//! use argos_core::{handler_fn, ToolDescriptor};
//! use serde_json::json;
//!
//! let ping = ToolDescriptor::new(
//!     "ping",
//!     "Health check",
//!     handler_fn(|_ctx, _args| async { Ok(json!("pong")) }),
//! );
//!
//! assert_eq!(ping.effective_input_schema(), json!({"type": "object"}));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ArgosError, ArgosResult};

/// Arguments supplied by the caller, passed to handlers unmodified
pub type ToolArguments = serde_json::Map<String, Value>;

/// Schema advertised for tools that do not declare one: accept any object
pub fn default_input_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

/// Per-call context threaded from the transport to the handler
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    request_id: Option<String>,
    cancellation: CancellationToken,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the transport-level request identifier (for logging)
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the caller cancels this call
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}

/// The capability invoked for one tool
///
/// Handlers receive the call context and the argument object exactly as the
/// caller supplied it. They return a JSON payload (possibly `null`) or an
/// error whose message is surfaced to the caller unchanged.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(ToolContext, ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ArgosResult<Value>> + Send + 'static,
{
    async fn call(&self, ctx: ToolContext, args: ToolArguments) -> ArgosResult<Value> {
        (self.0)(ctx, args).await
    }
}

/// Wrap an async closure as a shared handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(ToolContext, ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ArgosResult<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Registered unit of callable functionality
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Option<Value>,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
            handler,
        }
    }

    /// Declare the accepted arguments. The schema is stored as given.
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Schema exposed at the call boundary
    pub fn effective_input_schema(&self) -> Value {
        self.input_schema
            .clone()
            .unwrap_or_else(default_input_schema)
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.effective_input_schema(),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// What the transport advertises for each tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Extract a required argument
pub fn get_arg<T: DeserializeOwned>(args: &ToolArguments, key: &str) -> ArgosResult<T> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ArgosError::invalid_argument(format!(
            "missing required argument: {}",
            key
        ))),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ArgosError::invalid_argument(format!("argument '{}': {}", key, e))),
    }
}

/// Extract an optional argument; absent and `null` both yield `None`
pub fn get_optional_arg<T: DeserializeOwned>(
    args: &ToolArguments,
    key: &str,
) -> ArgosResult<Option<T>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_arg(args, key).map(Some),
    }
}
