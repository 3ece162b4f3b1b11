//! Dispatcher - routes calls from the transport to registered handlers
//!
//! The dispatcher is the read-only form of the registry. It is cheap to clone
//! and safe to share between concurrent calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ArgosError, ArgosResult};
use crate::tool::{ToolArguments, ToolContext, ToolDefinition, ToolDescriptor};

#[derive(Debug, Clone)]
pub struct Dispatcher {
    tools: Arc<HashMap<String, ToolDescriptor>>,
}

impl Dispatcher {
    pub(crate) fn new(tools: HashMap<String, ToolDescriptor>) -> Self {
        Self {
            tools: Arc::new(tools),
        }
    }

    /// Definitions to advertise at startup, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(ToolDescriptor::definition).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up `name` and invoke its handler once with `ctx` and `args`
    ///
    /// The handler's payload or error is returned unchanged. No schema
    /// validation, retry or error wrapping happens here.
    pub async fn dispatch(
        &self,
        name: &str,
        ctx: ToolContext,
        args: ToolArguments,
    ) -> ArgosResult<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ArgosError::ToolNotFound(name.to_string()))?;

        debug!(tool = %name, request_id = ?ctx.request_id(), "Dispatching tool call");
        let start = Instant::now();

        match tool.handler.call(ctx, args).await {
            Ok(payload) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(tool = %name, elapsed_ms = %elapsed, "Tool call complete");
                Ok(payload)
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DuplicatePolicy, ToolRegistry};
    use crate::tool::handler_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    fn counting(name: &str, calls: Arc<AtomicUsize>, payload: Value) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            "",
            handler_fn(move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                let payload = payload.clone();
                async move { Ok(payload) }
            }),
        )
    }

    #[tokio::test]
    async fn test_ping_returns_pong() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new(
                "ping",
                "",
                handler_fn(|_, _| async { Ok(json!("pong")) }),
            ))
            .unwrap();
        let dispatcher = registry.into_dispatcher();

        let result = dispatcher
            .dispatch("ping", ToolContext::new(), ToolArguments::new())
            .await
            .unwrap();
        assert_eq!(result, json!("pong"));
        assert_eq!(dispatcher.definitions()[0].input_schema, json!({"type": "object"}));
    }

    #[tokio::test]
    async fn test_echo_returns_argument() {
        let schema = json!({"type": "object", "properties": {"msg": {"type": "string"}}});
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDescriptor::new(
                    "echo",
                    "Echo a message",
                    handler_fn(|_, args| async move {
                        Ok(args.get("msg").cloned().unwrap_or(Value::Null))
                    }),
                )
                .with_input_schema(schema.clone()),
            )
            .unwrap();
        let dispatcher = registry.into_dispatcher();

        let result = dispatcher
            .dispatch("echo", ToolContext::new(), args(json!({"msg": "hi"})))
            .await
            .unwrap();
        assert_eq!(result, json!("hi"));
        assert_eq!(dispatcher.definitions()[0].input_schema, schema);
    }

    #[tokio::test]
    async fn test_duplicate_replace_invokes_latest_handler() {
        let h1 = Arc::new(AtomicUsize::new(0));
        let h2 = Arc::new(AtomicUsize::new(0));

        let mut registry = ToolRegistry::with_policy(DuplicatePolicy::Replace);
        registry.register(counting("dup", h1.clone(), json!(1))).unwrap();
        registry.register(counting("dup", h2.clone(), json!(2))).unwrap();
        let dispatcher = registry.into_dispatcher();

        let result = dispatcher
            .dispatch("dup", ToolContext::new(), ToolArguments::new())
            .await
            .unwrap();
        assert_eq!(result, json!(2));
        assert_eq!(h1.load(Ordering::SeqCst), 0);
        assert_eq!(h2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_tool_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(counting("present", calls.clone(), json!(null))).unwrap();
        let dispatcher = registry.into_dispatcher();

        let err = dispatcher
            .dispatch("missing", ToolContext::new(), ToolArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArgosError::ToolNotFound(ref n) if n == "missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_and_arguments_pass_through() {
        let seen: Arc<Mutex<Vec<(Option<String>, ToolArguments)>>> = Arc::default();
        let sink = seen.clone();

        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new(
                "record",
                "",
                handler_fn(move |ctx, args| {
                    sink.lock()
                        .unwrap()
                        .push((ctx.request_id().map(str::to_string), args));
                    async { Ok(Value::Null) }
                }),
            ))
            .unwrap();
        let dispatcher = registry.into_dispatcher();

        let supplied = args(json!({"nested": {"a": [1, 2, 3]}, "extra": true}));
        let result = dispatcher
            .dispatch("record", ToolContext::new().with_request_id("42"), supplied.clone())
            .await
            .unwrap();
        assert_eq!(result, Value::Null);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("42"));
        assert_eq!(seen[0].1, supplied);
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new(
                "broken",
                "",
                handler_fn(|_, _| async { Err(ArgosError::tool("upstream unreachable")) }),
            ))
            .unwrap();
        let dispatcher = registry.into_dispatcher();

        let err = dispatcher
            .dispatch("broken", ToolContext::new(), ToolArguments::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "upstream unreachable");
    }

    #[tokio::test]
    async fn test_concurrent_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(counting("shared", calls.clone(), json!("ok"))).unwrap();
        let dispatcher = registry.into_dispatcher();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let d = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                d.dispatch("shared", ToolContext::new(), ToolArguments::new()).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!("ok"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 16);
    }
}
