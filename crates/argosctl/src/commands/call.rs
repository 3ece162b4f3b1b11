//! Call command - dispatch one tool locally, without an MCP client
//!
//! Ctrl-C cancels the call; subprocess tools kill their child process.

use std::path::Path;

use anyhow::{bail, Context, Result};
use argos_core::ToolContext;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{build_dispatcher, load_config};

pub async fn execute(config: Option<&Path>, tool: &str, args: &str) -> Result<()> {
    let args = match serde_json::from_str::<Value>(args).context("--args must be valid JSON")? {
        Value::Object(map) => map,
        other => bail!("--args must be a JSON object, got {}", other),
    };

    let dispatcher = build_dispatcher(load_config(config)?)?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling tool call");
                cancel.cancel();
            }
        })
    };

    let ctx = ToolContext::new()
        .with_request_id("cli")
        .with_cancellation(cancel);
    let result = dispatcher.dispatch(tool, ctx, args).await;
    interrupt.abort();

    match result? {
        Value::Null => {}
        Value::String(text) => println!("{}", text),
        payload => println!("{}", serde_json::to_string_pretty(&payload)?),
    }
    Ok(())
}
