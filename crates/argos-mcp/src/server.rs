//! MCP server loop over newline-delimited JSON-RPC
//!
//! Requests are read one line at a time. `tools/call` runs in its own task
//! with its own cancellation token, so a slow tool never blocks the loop.
//! Every response goes through a single writer task, which keeps output
//! lines whole. A line that is not valid UTF-8 or JSON is answered with a
//! parse error and the loop carries on.

use std::sync::Arc;
use std::time::Instant;

use argos_core::{ArgosError, ArgosResult, Dispatcher, ToolContext};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{
    call_error, call_result, CallToolParams, CancelledParams, JsonRpcRequest, JsonRpcResponse,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, MCP_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};

/// Name and version reported in the `initialize` response
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Cancellation tokens of running calls, keyed by the JSON text of the
/// request id so that `7` and `"7"` stay distinct
type InFlight = Arc<DashMap<String, CancellationToken>>;

pub struct McpServer {
    dispatcher: Dispatcher,
    info: ServerInfo,
    in_flight: InFlight,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            dispatcher,
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Serve on the process stdin/stdout until stdin closes
    pub async fn serve_stdio(&self) -> ArgosResult<()> {
        info!(
            server = %self.info.name,
            tools = self.dispatcher.len(),
            "MCP server listening on stdio"
        );
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve until `reader` reaches EOF, then wait for in-flight calls
    ///
    /// Finished call tasks are reaped while reading, so a long session does
    /// not accumulate them.
    pub async fn serve<R, W>(&self, mut reader: R, writer: W) -> ArgosResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let mut calls = JoinSet::new();
        let mut read_error = None;

        // read_until keeps partial input in `buf` when the other branch wins
        let mut buf = Vec::new();
        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        self.handle_input(&buf, &tx, &mut calls);
                        buf.clear();
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input, shutting down");
                        read_error = Some(e);
                        break;
                    }
                },
                Some(joined) = calls.join_next(), if !calls.is_empty() => reap(joined),
            }
        }

        if !calls.is_empty() {
            info!(pending = calls.len(), "Input closed, waiting for in-flight calls");
        }
        while let Some(joined) = calls.join_next().await {
            reap(joined);
        }

        drop(tx);
        writer_task
            .await
            .map_err(|e| ArgosError::protocol(format!("writer task failed: {}", e)))??;

        match read_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Handle one raw input line, including its trailing newline if any
    fn handle_input(
        &self,
        bytes: &[u8],
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
        calls: &mut JoinSet<()>,
    ) {
        let line = match std::str::from_utf8(bytes) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(error = %e, "Received a line that is not valid UTF-8");
                send(
                    tx,
                    JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)),
                );
                return;
            }
        };
        if line.is_empty() {
            return;
        }
        debug!("Received: {}", line);

        if let Some(response) = self.handle_line(line, tx, calls) {
            send(tx, response);
        }
    }

    /// Handle one input line; `tools/call` answers later from its own task
    fn handle_line(
        &self,
        line: &str,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
        calls: &mut JoinSet<()>,
    ) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id.unwrap_or(Value::Null),
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ))
            }
        };

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        let method = request.method.clone();
        match method.as_str() {
            "initialize" => Some(self.handle_initialize(&request, id)),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(self.handle_list_tools(id)),
            "tools/call" => self.handle_tool_call(request, id, tx, calls),
            method => Some(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => debug!("Client initialized"),
            "notifications/cancelled" => {
                let params = request
                    .params
                    .clone()
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok());
                let Some(params) = params else {
                    warn!("Ignoring cancellation without requestId");
                    return;
                };
                match self.in_flight.get(&params.request_id.to_string()) {
                    Some(token) => {
                        info!(request_id = %params.request_id, reason = ?params.reason, "Cancelling tool call");
                        token.cancel();
                    }
                    None => debug!(request_id = %params.request_id, "Cancellation for unknown or finished request"),
                }
            }
            method => debug!(method, "Ignoring notification"),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcRequest, id: Value) -> JsonRpcResponse {
        let client_info = request
            .params
            .as_ref()
            .and_then(|p| p.get("clientInfo"))
            .cloned()
            .unwrap_or(json!({}));
        info!("Received initialize request from client: {}", client_info);

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": MCP_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": self.info,
            }),
        )
    }

    fn handle_list_tools(&self, id: Value) -> JsonRpcResponse {
        let tools = self.dispatcher.definitions();
        debug!(count = tools.len(), "Listing tools");
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    fn handle_tool_call(
        &self,
        request: JsonRpcRequest,
        id: Value,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
        calls: &mut JoinSet<()>,
    ) -> Option<JsonRpcResponse> {
        let params: CallToolParams = match request.params.map(serde_json::from_value::<CallToolParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                ))
            }
            None => {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "Invalid params: missing tool name",
                ))
            }
        };
        let args = match params.arguments() {
            Ok(args) => args,
            Err(message) => return Some(JsonRpcResponse::error(id, INVALID_PARAMS, message)),
        };

        let key = id.to_string();
        let request_id = request_label(&id);
        let token = CancellationToken::new();
        if self.in_flight.insert(key.clone(), token.clone()).is_some() {
            warn!(request_id = %request_id, "Request id reused while a call is still running");
        }

        let ctx = ToolContext::new()
            .with_request_id(request_id.clone())
            .with_cancellation(token.clone());
        let dispatcher = self.dispatcher.clone();
        let in_flight = self.in_flight.clone();
        let tx = tx.clone();

        calls.spawn(async move {
            let start = Instant::now();
            // The handler runs in a task of its own so a panic surfaces as a JoinError
            let tool = params.name.clone();
            let outcome = tokio::spawn(async move { dispatcher.dispatch(&tool, ctx, args).await }).await;
            in_flight.remove(&key);

            let result = match outcome {
                Ok(Ok(payload)) => call_result(payload),
                Ok(Err(e)) if e.is_not_found() => {
                    send(&tx, JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string()));
                    return;
                }
                Ok(Err(_)) if token.is_cancelled() => {
                    debug!(tool = %params.name, request_id = %request_id, "Dropping response for cancelled call");
                    return;
                }
                Ok(Err(e)) => call_error(e.to_string()),
                Err(e) => {
                    warn!(tool = %params.name, request_id = %request_id, error = %e, "Tool call panicked");
                    send(
                        &tx,
                        JsonRpcResponse::error(
                            id,
                            INTERNAL_ERROR,
                            format!("Internal error: tool {} failed unexpectedly", params.name),
                        ),
                    );
                    return;
                }
            };

            debug!(
                tool = %params.name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Tool call answered"
            );
            send(&tx, JsonRpcResponse::success(id, result));
        });

        None
    }
}

/// Request id as handlers and logs see it: strings bare, numbers as written
fn request_label(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "Tool call task failed");
    }
}

fn send(tx: &mpsc::UnboundedSender<JsonRpcResponse>, response: JsonRpcResponse) {
    if tx.send(response).is_err() {
        warn!("Output closed, dropping response");
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> ArgosResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
