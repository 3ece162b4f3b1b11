//! Argos MCP - Model Context Protocol server
//!
//! Exposes a frozen [`argos_core::Dispatcher`] to MCP clients over
//! newline-delimited JSON-RPC 2.0 on stdin/stdout. Logs must go to stderr;
//! stdout carries protocol messages only.
//!
//! # Example
//!
//! ```rust,ignore
//! use argos_mcp::McpServer;
//!
//! let server = McpServer::new(dispatcher, "argos", argos_core::VERSION);
//! server.serve_stdio().await?;
//! ```

pub mod protocol;
pub mod server;

pub use protocol::{
    call_error, call_result, JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION,
};
pub use server::{McpServer, ServerInfo};
