//! MCP (Model Context Protocol) tool bridge
//!
//! Payment operations are performed by an external MCP tool server. This
//! module provides the client side of that hand-off.
//!
//! # Architecture
//!
//! - `ToolBridge`: start/stop/list/call surface the processor depends on
//! - `StdioToolServer`: spawns the server and speaks JSON-RPC over stdio
//! - `StaticToolBridge`: in-memory bridge with scripted outcomes
//! - `tool_adapter`: converts MCP tool schemas and results
//!
//! # Usage
//!
//! ```ignore
//! use payments_assistant::mcp::{StdioToolServer, ToolBridge, ToolServerConfig};
//!
//! let config = ToolServerConfig::adyen("npx", &api_key, "TEST", None);
//! let mut bridge = StdioToolServer::new(config);
//! bridge.start().await?;
//! let text = bridge.call_tool("get_payment_status", args).await?;
//! bridge.stop().await?;
//! ```
//!
//! One bridge serves one batch of work; it is never shared across batches.

mod config;
mod memory;
mod protocol;
mod server;
mod tool_adapter;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::AssistantResult;
use crate::llm::ToolDefinition;

pub use config::{ToolServerConfig, DEFAULT_CALL_TIMEOUT_SECS, PROTOCOL_VERSION};
pub use memory::{RecordedCall, StaticToolBridge, ToolOutcome};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::StdioToolServer;
pub use tool_adapter::{call_result_text, to_tool_definition};

/// Synchronous request/response channel to the tool provider
#[async_trait]
pub trait ToolBridge: Send + Sync {
    /// Bring the provider up: spawn, handshake and discover tools
    async fn start(&mut self) -> AssistantResult<()>;

    /// Close the channel and terminate the provider. Safe to call twice.
    async fn stop(&mut self) -> AssistantResult<()>;

    /// Discovered tools in the LLM's tool-definition format
    fn list_tools(&self) -> Vec<ToolDefinition>;

    /// Invoke a tool and return its text output.
    ///
    /// Concurrent callers are serialized.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> AssistantResult<String>;
}
