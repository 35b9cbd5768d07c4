//! Tool server configuration
//!
//! Describes how to launch the tool server process and talk to it

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MCP protocol revision announced during the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Deadline for one request/response exchange unless configured otherwise
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;

/// Configuration for the stdio tool server
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Identifier used in logs
    pub id: String,

    /// Executable to spawn
    pub command: String,

    /// Command line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Deadline for a single request/response exchange, in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Protocol revision sent in `initialize`
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Client name sent in `initialize`
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn default_client_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

// Arguments carry the API key, keep them out of logs
impl std::fmt::Debug for ToolServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServerConfig")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("args", &format_args!("[{} redacted]", self.args.len()))
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("protocol_version", &self.protocol_version)
            .finish()
    }
}

impl ToolServerConfig {
    /// Create a new tool server configuration
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: Vec::new(),
            call_timeout_secs: default_call_timeout_secs(),
            protocol_version: default_protocol_version(),
            client_name: default_client_name(),
        }
    }

    /// Launch configuration for the Adyen MCP server via `npx`
    pub fn adyen(
        command: impl Into<String>,
        api_key: &str,
        environment: &str,
        live_prefix: Option<&str>,
    ) -> Self {
        let mut config = Self::new("adyen", command)
            .with_arg("-y")
            .with_arg("@adyen/mcp")
            .with_arg(format!("--adyenApiKey={}", api_key))
            .with_arg(format!("--env={}", environment));

        if environment == "LIVE" {
            if let Some(prefix) = live_prefix.filter(|p| !p.is_empty()) {
                config = config.with_arg(format!("--livePrefix={}", prefix));
            }
        }

        config
    }

    /// Append an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the per-call deadline
    pub fn with_call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    /// Per-call deadline as Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
