//! Assistant error types

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while authorizing and executing payment operations
#[derive(Error, Debug)]
pub enum AssistantError {
    /// Invalid or incomplete configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The chat API rejected a call or could not be reached
    #[error("Chat API error: {0}")]
    Chat(String),

    /// Approval store read/write/delete failed
    #[error("Approval store error: {0}")]
    Store(String),

    /// The approval request lapsed before anyone resolved it
    #[error("Approval request {request_id} has expired")]
    ApprovalExpired {
        /// ID of the lapsed request (its prompt message timestamp)
        request_id: String,
        /// Channel the request was raised in
        channel: String,
        /// Thread the request was raised in
        thread_ts: String,
    },

    /// The tool server answered with a JSON-RPC error
    #[error("MCP error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code
        code: i64,
        /// Error message reported by the server
        message: String,
    },

    /// Transport-level failure talking to the tool server
    #[error("Tool bridge error: {0}")]
    Bridge(String),

    /// The tool ran but reported an application-level failure
    #[error("Tool error: {0}")]
    Tool(String),

    /// A tool server exchange exceeded its deadline
    #[error("Tool call timed out after {0:?}")]
    Timeout(Duration),

    /// The invocation was cancelled while a tool call was in flight
    #[error("Invocation cancelled")]
    Cancelled,

    /// The chat-completion call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AssistantError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AssistantError::InvalidConfig(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        AssistantError::Store(msg.into())
    }

    /// Create a bridge transport error
    pub fn bridge(msg: impl Into<String>) -> Self {
        AssistantError::Bridge(msg.into())
    }

    /// Whether this error came from the tool itself rather than the protocol
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, AssistantError::Tool(_))
    }
}

/// Result type alias for assistant operations
pub type AssistantResult<T> = Result<T, AssistantError>;
