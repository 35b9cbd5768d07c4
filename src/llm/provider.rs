//! LLM Provider trait
//!
//! Abstracts the chat-completion call that turns a user message into either
//! a text reply or proposed tool calls.

use anyhow::Result;

use super::types::{LlmResponse, ToolDefinition};

/// Chat-completion collaborator
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Ask the model what to do about `user_message` given the available tools.
    ///
    /// The model only proposes; nothing is executed here.
    async fn plan(&self, user_message: &str, tools: &[ToolDefinition]) -> Result<LlmResponse>;

    /// Get the current model name
    fn model(&self) -> String;

    /// Get the provider name (e.g., "anthropic")
    fn provider_name(&self) -> &str;
}
