//! Anthropic Messages API provider

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::config::LlmConfig;

use super::provider::LlmProvider;
use super::types::{LlmResponse, Message, MessageRequest, MessageResponse, ToolDefinition};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// System prompt for the payments assistant
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that helps with Adyen payment operations.
You have access to Adyen tools for:
- Checking payment status
- Creating payment links
- Processing refunds
- Canceling payments
- Managing terminals
- Viewing webhook configurations

When users ask about payments, use the appropriate tool.
Be concise and helpful. Always confirm actions before executing them.
For destructive actions (refunds, cancellations), clearly state what will happen.";

/// Anthropic LLM provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_base: String,
    system_prompt: String,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl AnthropicProvider {
    /// Create a provider from configuration
    pub fn new(config: &LlmConfig) -> Self {
        tracing::info!("[Anthropic] Using model: {}", config.model);

        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_base: DEFAULT_API_BASE.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Set the max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point at a different API base (proxy, test server)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn build_request(&self, user_message: &str, tools: &[ToolDefinition]) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message::user(user_message)],
            system: Some(self.system_prompt.clone()),
            tools: tools.to_vec(),
        }
    }

    async fn send_request(&self, request: &MessageRequest) -> Result<MessageResponse> {
        let url = format!("{}/messages", self.api_base);

        let request_json =
            serde_json::to_string(request).context("Failed to serialize Anthropic request")?;
        tracing::debug!("[Anthropic] Request JSON: {}", request_json);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .body(request_json)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read Anthropic response body")?;

        tracing::debug!("[Anthropic] Response status: {}", status);
        tracing::debug!("[Anthropic] Response body: {}", response_text);

        if !status.is_success() {
            tracing::error!("[Anthropic] API error: {} - {}", status, response_text);
            anyhow::bail!("Anthropic API error ({}): {}", status, response_text);
        }

        serde_json::from_str(&response_text).context("Failed to parse Anthropic API response")
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn plan(&self, user_message: &str, tools: &[ToolDefinition]) -> Result<LlmResponse> {
        tracing::info!(
            "[Anthropic] Planning for message ({} chars, {} tools)",
            user_message.len(),
            tools.len()
        );

        let request = self.build_request(user_message, tools);
        let response = self.send_request(&request).await?;

        tracing::info!(
            "[Anthropic] Response {} stop_reason={:?}",
            response.id,
            response.stop_reason
        );

        Ok(LlmResponse::from(response))
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}
