pub mod anthropic;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::LlmProvider;
pub use types::{
    ContentBlock, LlmResponse, Message, MessageContent, MessageRequest, MessageResponse,
    StopReason, ToolCall, ToolDefinition, ToolInputSchema, Usage,
};
