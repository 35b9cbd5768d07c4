//! Queued event records
//!
//! The webhook front end enqueues one JSON record per chat event:
//! `{"type": ..., "event": {...}, "botUserId": ...}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{mention, ChatMessage};
use crate::core::AssistantResult;

/// A record as it sits on the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub event: Value,
    #[serde(default, rename = "botUserId")]
    pub bot_user_id: String,
}

/// A chat message mentioning or addressed to the bot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

/// The message a reaction was added to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionItem {
    #[serde(default, rename = "type")]
    pub kind: String,
    pub channel: String,
    pub ts: String,
}

/// A reaction added to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub user: String,
    pub reaction: String,
    pub item: ReactionItem,
}

/// A queue record routed by type
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedEvent {
    Message(ChatMessage),
    Reaction(ReactionEvent),
    /// A record type nothing handles
    Ignored(String),
}

impl QueueMessage {
    /// Parse one queue record
    pub fn parse(record: &str) -> AssistantResult<Self> {
        Ok(serde_json::from_str(record)?)
    }

    /// Decode the event payload according to the record type
    pub fn into_event(self) -> AssistantResult<QueuedEvent> {
        match self.kind.as_str() {
            "app_mention" | "message" => {
                let event: MessageEvent = serde_json::from_value(self.event)?;
                Ok(QueuedEvent::Message(event.into_chat_message(&self.bot_user_id)))
            }
            "reaction_added" => Ok(QueuedEvent::Reaction(serde_json::from_value(self.event)?)),
            _ => Ok(QueuedEvent::Ignored(self.kind)),
        }
    }
}

impl MessageEvent {
    /// Convert to a chat message with the bot mention removed from the text
    pub fn into_chat_message(self, bot_user_id: &str) -> ChatMessage {
        let mut text = self.text.trim().to_string();
        if !bot_user_id.is_empty() {
            text = text.replace(&mention(bot_user_id), "").trim().to_string();
        }

        ChatMessage {
            channel: self.channel,
            user: self.user,
            text,
            ts: self.ts,
            thread_ts: self.thread_ts.filter(|t| !t.is_empty()),
        }
    }
}
