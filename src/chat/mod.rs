//! Group-chat collaborator
//!
//! The assistant only needs two things from the chat product: posting a
//! message into a thread, and (through [`GroupDirectory`]) resolving user
//! group membership. [`SlackClient`] implements both over the Slack Web API.
//!
//! [`GroupDirectory`]: crate::permissions::GroupDirectory

mod slack;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::AssistantResult;

pub use slack::SlackClient;

/// Posts messages into channels and threads
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post `text` to `channel`, inside `thread_ts` when given.
    ///
    /// Returns the timestamp of the posted message, which identifies it.
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> AssistantResult<String>;
}

/// An incoming chat message the assistant replies to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: String,
    pub user: String,
    pub text: String,
    /// Timestamp of this message
    pub ts: String,
    /// Thread the message belongs to, if any
    pub thread_ts: Option<String>,
}

impl ChatMessage {
    /// Thread to reply into.
    ///
    /// Replies continue the message's thread, or start one under the message.
    pub fn reply_thread(&self) -> &str {
        match self.thread_ts.as_deref() {
            Some(thread) if !thread.is_empty() => thread,
            _ => &self.ts,
        }
    }

    /// Reply in this message's thread
    pub async fn reply(&self, chat: &dyn ChatClient, text: &str) -> AssistantResult<String> {
        chat.post_message(&self.channel, Some(self.reply_thread()), text)
            .await
    }
}

/// Slack user mention markup
pub fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}
