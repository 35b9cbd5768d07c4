//! Audit trail of authorization outcomes
//!
//! Every permission decision and every executed or failed operation produces
//! an [`AuditEntry`]. Entries are emitted as structured `tracing` events and,
//! when an audit channel is configured, posted there by [`ChatAuditLogger`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::chat::{mention, ChatClient};
use crate::core::AssistantResult;

/// Kind of audited outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEvent {
    Allowed,
    Denied,
    Approved,
    Rejected,
    Error,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Allowed => "allowed",
            AuditEvent::Denied => "denied",
            AuditEvent::Approved => "approved",
            AuditEvent::Rejected => "rejected",
            AuditEvent::Error => "error",
        }
    }

    /// Slack emoji shown next to the entry
    pub fn emoji(&self) -> &'static str {
        match self {
            AuditEvent::Allowed => ":white_check_mark:",
            AuditEvent::Denied => ":no_entry:",
            AuditEvent::Approved => ":heavy_check_mark:",
            AuditEvent::Rejected => ":x:",
            AuditEvent::Error => ":warning:",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audited outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// User who asked for the operation
    pub user_id: String,
    pub action: String,
    pub channel: String,
    /// Approver or rejector, for resolved approvals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEntry {
    pub fn new(event: AuditEvent, user_id: &str, action: &str, channel: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
            user_id: user_id.to_string(),
            action: action.to_string(),
            channel: channel.to_string(),
            resolved_by: None,
            details: None,
        }
    }

    pub fn allowed(user_id: &str, action: &str, channel: &str, details: impl Into<String>) -> Self {
        Self::new(AuditEvent::Allowed, user_id, action, channel).with_details(details)
    }

    pub fn denied(user_id: &str, action: &str, channel: &str, reason: impl Into<String>) -> Self {
        Self::new(AuditEvent::Denied, user_id, action, channel).with_details(reason)
    }

    pub fn approved(
        user_id: &str,
        action: &str,
        channel: &str,
        approver: &str,
        details: impl Into<String>,
    ) -> Self {
        Self::new(AuditEvent::Approved, user_id, action, channel)
            .with_resolved_by(approver)
            .with_details(details)
    }

    pub fn rejected(user_id: &str, action: &str, channel: &str, rejector: &str) -> Self {
        Self::new(AuditEvent::Rejected, user_id, action, channel)
            .with_resolved_by(rejector)
            .with_details("Request rejected")
    }

    pub fn error(user_id: &str, action: &str, channel: &str, message: impl Into<String>) -> Self {
        Self::new(AuditEvent::Error, user_id, action, channel).with_details(message)
    }

    pub fn with_resolved_by(mut self, user_id: &str) -> Self {
        self.resolved_by = Some(user_id.to_string());
        self
    }

    /// Attach details; empty text is dropped
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        self.details = if details.is_empty() { None } else { Some(details) };
        self
    }

    /// Chat rendering of the entry
    pub fn format(&self) -> String {
        let mut text = format!(
            "{} *{}* | `{}`\n*User:* {} | *Channel:* <#{}>\n*Time:* {}",
            self.event.emoji(),
            self.event,
            self.action,
            mention(&self.user_id),
            self.channel,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        if let Some(by) = &self.resolved_by {
            let verb = if self.event == AuditEvent::Rejected {
                "Rejected by"
            } else {
                "Approved by"
            };
            text.push_str(&format!("\n*{}:* {}", verb, mention(by)));
        }

        if let Some(details) = &self.details {
            text.push_str(&format!("\n*Details:* {}", details));
        }

        text
    }
}

/// Destination of audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> AssistantResult<()>;
}

/// Posts audit entries to a chat channel
pub struct ChatAuditLogger {
    chat: Arc<dyn ChatClient>,
    channel: Option<String>,
}

impl ChatAuditLogger {
    /// `channel` of `None` only emits tracing events
    pub fn new(chat: Arc<dyn ChatClient>, channel: Option<&str>) -> Self {
        Self {
            chat,
            channel: channel.filter(|c| !c.is_empty()).map(String::from),
        }
    }
}

#[async_trait]
impl AuditSink for ChatAuditLogger {
    async fn record(&self, entry: &AuditEntry) -> AssistantResult<()> {
        tracing::info!(
            target: "audit",
            id = %entry.id,
            event = %entry.event,
            user = %entry.user_id,
            action = %entry.action,
            channel = %entry.channel,
            resolved_by = entry.resolved_by.as_deref().unwrap_or(""),
            details = entry.details.as_deref().unwrap_or(""),
            "[Audit] {} {}",
            entry.event,
            entry.action
        );

        let Some(channel) = &self.channel else {
            return Ok(());
        };
        self.chat.post_message(channel, None, &entry.format()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AssistantError;
    use chrono::TimeZone;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingChat {
        posts: Mutex<Vec<(String, Option<String>, String)>>,
    }

    #[async_trait]
    impl ChatClient for RecordingChat {
        async fn post_message(
            &self,
            channel: &str,
            thread_ts: Option<&str>,
            text: &str,
        ) -> AssistantResult<String> {
            if channel == "C_GONE" {
                return Err(AssistantError::Chat("channel_not_found".into()));
            }
            self.posts
                .lock()
                .await
                .push((channel.into(), thread_ts.map(String::from), text.into()));
            Ok("1.0".into())
        }
    }

    fn at_noon(mut entry: AuditEntry) -> AuditEntry {
        entry.timestamp = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        entry
    }

    #[test]
    fn test_format_allowed() {
        let entry = at_noon(AuditEntry::allowed("U1", "get_payment_status", "C1", "Executed successfully"));
        assert_eq!(
            entry.format(),
            ":white_check_mark: *allowed* | `get_payment_status`\n\
             *User:* <@U1> | *Channel:* <#C1>\n\
             *Time:* 2025-03-01 12:00:00 UTC\n\
             *Details:* Executed successfully"
        );
    }

    #[test]
    fn test_format_resolutions() {
        let approved = AuditEntry::approved("U1", "refund_payment", "C1", "U2", "");
        assert!(approved.format().contains("*Approved by:* <@U2>"));
        assert!(!approved.format().contains("Details"));

        let rejected = AuditEntry::rejected("U1", "refund_payment", "C1", "U3");
        assert!(rejected.format().starts_with(":x: *rejected*"));
        assert!(rejected.format().contains("*Rejected by:* <@U3>"));
        assert!(rejected.format().contains("*Details:* Request rejected"));
    }

    #[test]
    fn test_entry_json() {
        let value = serde_json::to_value(AuditEntry::denied("U1", "cancel_payment", "C1", "admin required")).unwrap();
        assert_eq!(value["event"], "denied");
        assert_eq!(value["details"], "admin required");
        assert!(value.get("resolved_by").is_none());
    }

    #[tokio::test]
    async fn test_logger_posts_to_audit_channel() {
        let chat = Arc::new(RecordingChat::default());
        let logger = ChatAuditLogger::new(chat.clone(), Some("C_AUDIT"));

        logger
            .record(&AuditEntry::error("U1", "refund_payment", "C1", "boom"))
            .await
            .unwrap();

        let posts = chat.posts.lock().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "C_AUDIT");
        assert_eq!(posts[0].1, None);
        assert!(posts[0].2.starts_with(":warning: *error*"));
    }

    #[tokio::test]
    async fn test_logger_without_channel_is_silent() {
        let chat = Arc::new(RecordingChat::default());
        for channel in [None, Some("")] {
            let logger = ChatAuditLogger::new(chat.clone(), channel);
            logger
                .record(&AuditEntry::denied("U1", "refund_payment", "C1", "admin required"))
                .await
                .unwrap();
        }
        assert!(chat.posts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_logger_surfaces_post_failure() {
        let logger = ChatAuditLogger::new(Arc::new(RecordingChat::default()), Some("C_GONE"));
        let err = logger
            .record(&AuditEntry::denied("U1", "refund_payment", "C1", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Chat(_)));
    }
}
