//! Approval workflow
//!
//! `Requested` is the only live state. Approving, rejecting and expiring are
//! all terminal and all mean the record is gone from the store.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::chat::{mention, ChatClient, ChatMessage};
use crate::core::{AssistantError, AssistantResult, Clock, SystemClock};

use super::request::{format_amount, ApprovalRequest, Decision, Resolution};
use super::store::ApprovalStore;

/// How long a request stays open
pub const APPROVAL_TTL: Duration = Duration::from_secs(15 * 60);

/// Creates approval prompts and resolves reactions to them
pub struct ApprovalWorkflow {
    chat: Arc<dyn ChatClient>,
    store: Arc<dyn ApprovalStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ApprovalWorkflow {
    pub fn new(chat: Arc<dyn ChatClient>, store: Arc<dyn ApprovalStore>) -> Self {
        Self {
            chat,
            store,
            clock: Arc::new(SystemClock),
            ttl: APPROVAL_TTL,
        }
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the request lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Post an approval prompt in the origin thread and persist the request.
    ///
    /// The request is keyed by the prompt's timestamp. If persisting fails
    /// after the prompt went out, the prompt is left orphaned: reactions to
    /// it find no record and are ignored.
    pub async fn request_approval(
        &self,
        origin: &ChatMessage,
        action: &str,
        params: &Map<String, Value>,
        amount: u64,
        approvers: &[String],
    ) -> AssistantResult<ApprovalRequest> {
        let thread_ts = origin.reply_thread().to_string();
        let text = self.prompt_text(action, amount, &origin.user, approvers);

        let ts = self
            .chat
            .post_message(&origin.channel, Some(&thread_ts), &text)
            .await?;

        let request = ApprovalRequest {
            id: ts,
            channel: origin.channel.clone(),
            thread_ts,
            requested_by: origin.user.clone(),
            action: action.to_string(),
            params: params.clone(),
            amount,
            expires_at: self.clock.now().timestamp() + self.ttl.as_secs() as i64,
            approvers: approvers.to_vec(),
        };

        self.store.put(&request).await?;

        tracing::info!(
            "[ApprovalWorkflow] Requested approval {} for {} by {} ({} approvers)",
            request.id,
            request.action,
            request.requested_by,
            request.approvers.len()
        );
        Ok(request)
    }

    /// Resolve a reaction on a possible approval prompt.
    ///
    /// Returns `Ok(None)` when the reaction is irrelevant: not an approve or
    /// reject reaction, no pending request for the message, a different
    /// channel, or a user who is not an approver. A lapsed record is removed
    /// whoever reacted; the handler that removes it gets
    /// [`AssistantError::ApprovalExpired`].
    ///
    /// Only the handler whose delete actually removes the record resolves it.
    pub async fn handle_reaction(
        &self,
        reaction: &str,
        acting_user: &str,
        channel: &str,
        message_ts: &str,
    ) -> AssistantResult<Option<Resolution>> {
        let Some(decision) = Decision::from_reaction(reaction) else {
            return Ok(None);
        };

        let Some(request) = self.store.get(message_ts).await? else {
            tracing::debug!("[ApprovalWorkflow] No pending approval for {}", message_ts);
            return Ok(None);
        };

        if request.is_expired_at(self.clock.now()) {
            if !self.store.delete(&request.id).await? {
                tracing::debug!(
                    "[ApprovalWorkflow] Lapsed approval {} already removed elsewhere",
                    request.id
                );
                return Ok(None);
            }
            tracing::info!("[ApprovalWorkflow] Approval {} expired", request.id);
            return Err(AssistantError::ApprovalExpired {
                request_id: request.id,
                channel: request.channel,
                thread_ts: request.thread_ts,
            });
        }

        if request.channel != channel {
            tracing::debug!(
                "[ApprovalWorkflow] Reaction in {} does not match request channel {}",
                channel,
                request.channel
            );
            return Ok(None);
        }

        if !request.is_approver(acting_user) {
            tracing::debug!(
                "[ApprovalWorkflow] Ignoring reaction from non-approver {} on {}",
                acting_user,
                request.id
            );
            return Ok(None);
        }

        if !self.store.delete(&request.id).await? {
            tracing::info!(
                "[ApprovalWorkflow] Approval {} already resolved elsewhere",
                request.id
            );
            return Ok(None);
        }

        tracing::info!(
            "[ApprovalWorkflow] Approval {} {} by {}",
            request.id,
            decision,
            acting_user
        );
        Ok(Some(Resolution {
            decision,
            resolved_by: acting_user.to_string(),
            request,
        }))
    }

    /// Drop every lapsed request from the store
    pub async fn reap_expired(&self) -> AssistantResult<usize> {
        let reaped = self.store.reap_expired(self.clock.now()).await?;
        if reaped > 0 {
            tracing::warn!("[ApprovalWorkflow] Reaped {} unresolved approvals", reaped);
        }
        Ok(reaped)
    }

    fn prompt_text(&self, action: &str, amount: u64, requester: &str, approvers: &[String]) -> String {
        let waiting_for = approvers
            .iter()
            .map(|a| mention(a))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "*Approval Required*\n\n\
             *Action:* `{}`\n\
             *Amount:* {}\n\
             *Requested by:* {}\n\n\
             React with :white_check_mark: to approve or :x: to reject\n\
             Waiting for: {}\n\
             _Expires in {} minutes_",
            action,
            format_amount(amount),
            mention(requester),
            waiting_for,
            self.ttl.as_secs() / 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::MemoryApprovalStore;
    use crate::core::ManualClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingChat {
        posts: Mutex<Vec<(String, Option<String>, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatClient for RecordingChat {
        async fn post_message(
            &self,
            channel: &str,
            thread_ts: Option<&str>,
            text: &str,
        ) -> AssistantResult<String> {
            if self.fail {
                return Err(AssistantError::Chat("channel_not_found".into()));
            }
            let mut posts = self.posts.lock().await;
            posts.push((channel.into(), thread_ts.map(String::from), text.into()));
            Ok(format!("1700000000.{:06}", 300 + posts.len()))
        }
    }

    struct Fixture {
        workflow: ApprovalWorkflow,
        chat: Arc<RecordingChat>,
        store: Arc<MemoryApprovalStore>,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let chat = Arc::new(RecordingChat::default());
        let store = Arc::new(MemoryApprovalStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let workflow = ApprovalWorkflow::new(chat.clone(), store.clone())
            .with_clock(Arc::new(clock.clone()));
        Fixture {
            workflow,
            chat,
            store,
            clock,
        }
    }

    fn origin() -> ChatMessage {
        ChatMessage {
            channel: "C1".into(),
            user: "U_REQ".into(),
            text: "refund PSP1 150 EUR".into(),
            ts: "1700000000.000200".into(),
            thread_ts: Some("1700000000.000100".into()),
        }
    }

    fn params() -> Map<String, Value> {
        json!({"pspReference": "PSP1", "amount": {"value": 15000, "currency": "EUR"}})
            .as_object()
            .cloned()
            .unwrap()
    }

    async fn requested(f: &Fixture) -> ApprovalRequest {
        f.workflow
            .request_approval(
                &origin(),
                "refund_payment",
                &params(),
                15_000,
                &["U_A".to_string(), "U_B".to_string()],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_posts_prompt_and_persists() {
        let f = fixture();
        let request = requested(&f).await;

        let posts = f.chat.posts.lock().await;
        assert_eq!(posts.len(), 1);
        let (channel, thread, text) = &posts[0];
        assert_eq!(channel, "C1");
        assert_eq!(thread.as_deref(), Some("1700000000.000100"));
        assert!(text.contains("*Approval Required*"));
        assert!(text.contains("`refund_payment`"));
        assert!(text.contains("150.00"));
        assert!(text.contains("<@U_REQ>"));
        assert!(text.contains("Waiting for: <@U_A>, <@U_B>"));
        assert!(text.contains("_Expires in 15 minutes_"));

        assert_eq!(request.id, "1700000000.000301");
        assert_eq!(request.thread_ts, "1700000000.000100");
        assert_eq!(request.expires_at, f.clock.now().timestamp() + 900);
        assert_eq!(f.store.get(&request.id).await.unwrap(), Some(request));
    }

    #[tokio::test]
    async fn test_post_failure_persists_nothing() {
        let chat = Arc::new(RecordingChat {
            fail: true,
            ..Default::default()
        });
        let store = Arc::new(MemoryApprovalStore::new());
        let workflow = ApprovalWorkflow::new(chat, store.clone());

        let err = workflow
            .request_approval(&origin(), "cancel_payment", &Map::new(), 0, &["U_A".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Chat(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_approve_resolves_once() {
        let f = fixture();
        let request = requested(&f).await;

        let resolution = f
            .workflow
            .handle_reaction(":white_check_mark:", "U_B", "C1", &request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.decision, Decision::Approved);
        assert_eq!(resolution.resolved_by, "U_B");
        assert_eq!(resolution.request, request);
        assert!(f.store.is_empty().await);

        // A duplicate delivery finds nothing
        let again = f
            .workflow
            .handle_reaction("+1", "U_B", "C1", &request.id)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_reject() {
        let f = fixture();
        let request = requested(&f).await;

        let resolution = f
            .workflow
            .handle_reaction("no_entry", "U_A", "C1", &request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.decision, Decision::Rejected);
    }

    #[tokio::test]
    async fn test_irrelevant_reactions_are_ignored() {
        let f = fixture();
        let request = requested(&f).await;

        // Not an approval reaction
        assert!(f.workflow.handle_reaction("eyes", "U_A", "C1", &request.id).await.unwrap().is_none());
        // Requester is not an approver
        assert!(f.workflow.handle_reaction("+1", "U_REQ", "C1", &request.id).await.unwrap().is_none());
        // Wrong channel
        assert!(f.workflow.handle_reaction("+1", "U_A", "C2", &request.id).await.unwrap().is_none());
        // Not a prompt message
        assert!(f.workflow.handle_reaction("+1", "U_A", "C1", "1.0").await.unwrap().is_none());

        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_request_is_removed() {
        let f = fixture();
        let request = requested(&f).await;

        f.clock.advance(chrono::Duration::minutes(16));
        let err = f
            .workflow
            .handle_reaction("white_check_mark", "U_A", "C1", &request.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AssistantError::ApprovalExpired { ref request_id, ref channel, ref thread_ts }
                if request_id == &request.id && channel == "C1" && thread_ts == "1700000000.000100"
        ));
        assert!(f.store.get(&request.id).await.unwrap().is_none());

        // Afterwards it is simply gone
        assert!(f
            .workflow
            .handle_reaction("white_check_mark", "U_A", "C1", &request.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let f = fixture();
        let request = requested(&f).await;

        f.clock.advance(chrono::Duration::minutes(15));
        assert!(f
            .workflow
            .handle_reaction("+1", "U_A", "C1", &request.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_racing_reactions_resolve_once() {
        let f = fixture();
        let request = requested(&f).await;
        let workflow = Arc::new(f.workflow);

        let approve = {
            let workflow = workflow.clone();
            let id = request.id.clone();
            tokio::spawn(async move { workflow.handle_reaction("+1", "U_A", "C1", &id).await })
        };
        let reject = {
            let workflow = workflow.clone();
            let id = request.id.clone();
            tokio::spawn(async move { workflow.handle_reaction("x", "U_B", "C1", &id).await })
        };

        let outcomes = [approve.await.unwrap().unwrap(), reject.await.unwrap().unwrap()];
        assert_eq!(outcomes.iter().filter(|o| o.is_some()).count(), 1);
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_lapsed_request_is_removed_whoever_reacts() {
        let f = fixture();
        let request = requested(&f).await;
        f.clock.advance(chrono::Duration::minutes(16));

        // A non-approver in another channel still clears the lapsed record
        let err = f
            .workflow
            .handle_reaction("+1", "U_OTHER", "C2", &request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::ApprovalExpired { ref channel, .. } if channel == "C1"));
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_racing_reactions_on_lapsed_request_report_once() {
        let f = fixture();
        let request = requested(&f).await;
        f.clock.advance(chrono::Duration::minutes(20));
        let workflow = Arc::new(f.workflow);

        let handles: Vec<_> = ["+1", "x", "+1"]
            .into_iter()
            .map(|reaction| {
                let workflow = workflow.clone();
                let id = request.id.clone();
                tokio::spawn(async move { workflow.handle_reaction(reaction, "U_A", "C1", &id).await })
            })
            .collect();

        let mut expired = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Err(AssistantError::ApprovalExpired { .. }) => expired += 1,
                Ok(None) => {}
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(expired, 1);
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_custom_ttl_and_reaping() {
        let f = fixture();
        let workflow = ApprovalWorkflow::new(f.chat.clone(), f.store.clone())
            .with_clock(Arc::new(f.clock.clone()))
            .with_ttl(Duration::from_secs(5 * 60));

        workflow
            .request_approval(&origin(), "cancel_payment", &Map::new(), 0, &["U_A".into()])
            .await
            .unwrap();
        assert!(f.chat.posts.lock().await[0].2.contains("_Expires in 5 minutes_"));

        assert_eq!(workflow.reap_expired().await.unwrap(), 0);
        f.clock.advance(chrono::Duration::minutes(6));
        assert_eq!(workflow.reap_expired().await.unwrap(), 1);
        assert!(f.store.is_empty().await);
    }
}
