//! Message and reaction handling
//!
//! A message goes to the LLM, which may propose a tool call. The call is
//! classified and evaluated, then denied, parked for approval, or executed.
//! A reaction may resolve a parked call, which is then executed as stored.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::approval::{ApprovalWorkflow, Decision, Resolution};
use crate::audit::{AuditEntry, AuditSink};
use crate::chat::{mention, ChatClient, ChatMessage};
use crate::core::{AssistantError, AssistantResult};
use crate::llm::{LlmProvider, ToolCall};
use crate::mcp::ToolBridge;
use crate::permissions::{PermissionEvaluator, Verdict};

use super::events::{QueueMessage, QueuedEvent, ReactionEvent};

/// Reply when approval is required but nobody else can give it
pub const NO_APPROVERS_REPLY: &str =
    "This action needs approval, but there is no other admin who can approve it.";

/// Counts for one processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub handled: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Handles queued chat events with one tool bridge for the whole batch
pub struct Processor<B: ToolBridge> {
    chat: Arc<dyn ChatClient>,
    llm: Arc<dyn LlmProvider>,
    evaluator: PermissionEvaluator,
    workflow: ApprovalWorkflow,
    audit: Arc<dyn AuditSink>,
    bridge: B,
    deadline: Option<(Duration, CancellationToken)>,
}

impl<B: ToolBridge> Processor<B> {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        llm: Arc<dyn LlmProvider>,
        evaluator: PermissionEvaluator,
        workflow: ApprovalWorkflow,
        audit: Arc<dyn AuditSink>,
        bridge: B,
    ) -> Self {
        Self {
            chat,
            llm,
            evaluator,
            workflow,
            audit,
            bridge,
            deadline: None,
        }
    }

    /// Bound each batch to `limit`.
    ///
    /// When the limit passes, `cancel` is cancelled, which aborts a tool call
    /// in flight on a bridge that watches the same token, and the records not
    /// yet started are counted as failed.
    pub fn with_deadline(mut self, limit: Duration, cancel: CancellationToken) -> Self {
        self.deadline = Some((limit, cancel));
        self
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// Process a batch of queue records.
    ///
    /// The bridge is started first and stopped after the last record, on
    /// every path that got it started. A failing record does not stop the
    /// batch.
    pub async fn process_batch<S: AsRef<str>>(&mut self, records: &[S]) -> AssistantResult<BatchReport> {
        if let Err(e) = self.bridge.start().await {
            tracing::error!("[Processor] Failed to start tool bridge: {}", e);
            if let Err(stop_err) = self.bridge.stop().await {
                tracing::warn!("[Processor] Failed to stop tool bridge: {}", stop_err);
            }
            return Err(e);
        }

        let expires = self.deadline.as_ref().map(|(limit, cancel)| {
            let cancel = cancel.clone();
            let limit = *limit;
            (
                Instant::now() + limit,
                tokio::spawn(async move {
                    tokio::time::sleep(limit).await;
                    cancel.cancel();
                }),
            )
        });

        let mut report = BatchReport::default();
        for (done, record) in records.iter().enumerate() {
            if let Some((at, _)) = &expires {
                if Instant::now() >= *at {
                    if let Some((_, cancel)) = &self.deadline {
                        cancel.cancel();
                    }
                    let skipped = records.len() - done;
                    tracing::error!(
                        "[Processor] Batch deadline passed, {} records not processed",
                        skipped
                    );
                    report.failed += skipped;
                    break;
                }
            }

            match self.handle_record(record.as_ref()).await {
                Ok(true) => report.handled += 1,
                Ok(false) => report.ignored += 1,
                Err(e) => {
                    tracing::error!("[Processor] Failed to handle record: {}", e);
                    report.failed += 1;
                }
            }
        }

        if let Some((_, timer)) = expires {
            timer.abort();
        }

        if let Err(e) = self.workflow.reap_expired().await {
            tracing::warn!("[Processor] Failed to reap expired approvals: {}", e);
        }

        self.bridge.stop().await?;

        tracing::info!(
            "[Processor] Batch done: {} handled, {} ignored, {} failed",
            report.handled,
            report.ignored,
            report.failed
        );
        Ok(report)
    }

    /// Route one record. Returns `false` for record types that are skipped.
    pub async fn handle_record(&self, record: &str) -> AssistantResult<bool> {
        match QueueMessage::parse(record)?.into_event()? {
            QueuedEvent::Message(message) => self.handle_message(&message).await.map(|_| true),
            QueuedEvent::Reaction(reaction) => self.handle_reaction(&reaction).await.map(|_| true),
            QueuedEvent::Ignored(kind) => {
                tracing::debug!("[Processor] Skipping record of type {}", kind);
                Ok(false)
            }
        }
    }

    /// Plan and act on a chat message
    pub async fn handle_message(&self, message: &ChatMessage) -> AssistantResult<()> {
        tracing::info!(
            "[Processor] Message from {} in {}",
            message.user,
            message.channel
        );

        let tools = self.bridge.list_tools();
        let planned = match self.llm.plan(&message.text, &tools).await {
            Ok(planned) => planned,
            Err(e) => {
                let err = AssistantError::Llm(format!("{:#}", e));
                self.reply(message, &format!("Sorry, I encountered an error: {}", err))
                    .await?;
                return Err(err);
            }
        };

        let Some(call) = planned.tool_calls.into_iter().next() else {
            if planned.text.trim().is_empty() {
                tracing::debug!("[Processor] Model returned neither text nor tool calls");
                return Ok(());
            }
            return self.reply(message, &planned.text).await;
        };

        self.handle_tool_call(message, call).await
    }

    async fn handle_tool_call(&self, message: &ChatMessage, call: ToolCall) -> AssistantResult<()> {
        let args = call.arguments();
        let amount = extract_amount(&args);

        let verdict = self
            .evaluator
            .evaluate(&message.user, &message.channel, &call.name, amount)
            .await;

        match verdict {
            Verdict::Denied { reason } => {
                self.audit(AuditEntry::denied(&message.user, &call.name, &message.channel, &reason))
                    .await;
                self.reply(message, &format!("Permission denied: {}", reason))
                    .await
            }
            Verdict::AllowedPendingApproval { approvers } if approvers.is_empty() => {
                self.audit(AuditEntry::denied(
                    &message.user,
                    &call.name,
                    &message.channel,
                    "no eligible approvers",
                ))
                .await;
                self.reply(message, NO_APPROVERS_REPLY).await
            }
            Verdict::AllowedPendingApproval { approvers } => {
                match self
                    .workflow
                    .request_approval(message, &call.name, &args, amount, &approvers)
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        self.reply(message, &format!("Failed to request approval: {}", e))
                            .await?;
                        Err(e)
                    }
                }
            }
            Verdict::Allowed => {
                match self.bridge.call_tool(&call.name, args).await {
                    Ok(result) => {
                        self.audit(AuditEntry::allowed(
                            &message.user,
                            &call.name,
                            &message.channel,
                            "Executed successfully",
                        ))
                        .await;
                        self.reply(message, &format_tool_result(&call.name, &result))
                            .await
                    }
                    Err(e) => {
                        self.audit(AuditEntry::error(
                            &message.user,
                            &call.name,
                            &message.channel,
                            e.to_string(),
                        ))
                        .await;
                        self.reply(message, &format!("Tool execution failed: {}", e))
                            .await?;
                        if e.is_tool_failure() {
                            Ok(())
                        } else {
                            Err(e)
                        }
                    }
                }
            }
        }
    }

    /// Resolve a reaction and act on the decision
    pub async fn handle_reaction(&self, event: &ReactionEvent) -> AssistantResult<()> {
        let resolved = self
            .workflow
            .handle_reaction(&event.reaction, &event.user, &event.item.channel, &event.item.ts)
            .await;

        let resolution = match resolved {
            Ok(Some(resolution)) => resolution,
            Ok(None) => return Ok(()),
            Err(AssistantError::ApprovalExpired {
                request_id,
                channel,
                thread_ts,
            }) => {
                tracing::info!("[Processor] Approval {} lapsed before resolution", request_id);
                self.chat
                    .post_message(
                        &channel,
                        Some(&thread_ts),
                        ":hourglass: This approval request has expired. Please ask again.",
                    )
                    .await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match resolution.decision {
            Decision::Rejected => self.rejected(&resolution).await,
            Decision::Approved => self.approved(resolution).await,
        }
    }

    async fn rejected(&self, resolution: &Resolution) -> AssistantResult<()> {
        let request = &resolution.request;
        self.audit(AuditEntry::rejected(
            &request.requested_by,
            &request.action,
            &request.channel,
            &resolution.resolved_by,
        ))
        .await;
        self.reply_to_request(
            resolution,
            &format!("Request rejected by {}", mention(&resolution.resolved_by)),
        )
        .await
    }

    async fn approved(&self, resolution: Resolution) -> AssistantResult<()> {
        let request = &resolution.request;
        self.audit(AuditEntry::approved(
            &request.requested_by,
            &request.action,
            &request.channel,
            &resolution.resolved_by,
            "Approval granted",
        ))
        .await;
        self.reply_to_request(
            &resolution,
            &format!("Approved by {}. Processing...", mention(&resolution.resolved_by)),
        )
        .await?;

        match self
            .bridge
            .call_tool(&request.action, request.params.clone())
            .await
        {
            Ok(result) => {
                self.reply_to_request(&resolution, &format_tool_result(&request.action, &result))
                    .await
            }
            Err(e) => {
                self.audit(AuditEntry::error(
                    &request.requested_by,
                    &request.action,
                    &request.channel,
                    e.to_string(),
                ))
                .await;
                self.reply_to_request(&resolution, &format!("Execution failed: {}", e))
                    .await?;
                if e.is_tool_failure() {
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn reply(&self, message: &ChatMessage, text: &str) -> AssistantResult<()> {
        message.reply(self.chat.as_ref(), text).await.map(|_| ())
    }

    async fn reply_to_request(&self, resolution: &Resolution, text: &str) -> AssistantResult<()> {
        let request = &resolution.request;
        self.chat
            .post_message(&request.channel, Some(&request.thread_ts), text)
            .await
            .map(|_| ())
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(&entry).await {
            tracing::warn!("[Processor] Failed to record audit entry {}: {}", entry.id, e);
        }
    }
}

/// Amount in cents from tool arguments: `amount.value`, or a numeric `amount`
pub fn extract_amount(args: &Map<String, Value>) -> u64 {
    let amount = match args.get("amount") {
        Some(Value::Object(amount)) => amount.get("value"),
        other => other,
    };

    match amount {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v > 0.0).map(|v| v as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Render a tool result for chat, headed according to the kind of tool
pub fn format_tool_result(tool_name: &str, result: &str) -> String {
    let prefix = if tool_name.contains("refund") {
        ":money_with_wings: *Refund processed*\n"
    } else if tool_name.contains("cancel") {
        ":no_entry_sign: *Payment cancelled*\n"
    } else if tool_name.contains("create") {
        ":link: *Created successfully*\n"
    } else if tool_name.contains("get") || tool_name.contains("list") {
        ":mag: "
    } else {
        ":white_check_mark: "
    };

    format!("{}```\n{}\n```", prefix, result)
}
