use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

use payments_assistant::approval::{ApprovalWorkflow, FileApprovalStore};
use payments_assistant::audit::ChatAuditLogger;
use payments_assistant::chat::SlackClient;
use payments_assistant::config::AppConfig;
use payments_assistant::llm::AnthropicProvider;
use payments_assistant::logging;
use payments_assistant::mcp::StdioToolServer;
use payments_assistant::permissions::PermissionEvaluator;
use payments_assistant::processor::Processor;

/// Process one batch of queued chat events.
///
/// Records are JSON objects, one per line, read from the file named by the
/// first argument or from stdin.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = logging::init_logging()?;

    tracing::info!("=== Payments Processor Starting ===");

    let config = AppConfig::from_env().context("failed to load configuration")?;

    let slack = Arc::new(SlackClient::new(&config.slack));
    let llm = Arc::new(AnthropicProvider::new(&config.llm));
    let evaluator = PermissionEvaluator::new(config.permissions.clone(), slack.clone());

    let store = Arc::new(FileApprovalStore::new(config.approval_store_dir.clone()));
    let workflow = ApprovalWorkflow::new(slack.clone(), store);
    let audit = Arc::new(ChatAuditLogger::new(
        slack.clone(),
        config.permissions.audit_channel(),
    ));

    // Cancelled on interrupt or when the batch deadline passes
    let shutdown = CancellationToken::new();
    let deadline = shutdown.clone();
    let bridge = StdioToolServer::new(config.tool_server.clone()).with_cancellation(shutdown.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling in-flight tool calls");
            shutdown.cancel();
        }
    });

    let records = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path))?;
            read_records(file).await?
        }
        None => read_records(tokio::io::stdin()).await?,
    };
    tracing::info!("Read {} records", records.len());

    let mut processor = Processor::new(slack, llm, evaluator, workflow, audit, bridge)
        .with_deadline(config.invocation_timeout, deadline);
    let report = processor.process_batch(records.as_slice()).await?;

    tracing::info!(
        "=== Payments Processor Done: {} handled, {} ignored, {} failed ===",
        report.handled,
        report.ignored,
        report.failed
    );

    Ok(())
}

async fn read_records<R: AsyncRead + Unpin>(input: R) -> anyhow::Result<Vec<String>> {
    let mut lines = BufReader::new(input).lines();
    let mut records = Vec::new();
    while let Some(line) = lines.next_line().await.context("failed to read records")? {
        if !line.trim().is_empty() {
            records.push(line);
        }
    }
    Ok(records)
}
