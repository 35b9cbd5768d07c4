//! Stdio tool server client
//!
//! Spawns the tool server as a child process and speaks newline-delimited
//! JSON-RPC over its stdin/stdout. The protocol has no multiplexing, so one
//! request is outstanding at a time and its response is the next frame read.

use async_trait::async_trait;
use rmcp::model::{CallToolResult, ListToolsResult, Tool};
use serde_json::{json, Map, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::{AssistantError, AssistantResult};
use crate::llm::ToolDefinition;

use super::config::ToolServerConfig;
use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use super::tool_adapter::{call_result_text, to_tool_definition};
use super::ToolBridge;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The pipe pair to the server
struct Connection {
    writer: BoxedWriter,
    reader: BufReader<BoxedReader>,
    /// Set once a response may be left unread; later frames can't be correlated
    poisoned: Option<String>,
}

impl Connection {
    fn new(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            writer,
            reader: BufReader::new(reader),
            poisoned: None,
        }
    }

    async fn send(&mut self, request: &JsonRpcRequest) -> AssistantResult<()> {
        let frame = request.to_frame()?;
        self.writer
            .write_all(&frame)
            .await
            .map_err(|e| AssistantError::bridge(format!("failed to write request: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AssistantError::bridge(format!("failed to write request: {}", e)))
    }

    async fn read_response(&mut self) -> AssistantResult<JsonRpcResponse> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| AssistantError::bridge(format!("failed to read response: {}", e)))?;
            if read == 0 {
                return Err(AssistantError::bridge("tool server closed its output"));
            }

            let frame = line.trim();
            if frame.is_empty() {
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_str(frame).map_err(|e| {
                AssistantError::bridge(format!("malformed frame: {}", e))
            })?;

            if response.is_server_message() {
                self.answer_server_message(response, frame).await?;
                continue;
            }
            return Ok(response);
        }
    }

    /// Notifications are logged. Requests get `ping` answered and anything
    /// else refused, so the server never waits on us.
    async fn answer_server_message(
        &mut self,
        message: JsonRpcResponse,
        frame: &str,
    ) -> AssistantResult<()> {
        let method = message.method.unwrap_or_default();
        let Some(id) = message.id else {
            tracing::debug!("[StdioToolServer] Server notification: {}", frame);
            return Ok(());
        };

        tracing::debug!("[StdioToolServer] Server request '{}' ({})", method, id);
        let reply = match method.as_str() {
            "ping" => JsonRpcResponse::success(id, json!({})),
            _ => JsonRpcResponse::failure(id, -32601, format!("Method not found: {}", method)),
        };
        self.writer
            .write_all(&reply.to_frame()?)
            .await
            .map_err(|e| AssistantError::bridge(format!("failed to answer server: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AssistantError::bridge(format!("failed to answer server: {}", e)))
    }

    async fn exchange(&mut self, request: &JsonRpcRequest) -> AssistantResult<JsonRpcResponse> {
        self.send(request).await?;
        let response = self.read_response().await?;

        let Some(id) = request.id else {
            return Ok(response);
        };
        if response.answers(id) {
            return Ok(response);
        }

        // An error the server could not attribute to a request, e.g. a parse error
        if let (None, Some(error)) = (&response.id, &response.error) {
            return Err(AssistantError::Protocol {
                code: error.code,
                message: error.message.clone(),
            });
        }

        Err(AssistantError::bridge(format!(
            "response id {} does not match request id {}",
            response.id.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string()),
            id
        )))
    }
}

/// MCP tool server reached over a child process's stdio
pub struct StdioToolServer {
    config: ToolServerConfig,
    child: Option<Child>,
    connection: Mutex<Option<Connection>>,
    next_id: AtomicU64,
    tools: Vec<Tool>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for StdioToolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioToolServer")
            .field("config", &self.config)
            .field("running", &self.child.is_some())
            .field("tools", &self.tools.len())
            .finish()
    }
}

impl StdioToolServer {
    /// Create a client that will spawn the configured command on `start`
    pub fn new(config: ToolServerConfig) -> Self {
        Self {
            config,
            child: None,
            connection: Mutex::new(None),
            next_id: AtomicU64::new(0),
            tools: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a client over already-open streams instead of a child process
    pub fn from_streams<R, W>(config: ToolServerConfig, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let server = Self::new(config);
        Self {
            connection: Mutex::new(Some(Connection::new(Box::new(reader), Box::new(writer)))),
            ..server
        }
    }

    /// Abort in-flight and future calls when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Tools discovered during `start`
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    fn spawn(&mut self) -> AssistantResult<Connection> {
        tracing::info!(
            "[StdioToolServer] Starting '{}' ({})",
            self.config.id,
            self.config.command
        );

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AssistantError::bridge(format!("failed to start {}: {}", self.config.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AssistantError::bridge("child stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AssistantError::bridge("child stdout not captured"))?;

        if let Some(stderr) = child.stderr.take() {
            let id = self.config.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("[StdioToolServer] {} stderr: {}", id, line);
                }
            });
        }

        self.child = Some(child);
        Ok(Connection::new(Box::new(stdout), Box::new(stdin)))
    }

    /// Send one request and wait for its response under the call deadline
    async fn request(&self, method: &str, params: Option<Value>) -> AssistantResult<Value> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| AssistantError::bridge("tool server is not running"))?;

        if let Some(reason) = &connection.poisoned {
            return Err(AssistantError::bridge(format!(
                "connection unusable after {}",
                reason
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = JsonRpcRequest::new(id, method, params);
        let timeout = self.config.call_timeout();

        tracing::debug!("[StdioToolServer] -> {} #{}", method, id);

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(AssistantError::Cancelled),
            exchanged = tokio::time::timeout(timeout, connection.exchange(&request)) => {
                exchanged.unwrap_or(Err(AssistantError::Timeout(timeout)))
            }
        };

        match outcome {
            Ok(response) => response.into_result(),
            Err(e) => {
                tracing::error!("[StdioToolServer] {} #{} failed: {}", method, id, e);
                connection.poisoned = Some(format!("{} #{}: {}", method, id, e));
                Err(e)
            }
        }
    }

    async fn notify(&self, method: &str) -> AssistantResult<()> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| AssistantError::bridge("tool server is not running"))?;
        connection.send(&JsonRpcRequest::notification(method)).await
    }

    async fn handshake(&mut self) -> AssistantResult<()> {
        let init = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": self.config.protocol_version,
                    "capabilities": {},
                    "clientInfo": {
                        "name": self.config.client_name,
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            )
            .await?;

        tracing::debug!("[StdioToolServer] initialize result: {}", init);
        self.notify("notifications/initialized").await?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(page)
                .map_err(|e| AssistantError::bridge(format!("invalid tools/list result: {}", e)))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::info!(
            "[StdioToolServer] Got {} tools from '{}'",
            tools.len(),
            self.config.id
        );
        self.tools = tools;
        Ok(())
    }
}

#[async_trait]
impl ToolBridge for StdioToolServer {
    async fn start(&mut self) -> AssistantResult<()> {
        if self.connection.get_mut().is_none() {
            let connection = self.spawn()?;
            *self.connection.get_mut() = Some(connection);
        }

        if let Err(e) = self.handshake().await {
            tracing::error!("[StdioToolServer] Handshake with '{}' failed: {}", self.config.id, e);
            self.stop().await?;
            return Err(e);
        }
        Ok(())
    }

    async fn stop(&mut self) -> AssistantResult<()> {
        // Dropping the writer closes the server's stdin
        self.connection.get_mut().take();
        self.tools.clear();

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!("[StdioToolServer] Failed to kill '{}': {}", self.config.id, e);
            }
            tracing::info!("[StdioToolServer] Stopped '{}'", self.config.id);
        }
        Ok(())
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(to_tool_definition).collect()
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> AssistantResult<String> {
        tracing::info!(
            "[StdioToolServer] Calling tool '{}' on '{}'",
            name,
            self.config.id
        );
        tracing::debug!("[StdioToolServer] Arguments: {:?}", arguments);

        let result = self
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;

        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| AssistantError::bridge(format!("invalid tools/call result: {}", e)))?;

        call_result_text(result)
    }
}
