//! In-memory tool bridge

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::{AssistantError, AssistantResult};
use crate::llm::ToolDefinition;

use super::ToolBridge;

/// Scripted outcome of a tool
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Text(String),
    /// Application-level failure reported by the tool
    Failure(String),
}

/// A recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Tool bridge answering from a fixed table, no process involved
#[derive(Debug, Default)]
pub struct StaticToolBridge {
    tools: Vec<ToolDefinition>,
    outcomes: HashMap<String, ToolOutcome>,
    calls: Mutex<Vec<RecordedCall>>,
    running: bool,
    starts: usize,
    stops: usize,
}

impl StaticToolBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool and what calling it returns
    pub fn with_tool(mut self, definition: ToolDefinition, outcome: ToolOutcome) -> Self {
        self.outcomes.insert(definition.name.clone(), outcome);
        self.tools.push(definition);
        self
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// How many times the bridge was started and stopped
    pub fn lifecycle(&self) -> (usize, usize) {
        (self.starts, self.stops)
    }
}

#[async_trait]
impl ToolBridge for StaticToolBridge {
    async fn start(&mut self) -> AssistantResult<()> {
        self.running = true;
        self.starts += 1;
        Ok(())
    }

    async fn stop(&mut self) -> AssistantResult<()> {
        self.running = false;
        self.stops += 1;
        Ok(())
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        if self.running {
            self.tools.clone()
        } else {
            Vec::new()
        }
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> AssistantResult<String> {
        if !self.running {
            return Err(AssistantError::bridge("tool server is not running"));
        }

        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                name: name.to_string(),
                arguments,
            });

        match self.outcomes.get(name) {
            Some(ToolOutcome::Text(text)) => Ok(text.clone()),
            Some(ToolOutcome::Failure(message)) => Err(AssistantError::Tool(message.clone())),
            None => Err(AssistantError::Protocol {
                code: -32602,
                message: format!("Unknown tool: {}", name),
            }),
        }
    }
}
