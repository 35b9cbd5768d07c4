//! Conversions between MCP model types and the assistant's types

use rmcp::model::{CallToolResult, RawContent, Tool};

use crate::core::{AssistantError, AssistantResult};
use crate::llm::{ToolDefinition, ToolInputSchema};

/// Convert a discovered MCP tool into the LLM tool-definition format
pub fn to_tool_definition(tool: &Tool) -> ToolDefinition {
    // input_schema is an Arc<JsonObject>
    let schema_obj = tool.input_schema.as_ref();

    let input_schema = ToolInputSchema {
        schema_type: schema_obj
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("object")
            .to_string(),
        properties: schema_obj.get("properties").cloned(),
        required: schema_obj
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            }),
    };

    ToolDefinition {
        name: tool.name.to_string(),
        description: tool.description.as_ref().map(|d| d.to_string()),
        input_schema,
    }
}

/// Reduce a `tools/call` result to text.
///
/// A result flagged `isError` becomes [`AssistantError::Tool`] carrying its
/// first text block. Otherwise the text blocks are concatenated in order.
pub fn call_result_text(result: CallToolResult) -> AssistantResult<String> {
    let texts = result.content.into_iter().filter_map(|content| match content.raw {
        RawContent::Text(text_content) => Some(text_content.text),
        _ => None,
    });

    if result.is_error.unwrap_or(false) {
        let message = texts
            .into_iter()
            .next()
            .unwrap_or_else(|| "tool execution failed".to_string());
        return Err(AssistantError::Tool(message));
    }

    Ok(texts.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(value: serde_json::Value) -> Tool {
        serde_json::from_value(value).unwrap()
    }

    fn result(value: serde_json::Value) -> CallToolResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_tool_definition_conversion() {
        let def = to_tool_definition(&tool(json!({
            "name": "refund_payment",
            "description": "Refund a captured payment",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pspReference": {"type": "string"}
                },
                "required": ["pspReference"]
            }
        })));

        assert_eq!(def.name, "refund_payment");
        assert_eq!(def.description.as_deref(), Some("Refund a captured payment"));
        assert_eq!(def.input_schema.schema_type, "object");
        assert_eq!(def.input_schema.required, Some(vec!["pspReference".to_string()]));
        assert!(def.input_schema.properties.unwrap()["pspReference"].is_object());
    }

    #[test]
    fn test_tool_without_description() {
        let def = to_tool_definition(&tool(json!({
            "name": "list_merchants",
            "inputSchema": {"type": "object"}
        })));
        assert_eq!(def.description, None);
        assert_eq!(def.input_schema.properties, None);
    }

    #[test]
    fn test_text_blocks_are_concatenated() {
        let text = call_result_text(result(json!({
            "content": [
                {"type": "text", "text": "{\"status\":"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": "\"received\"}"}
            ]
        })))
        .unwrap();
        assert_eq!(text, "{\"status\":\"received\"}");
    }

    #[test]
    fn test_error_uses_first_text_block() {
        let err = call_result_text(result(json!({
            "content": [
                {"type": "text", "text": "Payment not found"},
                {"type": "text", "text": "details"}
            ],
            "isError": true
        })))
        .unwrap_err();
        assert!(matches!(err, AssistantError::Tool(ref m) if m == "Payment not found"));
    }

    #[test]
    fn test_error_without_text() {
        let err = call_result_text(result(json!({"content": [], "isError": true}))).unwrap_err();
        assert!(matches!(err, AssistantError::Tool(ref m) if m == "tool execution failed"));
    }
}
