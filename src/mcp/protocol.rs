//! JSON-RPC 2.0 frames exchanged with the tool server
//!
//! One JSON document per line in each direction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AssistantError, AssistantResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Request, or notification when `id` is absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    /// Serialize as a single newline-terminated frame
    pub fn to_frame(&self) -> AssistantResult<Vec<u8>> {
        let mut frame = serde_json::to_vec(self)?;
        frame.push(b'\n');
        Ok(frame)
    }
}

/// Structured error carried by a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Incoming frame: a response to our request, or a message initiated by the server.
///
/// Also used for the replies we send to server-initiated requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    /// Number or string; `null` on errors the server could not attribute
    #[serde(default)]
    pub id: Option<Value>,
    /// Set only on server-initiated messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful reply to a server-initiated request
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            result: Some(result),
            error: None,
        }
    }

    /// Error reply to a server-initiated request
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Whether this frame is a server notification rather than a response
    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    /// Whether the server initiated this frame (a notification or a request
    /// such as `ping`), whatever its id
    pub fn is_server_message(&self) -> bool {
        self.method.is_some()
    }

    /// Whether this frame answers the request numbered `id`
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }

    /// Serialize as a single newline-terminated frame
    pub fn to_frame(&self) -> AssistantResult<Vec<u8>> {
        let mut frame = serde_json::to_vec(self)?;
        frame.push(b'\n');
        Ok(frame)
    }

    /// Split into the result payload or the protocol error
    pub fn into_result(self) -> AssistantResult<Value> {
        if let Some(error) = self.error {
            return Err(AssistantError::Protocol {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| AssistantError::bridge("response carries neither result nor error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_frame() {
        let request = JsonRpcRequest::new(7, "tools/list", None);
        let frame = request.to_frame().unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(
            std::str::from_utf8(&frame).unwrap(),
            "{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"tools/list\"}\n"
        );
    }

    #[test]
    fn test_notification_has_no_id() {
        let value = serde_json::to_value(JsonRpcRequest::notification("notifications/initialized"))
            .unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("params").is_none());
    }

    #[test]
    fn test_error_response() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        match response.into_result() {
            Err(AssistantError::Protocol { code, message }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_response_is_a_bridge_error() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3})).unwrap();
        assert!(matches!(response.into_result(), Err(AssistantError::Bridge(_))));
    }

    #[test]
    fn test_server_notification() {
        let frame: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {"level": "info"}
        }))
        .unwrap();
        assert!(frame.is_notification());
        assert!(frame.is_server_message());
    }

    #[test]
    fn test_server_request_is_not_a_response() {
        let frame: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": "srv-1",
            "method": "ping"
        }))
        .unwrap();
        assert!(frame.is_server_message());
        assert!(!frame.is_notification());
        assert!(!frame.answers(1));
    }

    #[test]
    fn test_null_id_error() {
        let frame: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32700, "message": "Parse error"}
        }))
        .unwrap();
        assert_eq!(frame.id, None);
        assert!(!frame.is_server_message());
        assert!(matches!(frame.into_result(), Err(AssistantError::Protocol { code: -32700, .. })));
    }

    #[test]
    fn test_reply_frames() {
        let pong = JsonRpcResponse::success(json!("srv-1"), json!({})).to_frame().unwrap();
        assert_eq!(
            std::str::from_utf8(&pong).unwrap(),
            "{\"jsonrpc\":\"2.0\",\"id\":\"srv-1\",\"result\":{}}\n"
        );

        let refused: Value =
            serde_json::to_value(JsonRpcResponse::failure(json!(4), -32601, "Method not found"))
                .unwrap();
        assert_eq!(refused["error"]["code"], -32601);
        assert!(refused.get("result").is_none());
        assert!(refused.get("method").is_none());
    }
}
