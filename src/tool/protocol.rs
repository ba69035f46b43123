//! JSON-RPC 2.0 protocol types for tool-server communication.
//!
//! Messages are JSON-serialized and newline-delimited; one object per line
//! in both directions, no batching.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version sent in the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC version string carried by every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved method name that bypasses the tool server entirely.
pub const DIRECT_RESPONSE: &str = "direct_response";

/// Method not found.
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// Invalid params.
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// Internal error (tool execution failed).
pub const CODE_INTERNAL_ERROR: i64 = -32603;
/// Parse error (unreadable frame).
pub const CODE_PARSE_ERROR: i64 = -32700;
/// Client-side call deadline elapsed (not part of the JSON-RPC spec).
pub const CODE_CALL_TIMEOUT: i64 = -32001;

/// A single JSON-RPC frame, request or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Structured error carried in a JSON-RPC envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Parameters for the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: serde_json::Map<String, Value>,
}

impl RpcMessage {
    /// Build a request frame.
    pub fn request(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    /// Build a success response frame.
    pub fn response(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response frame.
    pub fn error_response(id: Option<u64>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: None,
            params: None,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Serialize to a JSON line (with trailing newline).
    pub fn to_line(&self) -> String {
        let mut json = serde_json::to_string(self).expect("RpcMessage serialization failed");
        json.push('\n');
        json
    }

    /// Deserialize from a JSON line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// Decoded `tools/call` result: the first text content item plus a coarse
/// tag derived from discriminant substrings the tool server embeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ToolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Weather,
    Search,
    Direct,
    Unknown,
}

impl ToolOutput {
    /// Extract the first text item from a `tools/call` result value.
    ///
    /// Returns `None` when the result carries no text content.
    pub fn from_call_result(result: &Value) -> Option<Self> {
        let text = result
            .get("content")?
            .as_array()?
            .iter()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))?
            .get("text")?
            .as_str()?;
        Some(Self {
            content: text.to_string(),
            kind: classify_content(text),
        })
    }
}

/// Tag tool output by the discriminant substrings the server prefixes its
/// text frames with.
fn classify_content(text: &str) -> ToolKind {
    if text.starts_with("Current weather") || text.starts_with("Forecast") {
        ToolKind::Weather
    } else if text.starts_with("Search results") {
        ToolKind::Search
    } else {
        ToolKind::Unknown
    }
}
