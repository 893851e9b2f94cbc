//! JSON-RPC 2.0 envelope types, line-delimited over stdio.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn ok(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn err(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(JsonRpcError { code, message: message.into() }) }
    }
}

/// A notification carries no `id` and expects no response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl JsonRpcNotification {
    pub fn new(method: &'static str, params: Value) -> Self {
        Self { jsonrpc: "2.0", method, params }
    }
}

/// The `ToolResult` shape every `tools/call` response's `result` field
/// takes, independent of success or failure — tool-execution failures
/// set `is_error` rather than surfacing a JSON-RPC error object, so
/// protocol-level error codes stay reserved for protocol-level faults.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "data")]
    Data { data: Value },
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![ToolContent::Text { text: text.into() }], is_error: false, meta: None }
    }

    pub fn data(data: Value) -> Self {
        Self { content: vec![ToolContent::Data { data }], is_error: false, meta: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: vec![ToolContent::Text { text: message.into() }], is_error: true, meta: None }
    }
}

/// `kind` of a `$/progress` notification; exactly one `begin` and one
/// `end` per token, any number of `report` in between.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Begin,
    Report,
    End,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressPayload {
    pub kind: ProgressKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellable: Option<bool>,
}

pub fn progress_notification(token: &Value, progress: ProgressPayload) -> JsonRpcNotification {
    JsonRpcNotification::new(
        "$/progress",
        serde_json::json!({ "progressToken": token, "progress": progress }),
    )
}
