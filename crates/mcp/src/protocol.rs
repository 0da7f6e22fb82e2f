//! Wire types for the external tool provider protocol.
//!
//! One request per line, one response per line. A request is a JSON-RPC
//! 2.0 object; the response carries either a `result` or an
//! `error{code,message}`. Two conventional methods are used: `tools/list`
//! for capability discovery and `tools/call` for invocation.

use forgehand_core::tool::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Method name for capability discovery.
pub const METHOD_LIST_TOOLS: &str = "tools/list";

/// Method name for tool invocation.
pub const METHOD_CALL_TOOL: &str = "tools/call";

/// An outgoing JSON-RPC request frame.
#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// An incoming response frame.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

/// The `error` member of a response frame.
#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// The `result` of `tools/list`.
#[derive(Debug, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<ProviderTool>,
}

/// One tool as a provider declares it.
#[derive(Debug, Deserialize)]
pub struct ProviderTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "default_schema")]
    pub input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object"})
}

impl From<ProviderTool> for ToolDefinition {
    fn from(tool: ProviderTool) -> Self {
        Self {
            name: tool.name,
            description: tool.description,
            parameters: tool.input_schema,
        }
    }
}

/// The `result` of `tools/call`.
#[derive(Debug, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Concatenate the text of all content blocks.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let Some(text) = &block.text {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }
}

/// One content block of a tool result.
#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_as_jsonrpc() {
        let req = RpcRequest::new(7, METHOD_LIST_TOOLS, None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("tools/list"));
        assert!(!json.contains("params"));
    }

    #[test]
    fn response_with_error() {
        let resp: RpcResponse =
            serde_json::from_str(r#"{"error":{"code":-32601,"message":"no such method"}}"#)
                .unwrap();
        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "no such method");
    }

    #[test]
    fn provider_tool_converts_to_definition() {
        let tool: ProviderTool = serde_json::from_str(
            r#"{"name":"web_search","description":"Search the web","inputSchema":{"type":"object","properties":{"query":{"type":"string"}}}}"#,
        )
        .unwrap();
        let def: ToolDefinition = tool.into();
        assert_eq!(def.name, "web_search");
        assert_eq!(def.parameters["properties"]["query"]["type"], "string");
    }

    #[test]
    fn provider_tool_without_schema_gets_object_default() {
        let tool: ProviderTool = serde_json::from_str(r#"{"name":"ping"}"#).unwrap();
        let def: ToolDefinition = tool.into();
        assert_eq!(def.parameters["type"], "object");
    }

    #[test]
    fn call_result_concatenates_text_blocks() {
        let result: CallToolResult = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"line one"},{"type":"image"},{"type":"text","text":"line two"}]}"#,
        )
        .unwrap();
        assert_eq!(result.text(), "line one\nline two");
        assert!(!result.is_error);
    }

    #[test]
    fn call_result_error_flag() {
        let result: CallToolResult = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"boom"}],"isError":true}"#,
        )
        .unwrap();
        assert!(result.is_error);
    }
}
