//! Tool abstractions — declarations, handlers, and the registry.
//!
//! Tools are what let the model act: read files, run commands, or reach
//! capabilities hosted in an external provider process. A handler is either
//! local (an in-process function) or remote (delegated to a transport keyed
//! by provider name); both sit behind one `invoke` so the registry and the
//! agent loop never branch on provenance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::ToolCallRequest;

/// Default per-call timeout for local handlers.
pub const DEFAULT_LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool definition sent to the model so it knows what it can call.
///
/// Immutable once registered; registering the same name again replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name, unique across the registry
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The outcome of executing one tool call.
///
/// Handler failures are carried as `is_error = true` with a human-readable
/// message, so the model always receives a `tool` message and the loop
/// never crashes on tool failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The output content, or the error text
    pub content: String,

    /// Whether the handler failed
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: message.into(),
            is_error: true,
        }
    }
}

/// An in-process tool implementation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with parsed arguments, returning its text output.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a definition for the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Transport to tools hosted in an external provider process.
///
/// Implemented by the process manager; injected into the registry so the
/// core stays free of process details and fully mockable.
#[async_trait]
pub trait RemoteToolTransport: Send + Sync {
    /// Invoke `tool` on the provider identified by `provider`.
    async fn call_tool(
        &self,
        provider: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError>;

    /// List the tools the provider declares.
    async fn list_tools(
        &self,
        provider: &str,
    ) -> std::result::Result<Vec<ToolDefinition>, ToolError>;
}

/// How a registered tool is executed.
#[derive(Clone)]
pub enum ToolHandler {
    /// An in-process handler, run under the registry's per-call timeout.
    Local(Arc<dyn Tool>),

    /// Delegated to an external provider process via its transport.
    Remote {
        transport: Arc<dyn RemoteToolTransport>,
        provider: String,
    },
}

impl ToolHandler {
    /// Invoke the handler. `timeout` applies to local handlers only;
    /// remote calls run on the transport's own terms.
    async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> std::result::Result<String, ToolError> {
        match self {
            Self::Local(tool) => {
                match tokio::time::timeout(timeout, tool.execute(arguments)).await {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::Timeout {
                        tool_name: name.to_string(),
                        timeout_secs: timeout.as_secs(),
                    }),
                }
            }
            Self::Remote { transport, provider } => {
                transport.call_tool(provider, name, arguments).await
            }
        }
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Execute tool calls when the model requests them
///
/// `execute` never returns an error to the caller — unknown tools,
/// unparseable arguments, timeouts, and handler failures all become
/// `is_error` results destined for the conversation.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    local_timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            local_timeout: DEFAULT_LOCAL_TIMEOUT,
        }
    }

    /// Set the per-call timeout for local handlers, clamped to `max`.
    pub fn with_local_timeout(mut self, timeout: Duration, max: Duration) -> Self {
        self.local_timeout = timeout.min(max);
        self
    }

    /// Register a tool under its declared name. Replaces any existing tool
    /// with the same name.
    pub fn register(&mut self, definition: ToolDefinition, handler: ToolHandler) {
        let name = definition.name.clone();
        if self
            .tools
            .insert(name.clone(), RegisteredTool { definition, handler })
            .is_some()
        {
            debug!(tool = %name, "Replaced existing tool registration");
        }
    }

    /// Register an in-process tool, deriving the definition from the trait.
    pub fn register_local(&mut self, tool: Arc<dyn Tool>) {
        let definition = tool.to_definition();
        self.register(definition, ToolHandler::Local(tool));
    }

    /// Whether a tool with this name is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Execute one tool call, absorbing every failure into the result.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolResult {
        let Some(entry) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Model requested unknown tool");
            return ToolResult::error(
                &call.id,
                ToolError::NotFound(call.name.clone()).to_string(),
            );
        };

        let arguments: serde_json::Value = match serde_json::from_str(&call.arguments) {
            Ok(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
            Ok(other) => {
                return ToolResult::error(
                    &call.id,
                    ToolError::InvalidArguments(format!(
                        "expected a JSON object, got {other}"
                    ))
                    .to_string(),
                );
            }
            Err(e) => {
                return ToolResult::error(
                    &call.id,
                    ToolError::InvalidArguments(e.to_string()).to_string(),
                );
            }
        };

        match entry
            .handler
            .invoke(&call.name, arguments, self.local_timeout)
            .await
        {
            Ok(content) => ToolResult::ok(&call.id, content),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::error(&call.id, e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    /// A tool that never finishes, for timeout tests.
    struct StuckTool;

    #[async_trait]
    impl Tool for StuckTool {
        fn name(&self) -> &str {
            "stuck"
        }
        fn description(&self) -> &str {
            "Hangs forever"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<String, ToolError> {
            std::future::pending().await
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn registry_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register_local(Arc::new(EchoTool));
        assert!(registry.has_tool("echo"));

        let result = registry.execute(&call("echo", r#"{"text":"hello"}"#)).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "hello");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result_not_a_panic() {
        let registry = ToolRegistry::new();
        let result = registry.execute(&call("nonexistent", "{}")).await;
        assert!(result.is_error);
        assert!(result.content.contains("not found"));
    }

    #[tokio::test]
    async fn unparseable_arguments_become_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register_local(Arc::new(EchoTool));

        let result = registry.execute(&call("echo", "{not json")).await;
        assert!(result.is_error);
        assert!(result.content.contains("Invalid tool arguments"));
    }

    #[tokio::test]
    async fn non_object_arguments_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register_local(Arc::new(EchoTool));

        let result = registry.execute(&call("echo", "[1,2,3]")).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn local_timeout_is_enforced() {
        let mut registry = ToolRegistry::new()
            .with_local_timeout(Duration::from_millis(50), Duration::from_secs(60));
        registry.register_local(Arc::new(StuckTool));

        let result = registry.execute(&call("stuck", "{}")).await;
        assert!(result.is_error);
        assert!(result.content.contains("timed out"));
    }

    #[tokio::test]
    async fn timeout_is_clamped_to_maximum() {
        let registry = ToolRegistry::new()
            .with_local_timeout(Duration::from_secs(600), Duration::from_secs(120));
        assert_eq!(registry.local_timeout, Duration::from_secs(120));
    }

    #[test]
    fn reregistering_replaces_the_definition() {
        let mut registry = ToolRegistry::new();
        registry.register_local(Arc::new(EchoTool));
        registry.register(
            ToolDefinition {
                name: "echo".into(),
                description: "replacement".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
            ToolHandler::Local(Arc::new(EchoTool)),
        );

        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].description, "replacement");
    }

    #[tokio::test]
    async fn remote_handler_delegates_to_transport() {
        struct FakeTransport;

        #[async_trait]
        impl RemoteToolTransport for FakeTransport {
            async fn call_tool(
                &self,
                provider: &str,
                tool: &str,
                _arguments: serde_json::Value,
            ) -> std::result::Result<String, ToolError> {
                Ok(format!("{provider}/{tool}"))
            }

            async fn list_tools(
                &self,
                _provider: &str,
            ) -> std::result::Result<Vec<ToolDefinition>, ToolError> {
                Ok(vec![])
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDefinition {
                name: "search".into(),
                description: "remote search".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
            ToolHandler::Remote {
                transport: Arc::new(FakeTransport),
                provider: "web".into(),
            },
        );

        let result = registry.execute(&call("search", "{}")).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "web/search");
    }
}
