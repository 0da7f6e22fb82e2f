//! External tool provider process manager.
//!
//! Each provider is a long-lived child process speaking the line-delimited
//! protocol in [`crate::protocol`]. The manager owns the process table
//! behind a read/write lock; every process additionally carries its own
//! mutex so two tasks can never interleave writes and reads on the same
//! pair of pipes — the protocol has no request-id multiplexing, so calls
//! must be strictly request-then-response.
//!
//! There is no background health poller: a crashed provider is detected
//! lazily when the next call fails, and the supervising caller decides
//! whether to restart it.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use forgehand_core::error::ToolError;
use forgehand_core::tool::{RemoteToolTransport, ToolDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Default bound for calls made on behalf of the tool registry.
const DEFAULT_REMOTE_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// How to launch one external tool provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Unique identifier for this provider
    pub name: String,

    /// Executable to launch
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether to launch this provider at startup
    #[serde(default)]
    pub auto_start: bool,
}

/// Errors local to the process manager.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Provider {0} is already running")]
    AlreadyRunning(String),

    #[error("Provider {0} is not running")]
    NotRunning(String),

    #[error("Failed to launch provider {server}: {reason}")]
    Spawn { server: String, reason: String },

    #[error("I/O error talking to provider: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Tool {tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Call to provider {server} timed out after {timeout_secs}s")]
    Timeout { server: String, timeout_secs: u64 },
}

pub type Result<T> = std::result::Result<T, McpError>;

/// Pipes and correlation state for one live process. Held behind the
/// per-process mutex; `None` once the process has been stopped.
struct ServerIo {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

struct ManagedServer {
    spec: ServerSpec,
    running: AtomicBool,
    io: Mutex<Option<ServerIo>>,
}

/// Supervises zero-or-more external tool provider processes.
///
/// An explicitly owned instance — pass it where it is needed instead of
/// reaching for process-wide state, so the core stays testable.
pub struct McpManager {
    servers: RwLock<HashMap<String, Arc<ManagedServer>>>,
    remote_call_timeout: Duration,
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            remote_call_timeout: DEFAULT_REMOTE_CALL_TIMEOUT,
        }
    }

    /// Bound applied to calls made through the [`RemoteToolTransport`]
    /// bridge. Raw [`call`](Self::call) stays unbounded.
    pub fn with_remote_call_timeout(mut self, timeout: Duration) -> Self {
        self.remote_call_timeout = timeout;
        self
    }

    /// Launch a provider. Fails with [`McpError::AlreadyRunning`] if a live
    /// process already holds this identifier; a stopped entry is replaced.
    pub async fn start(&self, spec: ServerSpec) -> Result<()> {
        let mut servers = self.servers.write().await;

        if let Some(existing) = servers.get(&spec.name)
            && existing.running.load(Ordering::SeqCst)
        {
            return Err(McpError::AlreadyRunning(spec.name));
        }

        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Spawn {
                server: spec.name.clone(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Spawn {
            server: spec.name.clone(),
            reason: "stdin pipe unavailable".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Spawn {
            server: spec.name.clone(),
            reason: "stdout pipe unavailable".into(),
        })?;

        // Forward provider diagnostics to our logs
        if let Some(stderr) = child.stderr.take() {
            let name = spec.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(provider = %name, "{line}");
                }
            });
        }

        info!(provider = %spec.name, command = %spec.command, "Started tool provider");

        servers.insert(
            spec.name.clone(),
            Arc::new(ManagedServer {
                spec,
                running: AtomicBool::new(true),
                io: Mutex::new(Some(ServerIo {
                    child,
                    stdin,
                    stdout: BufReader::new(stdout),
                    next_id: 1,
                })),
            }),
        );

        Ok(())
    }

    /// Stop a provider: close its input stream and kill the process.
    /// Idempotent on an already-stopped provider; unknown identifiers are
    /// [`McpError::NotRunning`].
    pub async fn stop(&self, name: &str) -> Result<()> {
        let server = {
            let servers = self.servers.write().await;
            servers
                .get(name)
                .cloned()
                .ok_or_else(|| McpError::NotRunning(name.to_string()))?
        };

        let mut guard = server.io.lock().await;
        if !server.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(io) = guard.take() {
            let ServerIo { mut child, stdin, .. } = io;
            drop(stdin);
            let _ = child.kill().await;
        }

        info!(provider = %name, "Stopped tool provider");
        Ok(())
    }

    /// Send one JSON-RPC request and block reading exactly one response
    /// line.
    ///
    /// At most one call is in flight per process; concurrent callers queue
    /// on the per-process lock. This call has no deadline of its own — a
    /// provider that never answers hangs the caller. Callers needing
    /// bounded latency use [`call_with_timeout`](Self::call_with_timeout).
    pub async fn call(
        &self,
        name: &str,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let server = self
            .get(name)
            .await
            .ok_or_else(|| McpError::NotRunning(name.to_string()))?;

        let mut guard = server.io.lock().await;
        let io = guard
            .as_mut()
            .filter(|_| server.running.load(Ordering::SeqCst))
            .ok_or_else(|| McpError::NotRunning(name.to_string()))?;

        let id = io.next_id;
        io.next_id += 1;

        let mut frame = serde_json::to_vec(&crate::protocol::RpcRequest::new(id, method, params))
            .map_err(|e| McpError::Protocol(format!("encode request: {e}")))?;
        frame.push(b'\n');

        debug!(provider = %name, method, id, "Dispatching provider call");

        if let Err(e) = async {
            io.stdin.write_all(&frame).await?;
            io.stdin.flush().await
        }
        .await
        {
            // Broken pipe means the process died under us
            server.running.store(false, Ordering::SeqCst);
            *guard = None;
            return Err(McpError::Io(e));
        }

        let mut line = String::new();
        match io.stdout.read_line(&mut line).await {
            Ok(0) => {
                server.running.store(false, Ordering::SeqCst);
                *guard = None;
                Err(McpError::Protocol(format!(
                    "provider {name} closed its output stream"
                )))
            }
            Ok(_) => {
                let response: crate::protocol::RpcResponse = serde_json::from_str(line.trim())
                    .map_err(|e| McpError::Protocol(format!("decode response: {e}")))?;
                if let Some(err) = response.error {
                    return Err(McpError::Rpc {
                        code: err.code,
                        message: err.message,
                    });
                }
                Ok(response.result.unwrap_or(serde_json::Value::Null))
            }
            Err(e) => {
                server.running.store(false, Ordering::SeqCst);
                *guard = None;
                Err(McpError::Io(e))
            }
        }
    }

    /// [`call`](Self::call) bounded by `timeout`. On expiry the provider is
    /// stopped rather than reused: a late response from the abandoned call
    /// would otherwise be read as the answer to the *next* request.
    pub async fn call_with_timeout(
        &self,
        name: &str,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        match tokio::time::timeout(timeout, self.call(name, method, params)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(provider = %name, method, "Provider call timed out; stopping process");
                let _ = self.stop(name).await;
                Err(McpError::Timeout {
                    server: name.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }

    /// Discover the tools a provider declares, as registry definitions.
    pub async fn list_tools(&self, name: &str) -> Result<Vec<ToolDefinition>> {
        let result = self
            .call_with_timeout(
                name,
                crate::protocol::METHOD_LIST_TOOLS,
                None,
                self.remote_call_timeout,
            )
            .await?;

        let listed: crate::protocol::ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("decode tool list: {e}")))?;

        Ok(listed.tools.into_iter().map(Into::into).collect())
    }

    /// Invoke a named tool on a provider, returning its text output.
    pub async fn call_tool(
        &self,
        name: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<String> {
        let params = serde_json::json!({
            "name": tool,
            "arguments": arguments,
        });

        let result = self
            .call_with_timeout(
                name,
                crate::protocol::METHOD_CALL_TOOL,
                Some(params),
                self.remote_call_timeout,
            )
            .await?;

        let call_result: crate::protocol::CallToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("decode tool result: {e}")))?;

        if call_result.is_error {
            return Err(McpError::ToolFailed {
                tool: tool.to_string(),
                message: call_result.text(),
            });
        }

        Ok(call_result.text())
    }

    /// Whether a provider with this name is currently live.
    pub async fn is_running(&self, name: &str) -> bool {
        self.get(name)
            .await
            .is_some_and(|s| s.running.load(Ordering::SeqCst))
    }

    /// Liveness of every registered provider.
    pub async fn status(&self) -> HashMap<String, bool> {
        let servers = self.servers.read().await;
        servers
            .iter()
            .map(|(name, server)| (name.clone(), server.running.load(Ordering::SeqCst)))
            .collect()
    }

    /// The specs of every registered provider.
    pub async fn list(&self) -> Vec<ServerSpec> {
        let servers = self.servers.read().await;
        servers.values().map(|s| s.spec.clone()).collect()
    }

    /// Start every spec marked `auto_start`, logging failures instead of
    /// aborting the rest.
    pub async fn start_configured(&self, specs: &[ServerSpec]) {
        for spec in specs {
            if !spec.auto_start {
                continue;
            }
            if let Err(e) = self.start(spec.clone()).await {
                warn!(provider = %spec.name, error = %e, "Failed to start tool provider");
            }
        }
    }

    /// Stop every live provider.
    pub async fn shutdown_all(&self) {
        let names: Vec<String> = {
            let servers = self.servers.read().await;
            servers.keys().cloned().collect()
        };
        for name in names {
            let _ = self.stop(&name).await;
        }
    }

    async fn get(&self, name: &str) -> Option<Arc<ManagedServer>> {
        let servers = self.servers.read().await;
        servers.get(name).cloned()
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteToolTransport for McpManager {
    async fn call_tool(
        &self,
        provider: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError> {
        McpManager::call_tool(self, provider, tool, arguments)
            .await
            .map_err(|e| match e {
                McpError::Timeout { timeout_secs, .. } => ToolError::Timeout {
                    tool_name: tool.to_string(),
                    timeout_secs,
                },
                McpError::ToolFailed { message, .. } => ToolError::ExecutionFailed {
                    tool_name: tool.to_string(),
                    reason: message,
                },
                other => ToolError::ExecutionFailed {
                    tool_name: tool.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    async fn list_tools(
        &self,
        provider: &str,
    ) -> std::result::Result<Vec<ToolDefinition>, ToolError> {
        McpManager::list_tools(self, provider)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: format!("{provider}/tools"),
                reason: e.to_string(),
            })
    }
}
