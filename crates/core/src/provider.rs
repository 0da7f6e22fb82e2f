//! Provider trait — the abstraction over LLM chat backends.
//!
//! A Provider knows how to send a conversation to a model and get a
//! response back, either as a complete message or as a stream of decoded
//! events. The agent loop consumes `stream()` without knowing which backend
//! is behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCallRequest};
use crate::tool::ToolDefinition;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "glm-4-32b-0414", "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Tool choice policy ("auto" or "none"); only sent when tools are
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// A request with the "automatic tool choice" policy the agent loop uses.
    pub fn with_auto_tools(
        model: impl Into<String>,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        let tool_choice = (!tools.is_empty()).then(|| "auto".to_string());
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools,
            tool_choice,
            stream: false,
        }
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why a streamed response stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// The model finished speaking.
    Stop,
    /// The model stopped to request tool invocations.
    ToolCalls,
    /// Any other reason the API reported (length, content filter, ...).
    Other(String),
}

impl FinishReason {
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "tool_calls" => Self::ToolCalls,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A decoded event from a streaming response.
///
/// The decoder hands these to the consumer in arrival order; tool-call
/// data arrives fragmented and is reassembled by the consumer's
/// `ToolCallAssembler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text.
    Text(String),

    /// A fragment of a tool call, keyed by its position in the response.
    /// `id` and `name` may arrive on any fragment; `arguments` chunks
    /// concatenate in arrival order.
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },

    /// The response finished cleanly.
    Finished(FinishReason),
}

/// The receiver half of a decoded response stream.
pub type EventStream =
    tokio::sync::mpsc::Receiver<std::result::Result<StreamEvent, ProviderError>>;

/// The core Provider trait.
///
/// Every chat backend implements this. The agent loop calls `stream()`
/// without knowing which provider is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "zai", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of decoded events over a bounded
    /// channel.
    ///
    /// Default implementation calls `complete()` and replays the result as
    /// events: backends without native streaming still satisfy the same
    /// consumer contract, including the terminal `Finished` event.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<EventStream, ProviderError> {
        let response = self.complete(request).await?;
        // Sized to hold the whole replay: nothing consumes the channel
        // until this function returns the receiver.
        let (tx, rx) = tokio::sync::mpsc::channel(response.message.tool_calls.len() + 2);

        let reason = if response.message.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };

        if !response.message.content.is_empty() {
            let _ = tx.send(Ok(StreamEvent::Text(response.message.content))).await;
        }
        for (index, tc) in response.message.tool_calls.into_iter().enumerate() {
            let ToolCallRequest { id, name, arguments } = tc;
            let _ = tx
                .send(Ok(StreamEvent::ToolCallDelta {
                    index: index as u32,
                    id: Some(id),
                    name: Some(name),
                    arguments: Some(arguments),
                }))
                .await;
        }
        let _ = tx.send(Ok(StreamEvent::Finished(reason))).await;

        Ok(rx)
    }

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
