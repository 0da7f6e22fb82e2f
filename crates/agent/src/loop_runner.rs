//! The agent loop implementation.
//!
//! One task runs its state machine to completion without internal parallel
//! branches: tool-call ordering is significant, so calls execute
//! sequentially and each result lands in history before the next call
//! starts. Only a transport failure or the iteration ceiling aborts a task;
//! tool failures are absorbed into the conversation so the model can
//! recover.

use std::sync::Arc;

use chrono::Utc;
use forgehand_core::error::Error;
use forgehand_core::event::{DomainEvent, EventBus};
use forgehand_core::message::{Conversation, Message, Role};
use forgehand_core::provider::{Provider, ProviderRequest, StreamEvent};
use forgehand_core::tool::ToolRegistry;
use forgehand_providers::assembler::ToolCallAssembler;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// System prompt prepended to each conversation
    system_prompt: Option<String>,

    /// Maximum tool-call round-trips per task
    max_iterations: u32,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    /// Cancellation signal for the whole task
    cancel: CancellationToken,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: None,
            max_iterations: 10,
            event_bus,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the maximum number of tool-call round-trips.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Attach a cancellation token for the whole task.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process a conversation until the model produces a final answer.
    ///
    /// Text fragments are forwarded to `on_chunk` as they arrive. Returns
    /// the accumulated text of the terminal response, or an error if the
    /// transport fails, the task is cancelled, or the model is still
    /// requesting tools after `max_iterations` round-trips.
    pub async fn process<F>(
        &self,
        conversation: &mut Conversation,
        mut on_chunk: F,
    ) -> Result<String, Error>
    where
        F: FnMut(&str),
    {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Processing conversation"
        );

        if let Some(prompt) = &self.system_prompt
            && conversation
                .messages
                .first()
                .is_none_or(|m| m.role != Role::System)
        {
            conversation.messages.insert(0, Message::system(prompt));
        }

        let tool_definitions = self.tools.definitions();

        for iteration in 1..=self.max_iterations {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            debug!(
                conversation_id = %conversation.id,
                iteration,
                "Agent loop iteration"
            );

            let mut request = ProviderRequest::with_auto_tools(
                &self.model,
                conversation.messages.clone(),
                tool_definitions.clone(),
            );
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.stream = true;

            let (text, calls) = self.read_response(request, &mut on_chunk).await?;

            self.event_bus.publish(DomainEvent::ResponseGenerated {
                conversation_id: conversation.id.to_string(),
                model: self.model.clone(),
                tool_calls: calls.len(),
                timestamp: Utc::now(),
            });

            conversation.push(Message::assistant_with_calls(text.clone(), calls.clone()));

            // No tool calls — this is the final text response
            if calls.is_empty() {
                return Ok(text);
            }

            debug!(tool_count = calls.len(), "Executing tool calls");

            // Sequential by contract: a later call may depend on an earlier
            // one, and each result must precede the next call in history.
            for call in &calls {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                let start = std::time::Instant::now();
                let result = self.tools.execute(call).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                if result.is_error {
                    warn!(tool = %call.name, output = %result.content, "Tool call failed");
                }

                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: !result.is_error,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                conversation.push(Message::tool_result(&call.id, &result.content));
            }
        }

        warn!(
            conversation_id = %conversation.id,
            limit = self.max_iterations,
            "Model still requesting tools at the iteration ceiling"
        );
        Err(Error::IterationCeiling {
            limit: self.max_iterations,
        })
    }

    /// Consume one decoded response stream: forward text, assemble tool
    /// calls, and flush the assembler when the stream finishes.
    async fn read_response<F>(
        &self,
        request: ProviderRequest,
        on_chunk: &mut F,
    ) -> Result<(String, Vec<forgehand_core::message::ToolCallRequest>), Error>
    where
        F: FnMut(&str),
    {
        let mut rx = self.provider.stream(request).await.map_err(Error::Provider)?;

        let mut assembler = ToolCallAssembler::new();
        let mut text = String::new();

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                event = rx.recv() => event,
            };

            match event {
                Some(Ok(StreamEvent::Text(chunk))) => {
                    on_chunk(&chunk);
                    text.push_str(&chunk);
                }
                Some(Ok(StreamEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                })) => {
                    assembler.push(index, id.as_deref(), name.as_deref(), arguments.as_deref());
                }
                // Arguments are only final once the response is over, so
                // the flush happens below in either exit path.
                Some(Ok(StreamEvent::Finished(_))) => break,
                Some(Err(e)) => return Err(Error::Provider(e)),
                None => break,
            }
        }

        Ok((text, assembler.finish()))
    }
}
