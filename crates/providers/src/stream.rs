//! SSE stream decoder.
//!
//! Parses a `text/event-stream` response body into discrete
//! [`StreamEvent`]s: text fragments, tool-call fragments, and the finish
//! signal. The parser is incremental — network chunks can split lines and
//! frames anywhere — and owns nothing beyond the line buffer for one
//! in-flight response.
//!
//! Malformed `data:` payloads are skipped, not fatal: one corrupt frame
//! must not abort the remaining valid stream. The `data: [DONE]` sentinel
//! marks clean termination; reaching end-of-body without it is surfaced by
//! the caller as a distinct error.

use forgehand_core::provider::{FinishReason, StreamEvent};
use serde::Deserialize;
use tracing::trace;

/// A single SSE `data: {...}` frame from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A tool call delta — arrives incrementally across frames.
#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Incremental decoder for one streaming response body.
pub struct SseParser {
    buffer: String,
    terminated: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            terminated: false,
        }
    }

    /// Whether the `[DONE]` terminator has been seen.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed a network chunk, returning every event completed by it.
    /// Further input after the terminator is ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }

        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);

            self.decode_line(&line, &mut events);
            if self.terminated {
                break;
            }
        }
        events
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let line = line.trim();

        // Blank keep-alives and SSE comments
        if line.is_empty() || line.starts_with(':') {
            return;
        }

        let Some(payload) = line.strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim();

        if payload == "[DONE]" {
            self.terminated = true;
            return;
        }

        let frame: StreamFrame = match serde_json::from_str(payload) {
            Ok(frame) => frame,
            Err(e) => {
                trace!(payload = %payload, error = %e, "Skipping unparseable SSE frame");
                return;
            }
        };

        for choice in frame.choices {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(StreamEvent::Text(content));
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                events.push(StreamEvent::ToolCallDelta {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                });
            }

            if let Some(reason) = choice.finish_reason {
                events.push(StreamEvent::Finished(FinishReason::from_wire(&reason)));
            }
        }
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut SseParser, input: &str) -> Vec<StreamEvent> {
        parser.feed(input.as_bytes())
    }

    #[test]
    fn text_fragments_in_order() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n",
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Text("Hel".into()),
                StreamEvent::Text("lo".into())
            ]
        );
    }

    #[test]
    fn chunk_split_mid_line_is_reassembled() {
        let mut parser = SseParser::new();
        let mut events = parser.feed(b"data: {\"choices\":[{\"delta\":{\"con");
        assert!(events.is_empty());
        events.extend(parser.feed(b"tent\":\"hi\"},\"finish_reason\":null}]}\n"));
        assert_eq!(events, vec![StreamEvent::Text("hi".into())]);
    }

    #[test]
    fn malformed_frame_between_valid_frames_is_skipped() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\n\
             data: {not json\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":null}]}\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::Text("a".into()), StreamEvent::Text("b".into())]
        );
    }

    #[test]
    fn done_sentinel_terminates() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\
             data: [DONE]\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"after\"},\"finish_reason\":null}]}\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::Finished(FinishReason::Stop)]
        );
        assert!(parser.is_terminated());
        // Input after the terminator stays ignored
        assert!(parser.feed(b"data: anything\n").is_empty());
    }

    #[test]
    fn tool_call_delta_fields_pass_through() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"list_dir\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallDelta {
                index: 0,
                id: Some("call_a".into()),
                name: Some("list_dir".into()),
                arguments: Some("".into()),
            }]
        );
    }

    #[test]
    fn arguments_only_delta_has_no_id_or_name() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"path\\\"\"}}]},\"finish_reason\":null}]}\n",
        );
        match &events[0] {
            StreamEvent::ToolCallDelta { id, name, arguments, .. } => {
                assert!(id.is_none());
                assert!(name.is_none());
                assert_eq!(arguments.as_deref(), Some("{\"path\""));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn finish_reason_tool_calls() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::Finished(FinishReason::ToolCalls)]
        );
    }

    #[test]
    fn comments_and_blank_lines_skipped() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            ": keep-alive\n\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"},\"finish_reason\":null}]}\n",
        );
        assert_eq!(events, vec![StreamEvent::Text("x".into())]);
    }

    #[test]
    fn crlf_lines_accepted() {
        let mut parser = SseParser::new();
        let events = feed_all(
            &mut parser,
            "data: {\"choices\":[{\"delta\":{\"content\":\"y\"},\"finish_reason\":null}]}\r\ndata: [DONE]\r\n",
        );
        assert_eq!(events, vec![StreamEvent::Text("y".into())]);
        assert!(parser.is_terminated());
    }
}
