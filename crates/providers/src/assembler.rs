//! Tool-call assembler.
//!
//! Streamed tool calls arrive as fragments keyed by their position in the
//! response: the id and name usually show up on the first fragment, but the
//! protocol allows them on any fragment, and argument text trickles in as
//! chunks of not-yet-valid JSON. The assembler merges fragments per index
//! and flushes complete calls once the decoder signals the turn is over.
//!
//! Keying is by stream-provided `index`, not id — continuation chunks may
//! interleave across indices, and emitted calls preserve index order rather
//! than arrival order.

use std::collections::BTreeMap;

use forgehand_core::message::ToolCallRequest;
use tracing::warn;

#[derive(Debug, Default)]
struct CallBuilder {
    id: String,
    name: String,
    arguments: String,
}

impl CallBuilder {
    /// A builder is complete once both id and name are known; argument text
    /// is only trusted after the stream finishes.
    fn complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty()
    }
}

/// Accumulates fragmented tool-call deltas into complete calls.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    builders: BTreeMap<u32, CallBuilder>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment. First non-empty id wins, first non-empty name
    /// wins, argument chunks concatenate in arrival order.
    pub fn push(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        let builder = self.builders.entry(index).or_default();

        if builder.id.is_empty()
            && let Some(id) = id
            && !id.is_empty()
        {
            builder.id = id.to_string();
        }
        if builder.name.is_empty()
            && let Some(name) = name
            && !name.is_empty()
        {
            builder.name = name.to_string();
        }
        if let Some(chunk) = arguments {
            builder.arguments.push_str(chunk);
        }
    }

    /// Whether any fragments have been seen.
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Flush all complete builders in index order, discarding incomplete
    /// ones as a protocol anomaly. Resets the assembler for the next turn.
    pub fn finish(&mut self) -> Vec<ToolCallRequest> {
        let builders = std::mem::take(&mut self.builders);
        let mut calls = Vec::with_capacity(builders.len());

        for (index, builder) in builders {
            if builder.complete() {
                calls.push(ToolCallRequest {
                    id: builder.id,
                    name: builder.name,
                    arguments: builder.arguments,
                });
            } else {
                warn!(
                    index,
                    id = %builder.id,
                    name = %builder.name,
                    "Discarding incomplete tool call at end of stream"
                );
            }
        }
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_call() {
        let mut asm = ToolCallAssembler::new();
        asm.push(0, Some("call_1"), Some("list_dir"), Some(r#"{"path":"."}"#));

        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "list_dir");
        assert_eq!(calls[0].arguments, r#"{"path":"."}"#);
    }

    #[test]
    fn fragmentation_invariance() {
        // Everything in one frame
        let mut whole = ToolCallAssembler::new();
        whole.push(0, Some("call_1"), Some("read_file"), Some(r#"{"path":"a.txt"}"#));

        // Same data split across four fragments, id arriving late
        let mut split = ToolCallAssembler::new();
        split.push(0, None, Some("read_file"), Some(r#"{"pa"#));
        split.push(0, Some("call_1"), None, None);
        split.push(0, None, None, Some(r#"th":"a"#));
        split.push(0, None, None, Some(r#".txt"}"#));

        assert_eq!(whole.finish(), split.finish());
    }

    #[test]
    fn first_non_empty_id_and_name_win() {
        let mut asm = ToolCallAssembler::new();
        asm.push(0, Some(""), Some(""), None);
        asm.push(0, Some("call_a"), Some("shell"), None);
        asm.push(0, Some("call_b"), Some("other"), None);

        let calls = asm.finish();
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].name, "shell");
    }

    #[test]
    fn interleaved_indices_emit_in_index_order() {
        let mut asm = ToolCallAssembler::new();
        // Index 1 starts arriving before index 0 is done
        asm.push(1, Some("call_b"), Some("read_file"), Some("{"));
        asm.push(0, Some("call_a"), Some("list_dir"), Some("{}"));
        asm.push(1, None, None, Some("}"));

        let calls = asm.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[1].id, "call_b");
        assert_eq!(calls[1].arguments, "{}");
    }

    #[test]
    fn incomplete_builder_discarded() {
        let mut asm = ToolCallAssembler::new();
        asm.push(0, Some("call_a"), Some("list_dir"), Some("{}"));
        // Never receives a name — protocol anomaly, dropped at finish
        asm.push(1, Some("call_b"), None, Some(r#"{"x":1}"#));

        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_a");
    }

    #[test]
    fn finish_resets_for_next_turn() {
        let mut asm = ToolCallAssembler::new();
        asm.push(0, Some("call_1"), Some("shell"), Some("{}"));
        assert_eq!(asm.finish().len(), 1);

        assert!(asm.is_empty());
        assert!(asm.finish().is_empty());
    }
}
