//! # forgehand Providers
//!
//! Chat backend implementations. The only real backend is the
//! OpenAI-compatible `/chat/completions` provider, which covers Z.AI,
//! OpenAI, and every proxy speaking the same protocol.
//!
//! The streaming path is split into two pieces the agent loop composes:
//! - [`stream::SseParser`] decodes the server-sent-event byte stream into
//!   discrete [`forgehand_core::StreamEvent`]s;
//! - [`assembler::ToolCallAssembler`] merges fragmented tool-call deltas
//!   into complete, ready-to-invoke calls.

pub mod assembler;
pub mod openai;
pub mod stream;

pub use assembler::ToolCallAssembler;
pub use openai::OpenAiCompatProvider;
pub use stream::SseParser;
