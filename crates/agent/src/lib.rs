//! # forgehand Agent
//!
//! The conversation state machine: send the running history plus tool
//! declarations to the model, then either finish with the model's text or
//! execute every requested tool call and resume, bounded by an iteration
//! ceiling.

pub mod loop_runner;

pub use loop_runner::AgentLoop;
