//! # forgehand MCP
//!
//! Supervision of external tool providers: long-lived child processes that
//! speak a line-delimited JSON-RPC request/response protocol over stdio.
//! The [`McpManager`] owns the process table, serializes access to each
//! process, and bridges provider-declared tools into the core registry via
//! [`forgehand_core::RemoteToolTransport`].

pub mod manager;
pub mod protocol;

pub use manager::{McpError, McpManager, Result, ServerSpec};
