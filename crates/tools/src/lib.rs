//! # forgehand Tools
//!
//! Built-in local tools: file inspection, file editing, and shell
//! execution. Each implements [`forgehand_core::Tool`] and registers into
//! the [`forgehand_core::ToolRegistry`] alongside any tools discovered
//! from external providers.

pub mod file_read;
pub mod file_write;
pub mod list_dir;
pub mod shell;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use list_dir::ListDirTool;
pub use shell::ShellTool;

use forgehand_core::ToolRegistry;
use std::sync::Arc;

/// Build a registry pre-loaded with the built-in tools.
pub fn default_registry(allowed_commands: Vec<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register_local(Arc::new(FileReadTool::new()));
    registry.register_local(Arc::new(FileWriteTool::new()));
    registry.register_local(Arc::new(ListDirTool::new()));
    registry.register_local(Arc::new(ShellTool::new(allowed_commands)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtin_tools() {
        let registry = default_registry(vec![]);
        assert!(registry.has_tool("file_read"));
        assert!(registry.has_tool("file_write"));
        assert!(registry.has_tool("list_dir"));
        assert!(registry.has_tool("shell"));
    }
}
