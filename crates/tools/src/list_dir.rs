//! Directory listing tool.

use async_trait::async_trait;
use forgehand_core::error::ToolError;
use forgehand_core::tool::Tool;

pub struct ListDirTool;

impl ListDirTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ListDirTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are suffixed with '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to list (defaults to '.')"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");

        let mut reader =
            tokio::fs::read_dir(path)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "list_dir".into(),
                    reason: format!("{path}: {e}"),
                })?;

        let mut entries = Vec::new();
        while let Some(entry) =
            reader
                .next_entry()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "list_dir".into(),
                    reason: e.to_string(),
                })?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }

        entries.sort();
        Ok(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_entries_sorted_with_dir_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let tool = ListDirTool::new();
        let output = tool
            .execute(serde_json::json!({"path": dir.path()}))
            .await
            .unwrap();
        assert_eq!(output, "a.txt\nb.txt\nsrc/");
    }

    #[tokio::test]
    async fn missing_directory_is_execution_error() {
        let tool = ListDirTool::new();
        let err = tool
            .execute(serde_json::json!({"path": "/no/such/dir"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
