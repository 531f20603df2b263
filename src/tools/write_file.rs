//! write_file tool - create or overwrite a file

use async_trait::async_trait;
use serde_json::Value;

use super::{Params, Tool, ToolContext, ToolError, ToolKind, required};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WriteFile
    }

    fn description(&self) -> &'static str {
        "Write content to a file, replacing it if it exists. Parent directories are created."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "content": {
                    "type": "string",
                    "description": "Complete new file contents"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, params: &Params, ctx: &ToolContext) -> Result<String, ToolError> {
        let path = required(params, "file_path")?;
        let content = required(params, "content")?;
        let full_path = ctx.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io(format!("creating directories for '{}'", path), e))?;
        }

        tokio::fs::write(&full_path, content)
            .await
            .map_err(|e| ToolError::io(format!("writing '{}'", path), e))?;

        Ok(format!("Successfully wrote {} bytes to '{}'.", content.len(), path))
    }
}
