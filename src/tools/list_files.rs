//! list_files tool - list a directory's entries

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use serde_json::Value;

use super::{Params, Tool, ToolContext, ToolError, ToolKind};

pub struct ListFilesTool;

impl ListFilesTool {
    async fn list_flat(dir: &Path, shown: &str) -> Result<Vec<String>, ToolError> {
        let mut entries = Vec::new();
        let mut rd = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| ToolError::io(format!("listing '{}'", shown), e))?;

        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| ToolError::io(format!("listing '{}'", shown), e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{}/", name) } else { name });
        }
        Ok(entries)
    }

    fn list_recursive(dir: &Path) -> Result<Vec<String>, ToolError> {
        let escaped = PathBuf::from(Pattern::escape(&dir.to_string_lossy()));
        let pattern = escaped.join("**").join("*");
        let options = MatchOptions {
            require_literal_leading_dot: true,
            ..MatchOptions::new()
        };
        let paths = glob::glob_with(&pattern.to_string_lossy(), options).map_err(|e| ToolError::InvalidInput {
            message: e.to_string(),
        })?;

        let mut entries = Vec::new();
        for path in paths.flatten() {
            if let Ok(rel) = path.strip_prefix(dir) {
                let rel = rel.to_string_lossy().replace('\\', "/");
                entries.push(if path.is_dir() { format!("{}/", rel) } else { rel });
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ListFiles
    }

    fn description(&self) -> &'static str {
        "List files and directories in a directory (default: repository root)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory relative to the repository root (default: .)"
                }
            }
        })
    }

    async fn execute(&self, params: &Params, ctx: &ToolContext) -> Result<String, ToolError> {
        let directory = params.get("directory").map(String::as_str).unwrap_or(".");
        let full_path = ctx.resolve(directory);

        if !full_path.is_dir() {
            return Err(ToolError::DirectoryNotFound {
                path: directory.to_string(),
            });
        }

        let mut entries = if ctx.list_recursive {
            Self::list_recursive(&full_path)?
        } else {
            Self::list_flat(&full_path, directory).await?
        };
        entries.sort();

        if entries.is_empty() {
            Ok("(empty directory)".to_string())
        } else {
            Ok(entries.join("\n"))
        }
    }
}
