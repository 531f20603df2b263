//! read_file tool - return a file's contents

use async_trait::async_trait;
use serde_json::Value;

use super::{Params, Tool, ToolContext, ToolError, ToolKind, required};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ReadFile
    }

    fn description(&self) -> &'static str {
        "Read the full contents of a file in the repository."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: &Params, ctx: &ToolContext) -> Result<String, ToolError> {
        let path = required(params, "file_path")?;
        let full_path = ctx.resolve(path);

        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolError::FileNotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(ToolError::io(format!("reading '{}'", path), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params(path: &str) -> Params {
        let mut p = Params::new();
        p.insert("file_path".into(), path.into());
        p
    }

    #[tokio::test]
    async fn test_read_file_basic() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "line 1\nline 2").unwrap();
        let ctx = ToolContext::new(dir.path());

        let out = ReadFileTool.execute(&params("app.py"), &ctx).await.unwrap();
        assert_eq!(out, "line 1\nline 2");
    }

    #[tokio::test]
    async fn test_read_file_missing() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let err = ReadFileTool.execute(&params("nope.py"), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "File 'nope.py' not found.");
    }

    #[tokio::test]
    async fn test_read_file_requires_path() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let err = ReadFileTool.execute(&Params::new(), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingParam { .. }));
    }
}
