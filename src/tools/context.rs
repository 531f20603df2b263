//! Tool execution context - scoped to one working copy

use std::path::{Path, PathBuf};

/// Default cap on tool output size
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100_000;

const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Execution context shared by every step of a run
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Working copy root; relative paths resolve against it
    pub work_dir: PathBuf,

    /// Output beyond this many bytes is cut
    pub max_output_bytes: usize,

    /// list_files walks subdirectories when set
    pub list_recursive: bool,
}

impl ToolContext {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            list_recursive: false,
        }
    }

    pub fn with_max_output(mut self, max_bytes: usize) -> Self {
        self.max_output_bytes = max_bytes;
        self
    }

    pub fn with_recursive_listing(mut self, recursive: bool) -> Self {
        self.list_recursive = recursive;
        self
    }

    /// Resolve a tool path. Absolute paths pass through unchanged; writes are
    /// not confined to the working copy.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() { p.to_path_buf() } else { self.work_dir.join(p) }
    }

    /// Cut output to `max_output_bytes` on a char boundary
    pub fn truncate_output(&self, mut output: String) -> String {
        if output.len() > self.max_output_bytes {
            let mut cut = self.max_output_bytes;
            while cut > 0 && !output.is_char_boundary(cut) {
                cut -= 1;
            }
            output.truncate(cut);
            output.push_str(TRUNCATION_MARKER);
        }
        output
    }
}

/// Errors raised inside a tool. The executor turns them into step outcomes.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing required parameter '{name}'.")]
    MissingParam { name: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("File '{path}' not found.")]
    FileNotFound { path: String },

    #[error("Directory '{path}' not found.")]
    DirectoryNotFound { path: String },

    #[error("IO error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Graph query failed: {0}")]
    Graph(String),
}

impl ToolError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        ToolError::Io {
            operation: operation.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let ctx = ToolContext::new("/work/repo");
        assert_eq!(ctx.resolve("src/app.py"), PathBuf::from("/work/repo/src/app.py"));
        assert_eq!(ctx.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_truncate_output() {
        let ctx = ToolContext::new(".").with_max_output(5);
        assert_eq!(ctx.truncate_output("abc".into()), "abc");
        let cut = ctx.truncate_output("abcdefgh".into());
        assert!(cut.starts_with("abcde"));
        assert!(cut.ends_with("[output truncated]"));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let ctx = ToolContext::new(".").with_max_output(2);
        // 'é' is two bytes; cutting at 2 would split it
        let cut = ctx.truncate_output("aé".into());
        assert!(cut.starts_with('a'));
        assert!(!cut.starts_with("aé"));
    }

    #[test]
    fn test_error_messages() {
        let e = ToolError::FileNotFound { path: "x.py".into() };
        assert_eq!(e.to_string(), "File 'x.py' not found.");
        let e = ToolError::MissingParam { name: "file_path".into() };
        assert_eq!(e.to_string(), "Missing required parameter 'file_path'.");
    }
}
