//! Tool system
//!
//! The four tool identities a plan step may name, dispatched through a closed
//! `ToolKind` enum. Each tool runs against a `ToolContext` scoped to the
//! working copy and reports failure as a `ToolError`, which the registry
//! turns into outcome text.

mod context;
mod list_files;
mod query_code_graph;
mod read_file;
mod registry;
mod write_file;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

pub use context::{DEFAULT_MAX_OUTPUT_BYTES, ToolContext, ToolError};
pub use list_files::ListFilesTool;
pub use query_code_graph::QueryCodeGraphTool;
pub use read_file::ReadFileTool;
pub use registry::ToolRegistry;
pub use write_file::WriteFileTool;

/// Step parameters as handed to a tool
pub type Params = BTreeMap<String, String>;

/// The closed set of tools a plan may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    QueryCodeGraph,
    ReadFile,
    WriteFile,
    ListFiles,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::QueryCodeGraph,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::ListFiles,
    ];

    /// Name used in plans and LLM tool definitions
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::QueryCodeGraph => "query_code_graph",
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::ListFiles => "list_files",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "query_code_graph" => Some(ToolKind::QueryCodeGraph),
            "read_file" => Some(ToolKind::ReadFile),
            "write_file" => Some(ToolKind::WriteFile),
            "list_files" => Some(ToolKind::ListFiles),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A capability a plan step can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool with the step's parameters
    async fn execute(&self, params: &Params, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Fetch a required parameter
pub(crate) fn required<'a>(params: &'a Params, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ToolError::MissingParam { name: name.to_string() })
}
