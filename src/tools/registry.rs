//! Tool registry - maps tool names to capabilities

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use super::{ListFilesTool, Params, QueryCodeGraphTool, ReadFileTool, Tool, ToolContext, ToolKind, WriteFileTool};
use crate::error::{FixloopError, Result};
use crate::graph::CodeGraph;
use crate::llm::ToolDefinition;

/// Registered tools, keyed by kind
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with all four tools
    pub fn standard(graph: Arc<CodeGraph>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(QueryCodeGraphTool::new(graph)));
        registry.register(Box::new(ReadFileTool));
        registry.register(Box::new(WriteFileTool));
        registry.register(Box::new(ListFilesTool));
        registry
    }

    /// Empty registry
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Add or replace a tool
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    /// Look up a tool by name. Pure lookup.
    pub fn resolve(&self, name: &str) -> Result<&dyn Tool> {
        ToolKind::parse(name)
            .and_then(|kind| self.tools.get(&kind))
            .map(|tool| tool.as_ref())
            .ok_or_else(|| FixloopError::ToolNotFound(name.to_string()))
    }

    /// Invoke a tool by name. Every failure, including an unknown name, comes
    /// back as `Err(text)` rather than a fault.
    pub async fn invoke(&self, name: &str, params: &Params, ctx: &ToolContext) -> std::result::Result<String, String> {
        let tool = self.resolve(name).map_err(|e| format!("Error: {}.", e))?;
        debug!("invoking {} with {} params", name, params.len());
        match tool.execute(params, ctx).await {
            Ok(output) => Ok(ctx.truncate_output(output)),
            Err(e) => Err(ctx.truncate_output(format!("Error: {}", e))),
        }
    }

    /// Tool definitions for the planner's LLM request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.kind().name(), t.description(), t.input_schema()))
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().map(ToolKind::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
