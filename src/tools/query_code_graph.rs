//! query_code_graph tool - read-only SQL against the code graph

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{Params, Tool, ToolContext, ToolError, ToolKind, required};
use crate::graph::CodeGraph;

pub struct QueryCodeGraphTool {
    graph: Arc<CodeGraph>,
}

impl QueryCodeGraphTool {
    pub fn new(graph: Arc<CodeGraph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Tool for QueryCodeGraphTool {
    fn kind(&self) -> ToolKind {
        ToolKind::QueryCodeGraph
    }

    fn description(&self) -> &'static str {
        "Run a read-only SQL query against the code knowledge graph. Tables: \
         nodes(id, label, name, file_path) with labels File|Class|Function|Module; \
         edges(src, dst, rel) with rels CONTAINS|IMPORTS|APPLIES_TO_FILE; \
         plans(id, issue, steps, created_at); plan_files(plan_id, file_path)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A single read-only SQL statement"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: &Params, _ctx: &ToolContext) -> Result<String, ToolError> {
        let query = required(params, "query")?;
        if query.trim().is_empty() {
            return Err(ToolError::InvalidInput {
                message: "query is empty".to_string(),
            });
        }
        let graph = Arc::clone(&self.graph);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || graph.query(&query))
            .await
            .map_err(|e| ToolError::Graph(e.to_string()))?
            .map_err(|e| ToolError::Graph(e.to_string()))
    }
}
