//! Error types for fixloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in fixloop
#[derive(Debug, Error)]
pub enum FixloopError {
    /// A plan step named a tool the registry does not know
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// Tool execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Planner or reviewer produced unusable output
    #[error("Generation error: {0}")]
    Generation(String),

    /// Plan store read/write failure
    #[error("Store error: {0}")]
    Store(String),

    /// Code graph database failure
    #[error("Graph error: {0}")]
    Graph(String),

    /// Working copy preparation or git failure
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Run was cancelled between state-machine nodes
    #[error("Run cancelled")]
    Cancelled,

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type alias for fixloop operations
pub type Result<T> = std::result::Result<T, FixloopError>;
