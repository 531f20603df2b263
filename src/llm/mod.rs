//! LLM client layer
//!
//! - Message types for LLM communication
//! - LlmClient trait, shared by planner and reviewer
//! - AnthropicClient implementation
//! - MockLlmClient for tests

pub mod anthropic;
pub mod client;
pub mod types;

pub use anthropic::{API_KEY_ENV, AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, ToolDefinition, Usage};
