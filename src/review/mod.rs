//! Review stage
//!
//! A `Reviewer` judges a plan and its trace. Its output is always exactly
//! `Complete` or `Revise(reason)` with a non-empty reason; only a failure no
//! later round can fix comes back as an error.

mod llm_reviewer;

use async_trait::async_trait;

use crate::domain::{ExecutionTrace, Plan, ReviewVerdict};

pub use llm_reviewer::{LlmReviewer, LlmReviewerConfig, parse_verdict};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Reviewer cannot work at all (missing credentials, auth rejected)
    #[error("Reviewer unavailable: {0}")]
    Fatal(String),
}

/// Judges a completed execution
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, issue: &str, plan: &Plan, trace: &ExecutionTrace) -> Result<ReviewVerdict, ReviewError>;
}
