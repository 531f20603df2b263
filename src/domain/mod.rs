//! Domain types for fixloop
//!
//! - Plan / Step: an ordered list of tool invocations from one planning round
//! - ExecutionTrace / StepOutcome: per-step results, index-aligned with the plan
//! - ReviewVerdict: Complete, or Revise with a reason
//! - WorkflowState: the loop controller's immutable working memory
//! - RunOutcome: terminal status plus a per-round summary

pub mod outcome;
pub mod plan;
pub mod state;
pub mod trace;
pub mod verdict;

pub use outcome::{
    EXIT_CANCELLED, EXIT_ERROR, EXIT_EXHAUSTED, EXIT_INFRASTRUCTURE, EXIT_RESOLVED, Persistence, RoundSummary,
    RunOutcome, RunStatus,
};
pub use plan::{FILE_PATH_PARAM, Plan, Step};
pub use state::{ContextMode, Phase, WorkflowState};
pub use trace::{ExecutionTrace, StepOutcome};
pub use verdict::ReviewVerdict;
