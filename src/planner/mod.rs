//! Planning stage
//!
//! A `Planner` turns an issue plus a `PlanContext` into a new `Plan`. Planning
//! never fails from the loop's point of view: generation problems come back
//! as an empty plan.

mod llm_planner;

use async_trait::async_trait;

use crate::domain::{ContextMode, ExecutionTrace, Plan};
use crate::store::CachedPlanRecord;

pub use llm_planner::{LlmPlanner, LlmPlannerConfig, steps_from_response};

/// What the planner knows besides the issue text
#[derive(Debug, Clone)]
pub enum PlanContext {
    /// No prior signal
    Fresh,
    /// A stored plan for a similar issue
    CacheSeeded(CachedPlanRecord),
    /// The previous round was rejected
    RecoverySeeded {
        failed_plan: Plan,
        trace: ExecutionTrace,
        reason: String,
    },
}

impl PlanContext {
    pub fn mode(&self) -> ContextMode {
        match self {
            PlanContext::Fresh => ContextMode::Fresh,
            PlanContext::CacheSeeded(_) => ContextMode::CacheSeeded,
            PlanContext::RecoverySeeded { .. } => ContextMode::RecoverySeeded,
        }
    }
}

/// Produces an ordered plan for an issue
#[async_trait]
pub trait Planner: Send + Sync {
    /// Always returns a plan with a fresh id, possibly empty
    async fn plan(&self, issue: &str, context: &PlanContext) -> Plan;
}
