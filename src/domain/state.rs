//! Workflow state for one issue-resolution run
//!
//! The state is a value: each transition consumes it and returns the next
//! one, so nothing observing an older state sees it change underneath.

use serde::{Deserialize, Serialize};

use super::{ExecutionTrace, Plan, ReviewVerdict};
use crate::error::{FixloopError, Result};
use crate::id::generate_run_id;

/// State-machine node the run is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Executing,
    Reviewing,
    Persisting,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planning => "planning",
            Phase::Executing => "executing",
            Phase::Reviewing => "reviewing",
            Phase::Persisting => "persisting",
            Phase::Done => "done",
        }
    }
}

/// Which context the planner was given for a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    Fresh,
    CacheSeeded,
    RecoverySeeded,
}

impl ContextMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextMode::Fresh => "fresh",
            ContextMode::CacheSeeded => "cache",
            ContextMode::RecoverySeeded => "recovery",
        }
    }
}

/// Working memory of the loop controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: String,
    pub issue: String,
    pub phase: Phase,

    /// Number of planning rounds started so far
    pub round: u32,

    pub plan: Plan,
    pub trace: ExecutionTrace,
    pub verdict: Option<ReviewVerdict>,

    /// Rejection reason waiting to be fed into the next planning round
    pub feedback: Option<String>,
}

impl WorkflowState {
    /// Initial state: PLANNING with an empty plan, empty trace and no feedback
    pub fn new(issue: impl Into<String>) -> Self {
        let plan = Plan::empty();
        let trace = ExecutionTrace::new(plan.id.clone());
        Self {
            run_id: generate_run_id(),
            issue: issue.into(),
            phase: Phase::Planning,
            round: 0,
            plan,
            trace,
            verdict: None,
            feedback: None,
        }
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(FixloopError::InvalidState(format!(
                "expected phase {}, run is in {}",
                expected.as_str(),
                self.phase.as_str()
            )))
        }
    }

    /// PLANNING -> EXECUTING with a new plan. Clears trace, verdict and feedback.
    pub fn planned(self, plan: Plan) -> Result<Self> {
        self.expect_phase(Phase::Planning)?;
        let trace = ExecutionTrace::new(plan.id.clone());
        Ok(Self {
            phase: Phase::Executing,
            round: self.round + 1,
            plan,
            trace,
            verdict: None,
            feedback: None,
            ..self
        })
    }

    /// EXECUTING -> REVIEWING with the trace for the current plan
    pub fn executed(self, trace: ExecutionTrace) -> Result<Self> {
        self.expect_phase(Phase::Executing)?;
        if trace.len() != self.plan.len() || trace.plan_id != self.plan.id {
            return Err(FixloopError::InvalidState(format!(
                "trace for plan {} ({} outcomes) does not match plan {} ({} steps)",
                trace.plan_id,
                trace.len(),
                self.plan.id,
                self.plan.len()
            )));
        }
        Ok(Self {
            phase: Phase::Reviewing,
            trace,
            ..self
        })
    }

    /// REVIEWING -> PERSISTING on Complete, REVIEWING -> PLANNING on Revise
    pub fn reviewed(self, verdict: ReviewVerdict) -> Result<Self> {
        self.expect_phase(Phase::Reviewing)?;
        let (phase, feedback) = match &verdict {
            ReviewVerdict::Complete => (Phase::Persisting, None),
            ReviewVerdict::Revise { reason } => (Phase::Planning, Some(reason.clone())),
        };
        Ok(Self {
            phase,
            feedback,
            verdict: Some(verdict),
            ..self
        })
    }

    /// Any phase -> DONE
    pub fn finished(self) -> Self {
        Self {
            phase: Phase::Done,
            ..self
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }
}
