//! Execution trace types
//!
//! An ExecutionTrace holds one outcome per plan step, index-aligned with the
//! plan that produced it.

use serde::{Deserialize, Serialize};

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "output", rename_all = "snake_case")]
pub enum StepOutcome {
    Success(String),
    Error(String),
}

impl StepOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, StepOutcome::Error(_))
    }

    /// Output text regardless of status
    pub fn text(&self) -> &str {
        match self {
            StepOutcome::Success(s) | StepOutcome::Error(s) => s,
        }
    }
}

/// Ordered per-step outcomes for one plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Id of the plan this trace belongs to
    pub plan_id: String,

    pub outcomes: Vec<StepOutcome>,
}

impl ExecutionTrace {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_error()).count()
    }

    /// All outputs joined by newlines, in step order
    pub fn joined_output(&self) -> String {
        self.outcomes
            .iter()
            .map(StepOutcome::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
