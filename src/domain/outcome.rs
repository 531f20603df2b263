//! Run outcome types.
//!
//! This module defines what a finished run reports back to the caller.

use serde::{Deserialize, Serialize};

use super::{ContextMode, ReviewVerdict, WorkflowState};

/// Exit code for a resolved issue
pub const EXIT_RESOLVED: i32 = 0;
/// Exit code for unexpected errors outside the loop
pub const EXIT_ERROR: i32 = 1;
/// Exit code when the retry budget ran out
pub const EXIT_EXHAUSTED: i32 = 2;
/// Exit code when the reviewer or another collaborator failed fatally
pub const EXIT_INFRASTRUCTURE: i32 = 3;
/// Exit code after a cancellation (SIGINT convention)
pub const EXIT_CANCELLED: i32 = 130;

/// Terminal status of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RunStatus {
    /// Reviewer accepted a plan
    Resolved,
    /// Every round was rejected
    Exhausted,
    /// A collaborator failed in a way retries cannot fix
    InfrastructureFailure(String),
    /// Cancelled between nodes
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Resolved => EXIT_RESOLVED,
            RunStatus::Exhausted => EXIT_EXHAUSTED,
            RunStatus::InfrastructureFailure(_) => EXIT_INFRASTRUCTURE,
            RunStatus::Cancelled => EXIT_CANCELLED,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, RunStatus::Resolved)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Resolved => write!(f, "resolved"),
            RunStatus::Exhausted => write!(f, "exhausted"),
            RunStatus::InfrastructureFailure(msg) => write!(f, "infrastructure failure: {}", msg),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What happened when a completed plan reached persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum Persistence {
    /// Stored under this record id
    Saved(String),
    /// Not stored (empty plan or no file-touching step)
    Skipped(String),
    /// Store rejected the write; the run still counts as resolved
    Failed(String),
}

/// Summary of one planning/execution/review round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub plan_id: String,
    pub context: ContextMode,
    pub step_count: usize,
    pub error_count: usize,
    pub verdict: Option<ReviewVerdict>,
}

/// Everything a caller needs once the loop has stopped
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub state: WorkflowState,
    pub rounds: Vec<RoundSummary>,
    pub persisted: Option<Persistence>,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Plain-text report for the console
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Run {}: {}\n", self.state.run_id, self.status));
        for r in &self.rounds {
            let verdict = match &r.verdict {
                Some(v) => v.to_string(),
                None => "-".to_string(),
            };
            out.push_str(&format!(
                "  round {} [{}] plan {} steps={} errors={} verdict={}\n",
                r.round,
                r.context.as_str(),
                r.plan_id,
                r.step_count,
                r.error_count,
                verdict
            ));
        }
        match &self.persisted {
            Some(Persistence::Saved(id)) => out.push_str(&format!("  plan saved as {}\n", id)),
            Some(Persistence::Skipped(why)) => out.push_str(&format!("  plan not saved: {}\n", why)),
            Some(Persistence::Failed(err)) => out.push_str(&format!("  plan save failed: {}\n", err)),
            None => {}
        }
        out.push_str("\nFinal plan:\n");
        out.push_str(&self.state.plan.steps_json());
        out.push_str("\n\nStep outputs:\n");
        out.push_str(&self.state.trace.joined_output());
        out.push('\n');
        out
    }
}
