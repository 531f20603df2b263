//! Review verdict

use serde::{Deserialize, Serialize};

const DEFAULT_REVISE_REASON: &str = "reviewer requested revision without a reason";

/// Reviewer's judgment of one plan + trace
///
/// Build `Revise` through [`ReviewVerdict::revise`]; deserialization goes
/// through it too, so a decoded reason is never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case", from = "WireVerdict")]
pub enum ReviewVerdict {
    Complete,
    Revise { reason: String },
}

#[derive(Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
enum WireVerdict {
    Complete,
    Revise {
        #[serde(default)]
        reason: String,
    },
}

impl From<WireVerdict> for ReviewVerdict {
    fn from(wire: WireVerdict) -> Self {
        match wire {
            WireVerdict::Complete => ReviewVerdict::Complete,
            WireVerdict::Revise { reason } => ReviewVerdict::revise(reason),
        }
    }
}

impl ReviewVerdict {
    /// Build a Revise verdict. An empty reason is replaced so the reason is
    /// never blank.
    pub fn revise(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let trimmed = reason.trim();
        let reason = if trimmed.is_empty() {
            DEFAULT_REVISE_REASON.to_string()
        } else {
            trimmed.to_string()
        };
        ReviewVerdict::Revise { reason }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ReviewVerdict::Complete)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ReviewVerdict::Complete => None,
            ReviewVerdict::Revise { reason } => Some(reason),
        }
    }
}

impl std::fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewVerdict::Complete => write!(f, "COMPLETE"),
            ReviewVerdict::Revise { reason } => write!(f, "REVISE: {}", reason),
        }
    }
}
