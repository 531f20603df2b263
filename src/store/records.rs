//! Cached plan record persisted by the PlanStore.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Plan, Step};
use crate::id::{generate_record_id, now_ms};

/// One successful (issue, plan, touched files) triple.
///
/// Records are append-only: created once when a run completes and never
/// updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPlanRecord {
    /// "rec-<ms>-<hex>"
    pub id: String,

    /// Issue text the plan resolved
    pub issue: String,

    /// Steps in execution order
    pub plan: Vec<Step>,

    /// Distinct file paths the plan referenced
    pub touched_files: BTreeSet<String>,

    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl CachedPlanRecord {
    pub fn new(issue: impl Into<String>, plan: &Plan, touched_files: BTreeSet<String>) -> Self {
        Self {
            id: generate_record_id(),
            issue: issue.into(),
            plan: plan.steps.clone(),
            touched_files,
            created_at: now_ms(),
        }
    }

    /// Rebuild a Plan from the stored steps. The plan gets a fresh id.
    pub fn to_plan(&self) -> Plan {
        Plan::new(self.plan.clone())
    }

    /// Stored steps as pretty JSON
    pub fn steps_json(&self) -> String {
        serde_json::to_string_pretty(&self.plan).unwrap_or_else(|_| "[]".to_string())
    }

    /// Creation time (UTC) for listings
    pub fn created_at_display(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.created_at.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CachedPlanRecord {
        let plan = Plan::new(vec![
            Step::new("read_file").with_param("file_path", "app.py"),
            Step::new("write_file")
                .with_param("file_path", "app.py")
                .with_param("content", "fixed"),
        ]);
        let files = plan.touched_files();
        CachedPlanRecord::new("TypeError in app.py", &plan, files)
    }

    #[test]
    fn test_new_record() {
        let rec = sample();
        assert!(rec.id.starts_with("rec-"));
        assert_eq!(rec.plan.len(), 2);
        assert_eq!(rec.touched_files.len(), 1);
        assert!(rec.created_at > 0);
    }

    #[test]
    fn test_json_line_round_trip() {
        let rec = sample();
        let line = serde_json::to_string(&rec).unwrap();
        assert!(!line.contains('\n'));
        let back: CachedPlanRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_to_plan_gets_new_id() {
        let rec = sample();
        let a = rec.to_plan();
        let b = rec.to_plan();
        assert_eq!(a.steps, rec.plan);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_created_at_display() {
        let mut rec = sample();
        rec.created_at = 0;
        assert_eq!(rec.created_at_display(), "1970-01-01 00:00:00");
    }
}
