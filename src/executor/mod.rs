//! Plan executor
//!
//! Runs a plan's steps strictly in order against the tool registry and
//! records exactly one outcome per step. Nothing a step does can abort the
//! remaining steps, and nothing is rolled back.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::domain::{ExecutionTrace, Plan, StepOutcome};
use crate::tools::{ToolContext, ToolRegistry};

/// Outcome text for a step interrupted by cancellation
pub const CANCELLED_OUTCOME: &str = "cancelled";

/// Outcome text for steps never started because the run was cancelled
pub const SKIPPED_OUTCOME: &str = "skipped: run cancelled";

pub struct Executor {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
    step_timeout: Duration,
}

impl Executor {
    pub fn new(registry: Arc<ToolRegistry>, ctx: ToolContext, step_timeout: Duration) -> Self {
        Self {
            registry,
            ctx,
            step_timeout,
        }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Execute every step of `plan`. The returned trace always has one
    /// outcome per step.
    pub async fn execute(&self, plan: &Plan, cancel: Option<&CancellationToken>) -> ExecutionTrace {
        let mut trace = ExecutionTrace::new(plan.id.clone());
        let total = plan.len();

        for (i, step) in plan.iter().enumerate() {
            if cancel.is_some_and(|t| t.is_cancelled()) {
                trace.push(StepOutcome::Error(SKIPPED_OUTCOME.to_string()));
                continue;
            }

            info!("step {}/{}: {}", i + 1, total, step.tool_name);
            let invocation = tokio::time::timeout(
                self.step_timeout,
                self.registry.invoke(&step.tool_name, &step.parameters, &self.ctx),
            );
            let cancelled = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = cancelled => {
                    warn!("step {}/{} cancelled", i + 1, total);
                    StepOutcome::Error(CANCELLED_OUTCOME.to_string())
                }
                result = invocation => match result {
                    Ok(Ok(output)) => StepOutcome::Success(output),
                    Ok(Err(text)) => {
                        warn!("step {}/{} ({}) failed: {}", i + 1, total, step.tool_name, text);
                        StepOutcome::Error(text)
                    }
                    Err(_) => {
                        warn!("step {}/{} ({}) timed out", i + 1, total, step.tool_name);
                        StepOutcome::Error(format!(
                            "Error: step timed out after {}ms",
                            self.step_timeout.as_millis()
                        ))
                    }
                },
            };
            trace.push(outcome);
        }

        info!(
            "executed plan {}: {} steps, {} errors",
            plan.id,
            trace.len(),
            trace.error_count()
        );
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Step;
    use crate::graph::CodeGraph;
    use crate::tools::{Params, Tool, ToolError, ToolKind};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    /// Stands in for list_files but never finishes in test time
    struct StalledTool;

    #[async_trait]
    impl Tool for StalledTool {
        fn kind(&self) -> ToolKind {
            ToolKind::ListFiles
        }

        fn description(&self) -> &'static str {
            "sleeps"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _params: &Params, _ctx: &ToolContext) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("done".to_string())
        }
    }

    fn stalled_executor(dir: &TempDir, step_timeout: Duration) -> Executor {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(StalledTool));
        Executor::new(Arc::new(registry), ToolContext::new(dir.path()), step_timeout)
    }

    fn executor(dir: &TempDir) -> Executor {
        let registry = Arc::new(ToolRegistry::standard(Arc::new(CodeGraph::open_in_memory().unwrap())));
        Executor::new(registry, ToolContext::new(dir.path()), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_empty_plan_empty_trace() {
        let dir = TempDir::new().unwrap();
        let plan = Plan::empty();
        let trace = executor(&dir).execute(&plan, None).await;
        assert!(trace.is_empty());
        assert_eq!(trace.plan_id, plan.id);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_stop_plan() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let plan = Plan::new(vec![Step::new("bogus"), Step::new("list_files")]);

        let trace = executor(&dir).execute(&plan, None).await;
        assert_eq!(trace.len(), 2);
        assert!(trace.outcomes[0].is_error());
        assert!(trace.outcomes[0].text().contains("not found"));
        assert_eq!(trace.outcomes[1], StepOutcome::Success("a.txt".into()));
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let dir = TempDir::new().unwrap();
        let plan = Plan::new(vec![
            Step::new("write_file")
                .with_param("file_path", "fix.py")
                .with_param("content", "ok = True"),
            Step::new("read_file").with_param("file_path", "fix.py"),
        ]);

        let trace = executor(&dir).execute(&plan, None).await;
        assert_eq!(trace.outcomes[1], StepOutcome::Success("ok = True".into()));
    }

    #[tokio::test]
    async fn test_failures_are_recorded_per_step() {
        let dir = TempDir::new().unwrap();
        let plan = Plan::new(vec![
            Step::new("read_file").with_param("file_path", "missing.py"),
            Step::new("read_file"),
            Step::new("list_files"),
        ]);

        let trace = executor(&dir).execute(&plan, None).await;
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.error_count(), 2);
        assert_eq!(trace.outcomes[0].text(), "Error: File 'missing.py' not found.");
    }

    #[tokio::test]
    async fn test_cancelled_run_still_fills_trace() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let plan = Plan::new(vec![Step::new("list_files"), Step::new("list_files")]);

        let trace = executor(&dir).execute(&plan, Some(&token)).await;
        assert_eq!(trace.len(), 2);
        assert!(trace.outcomes.iter().all(|o| o.text() == SKIPPED_OUTCOME));
    }

    #[tokio::test]
    async fn test_cancel_during_step_interrupts_and_skips_rest() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let plan = Plan::new(vec![
            Step::new("list_files"),
            Step::new("list_files"),
            Step::new("list_files"),
        ]);

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let trace = stalled_executor(&dir, Duration::from_secs(60))
            .execute(&plan, Some(&token))
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(trace.len(), plan.len());
        assert_eq!(
            trace.outcomes,
            vec![
                StepOutcome::Error(CANCELLED_OUTCOME.to_string()),
                StepOutcome::Error(SKIPPED_OUTCOME.to_string()),
                StepOutcome::Error(SKIPPED_OUTCOME.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_step_timeout_is_recorded_and_run_continues() {
        let dir = TempDir::new().unwrap();
        let plan = Plan::new(vec![Step::new("list_files"), Step::new("bogus")]);

        let trace = stalled_executor(&dir, Duration::from_millis(10))
            .execute(&plan, None)
            .await;

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.outcomes[0].text(), "Error: step timed out after 10ms");
        assert!(trace.outcomes[0].text().contains("timed out"));
        assert!(trace.outcomes[1].text().contains("not found"));
    }
}
