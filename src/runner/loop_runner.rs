//! Loop runner: the Plan -> Execute -> Review -> (Plan | Persist) state machine.
//!
//! Each round starts from the context the current state selects (recovery
//! feedback, a cached plan, or nothing), executes the new plan in full and
//! hands plan and trace to the reviewer. A rejected round feeds its reason
//! into the next one until the round ceiling is reached.

use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::domain::{Persistence, Phase, RoundSummary, RunOutcome, RunStatus, WorkflowState};
use crate::error::Result;
use crate::executor::Executor;
use crate::planner::{PlanContext, Planner};
use crate::review::{ReviewError, Reviewer};
use crate::store::PlanCache;

/// Configuration for the LoopRunner.
#[derive(Debug, Clone)]
pub struct LoopRunnerConfig {
    /// Planning rounds allowed before the run is declared exhausted
    pub max_rounds: u32,
    /// Look up a similar cached plan for the first round
    pub cache_enabled: bool,
}

impl Default for LoopRunnerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            cache_enabled: true,
        }
    }
}

pub struct LoopRunner {
    planner: Arc<dyn Planner>,
    executor: Executor,
    reviewer: Arc<dyn Reviewer>,
    cache: Option<Arc<dyn PlanCache>>,
    config: LoopRunnerConfig,
}

impl LoopRunner {
    pub fn new(
        planner: Arc<dyn Planner>,
        executor: Executor,
        reviewer: Arc<dyn Reviewer>,
        cache: Option<Arc<dyn PlanCache>>,
        config: LoopRunnerConfig,
    ) -> Self {
        Self {
            planner,
            executor,
            reviewer,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &LoopRunnerConfig {
        &self.config
    }

    /// Run to completion without external cancellation
    pub async fn run(&self, issue: &str) -> Result<RunOutcome> {
        self.run_with_cancel(issue, &CancellationToken::new()).await
    }

    /// Run until resolved, exhausted, failed or cancelled.
    ///
    /// Errors are reserved for broken state-machine invariants; every
    /// expected failure is reported through `RunOutcome::status`.
    pub async fn run_with_cancel(&self, issue: &str, cancel: &CancellationToken) -> Result<RunOutcome> {
        let mut state = WorkflowState::new(issue);
        let mut rounds = Vec::new();
        info!("run {} started (max {} rounds)", state.run_id, self.config.max_rounds);

        loop {
            if cancel.is_cancelled() {
                return Ok(finish(state, rounds, RunStatus::Cancelled, None));
            }

            // PLANNING
            let context = self.select_context(&state).await;
            let mode = context.mode();
            info!("run {} round {}: planning ({})", state.run_id, state.round + 1, mode.as_str());
            let plan = self.planner.plan(&state.issue, &context).await;
            state = state.planned(plan)?;

            if cancel.is_cancelled() {
                return Ok(finish(state, rounds, RunStatus::Cancelled, None));
            }

            // EXECUTING
            info!(
                "run {} round {}: executing plan {} ({} steps)",
                state.run_id,
                state.round,
                state.plan.id,
                state.plan.len()
            );
            let trace = self.executor.execute(&state.plan, Some(cancel)).await;
            state = state.executed(trace)?;

            let mut summary = RoundSummary {
                round: state.round,
                plan_id: state.plan.id.clone(),
                context: mode,
                step_count: state.plan.len(),
                error_count: state.trace.error_count(),
                verdict: None,
            };

            if cancel.is_cancelled() {
                rounds.push(summary);
                return Ok(finish(state, rounds, RunStatus::Cancelled, None));
            }

            // REVIEWING
            info!("run {} round {}: reviewing", state.run_id, state.round);
            let verdict = match self.reviewer.review(&state.issue, &state.plan, &state.trace).await {
                Ok(v) => v,
                Err(ReviewError::Fatal(msg)) => {
                    warn!("run {}: reviewer failed fatally: {}", state.run_id, msg);
                    rounds.push(summary);
                    return Ok(finish(state, rounds, RunStatus::InfrastructureFailure(msg), None));
                }
            };
            summary.verdict = Some(verdict.clone());
            rounds.push(summary);
            state = state.reviewed(verdict)?;

            if state.phase == Phase::Persisting {
                let persisted = self.persist(&state).await;
                return Ok(finish(state, rounds, RunStatus::Resolved, Some(persisted)));
            }

            if state.round >= self.config.max_rounds {
                warn!(
                    "run {}: exhausted after {} rounds, last reason: {}",
                    state.run_id,
                    state.round,
                    state.feedback.as_deref().unwrap_or("-")
                );
                return Ok(finish(state, rounds, RunStatus::Exhausted, None));
            }
        }
    }

    /// Recovery when feedback is pending, else a cached plan, else fresh
    async fn select_context(&self, state: &WorkflowState) -> PlanContext {
        if let Some(reason) = &state.feedback {
            return PlanContext::RecoverySeeded {
                failed_plan: state.plan.clone(),
                trace: state.trace.clone(),
                reason: reason.clone(),
            };
        }

        let cache = match &self.cache {
            Some(cache) if self.config.cache_enabled => cache,
            _ => return PlanContext::Fresh,
        };

        match cache.find_similar(&state.issue).await {
            Ok(Some(record)) => {
                info!("cache hit: record {} ({})", record.id, record.issue);
                PlanContext::CacheSeeded(record)
            }
            Ok(None) => {
                info!("cache miss");
                PlanContext::Fresh
            }
            Err(e) => {
                warn!("plan cache lookup failed, planning fresh: {}", e);
                PlanContext::Fresh
            }
        }
    }

    async fn persist(&self, state: &WorkflowState) -> Persistence {
        let files = state.plan.touched_files();
        if state.plan.is_empty() {
            info!("run {}: empty plan, not saved", state.run_id);
            return Persistence::Skipped("empty plan".into());
        }
        if files.is_empty() {
            info!("run {}: no step referenced a file path, not saved", state.run_id);
            return Persistence::Skipped("no step referenced a file path".into());
        }
        let Some(cache) = &self.cache else {
            info!("run {}: no plan store configured, not saved", state.run_id);
            return Persistence::Skipped("no plan store configured".into());
        };

        match cache.save(&state.issue, &state.plan, &files).await {
            Ok(record) => {
                info!("run {}: plan saved as {} ({} files)", state.run_id, record.id, files.len());
                Persistence::Saved(record.id)
            }
            Err(e) => {
                warn!("run {}: failed to save plan: {}", state.run_id, e);
                Persistence::Failed(e.to_string())
            }
        }
    }
}

fn finish(state: WorkflowState, rounds: Vec<RoundSummary>, status: RunStatus, persisted: Option<Persistence>) -> RunOutcome {
    info!("run {} finished: {}", state.run_id, status);
    RunOutcome {
        status,
        state: state.finished(),
        rounds,
        persisted,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{ContextMode, ExecutionTrace, Plan, ReviewVerdict, Step};
    use crate::error::FixloopError;
    use crate::graph::CodeGraph;
    use crate::store::CachedPlanRecord;
    use crate::tools::{ToolContext, ToolRegistry};

    /// Returns a new plan with the same steps on every call
    struct StubPlanner {
        steps: Vec<Step>,
        seen: Mutex<Vec<PlanContext>>,
    }

    impl StubPlanner {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn modes(&self) -> Vec<ContextMode> {
            self.seen.lock().unwrap().iter().map(|c| c.mode()).collect()
        }
    }

    #[async_trait]
    impl Planner for StubPlanner {
        async fn plan(&self, _issue: &str, context: &PlanContext) -> Plan {
            self.seen.lock().unwrap().push(context.clone());
            Plan::new(self.steps.clone())
        }
    }

    /// Replays scripted verdicts, then keeps returning the last one
    struct ScriptedReviewer {
        script: Mutex<VecDeque<std::result::Result<ReviewVerdict, ReviewError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedReviewer {
        fn new(script: Vec<std::result::Result<ReviewVerdict, ReviewError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn always(verdict: ReviewVerdict) -> Arc<Self> {
            Self::new(vec![Ok(verdict)])
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Reviewer for ScriptedReviewer {
        async fn review(
            &self,
            _issue: &str,
            _plan: &Plan,
            _trace: &ExecutionTrace,
        ) -> std::result::Result<ReviewVerdict, ReviewError> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                match script.front().unwrap() {
                    Ok(v) => Ok(v.clone()),
                    Err(ReviewError::Fatal(m)) => Err(ReviewError::Fatal(m.clone())),
                }
            }
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        lookup: Option<CachedPlanRecord>,
        fail_lookup: bool,
        fail_save: bool,
        saved: Mutex<Vec<(String, Plan)>>,
    }

    impl MemoryCache {
        fn saved_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PlanCache for MemoryCache {
        async fn save(&self, issue: &str, plan: &Plan, files: &BTreeSet<String>) -> Result<CachedPlanRecord> {
            if self.fail_save {
                return Err(FixloopError::Store("disk full".into()));
            }
            self.saved.lock().unwrap().push((issue.to_string(), plan.clone()));
            Ok(CachedPlanRecord::new(issue, plan, files.clone()))
        }

        async fn find_similar(&self, _issue: &str) -> Result<Option<CachedPlanRecord>> {
            if self.fail_lookup {
                return Err(FixloopError::Store("store unavailable".into()));
            }
            Ok(self.lookup.clone())
        }
    }

    fn executor(dir: &TempDir) -> Executor {
        let registry = Arc::new(ToolRegistry::standard(Arc::new(CodeGraph::open_in_memory().unwrap())));
        Executor::new(registry, ToolContext::new(dir.path()), Duration::from_secs(5))
    }

    fn write_step() -> Step {
        Step::new("write_file")
            .with_param("file_path", "fix.py")
            .with_param("content", "fixed = True")
    }

    fn runner(
        dir: &TempDir,
        planner: Arc<StubPlanner>,
        reviewer: Arc<ScriptedReviewer>,
        cache: Option<Arc<MemoryCache>>,
        max_rounds: u32,
    ) -> LoopRunner {
        LoopRunner::new(
            planner,
            executor(dir),
            reviewer,
            cache.map(|c| c as Arc<dyn PlanCache>),
            LoopRunnerConfig {
                max_rounds,
                cache_enabled: true,
            },
        )
    }

    #[tokio::test]
    async fn test_complete_on_first_round() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);
        let cache = Arc::new(MemoryCache::default());

        let outcome = runner(&dir, planner.clone(), reviewer.clone(), Some(cache.clone()), 5)
            .run("crash in fix.py")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Resolved);
        assert!(outcome.state.is_done());
        assert_eq!(outcome.rounds.len(), 1);
        assert_eq!(reviewer.calls(), 1);
        assert_eq!(planner.modes(), vec![ContextMode::Fresh]);
        assert!(matches!(outcome.persisted, Some(Persistence::Saved(_))));
        assert_eq!(cache.saved_count(), 1);
        assert!(dir.path().join("fix.py").exists());
    }

    #[tokio::test]
    async fn test_revise_then_complete_persists_second_plan() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::new(vec![Ok(ReviewVerdict::revise("x")), Ok(ReviewVerdict::Complete)]);
        let cache = Arc::new(MemoryCache::default());

        let outcome = runner(&dir, planner.clone(), reviewer, Some(cache.clone()), 5)
            .run("bug")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Resolved);
        assert_eq!(outcome.rounds.len(), 2);
        assert_ne!(outcome.rounds[0].plan_id, outcome.rounds[1].plan_id);
        assert_eq!(planner.modes(), vec![ContextMode::Fresh, ContextMode::RecoverySeeded]);

        match &planner.seen.lock().unwrap()[1] {
            PlanContext::RecoverySeeded { failed_plan, trace, reason } => {
                assert_eq!(reason, "x");
                assert_eq!(failed_plan.id, outcome.rounds[0].plan_id);
                assert_eq!(trace.plan_id, failed_plan.id);
                assert_eq!(trace.len(), 1);
            }
            other => panic!("expected recovery context, got {:?}", other.mode()),
        }

        let saved = cache.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1.id, outcome.rounds[1].plan_id);
    }

    #[tokio::test]
    async fn test_list_files_only_plan_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![Step::new("list_files")]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);
        let cache = Arc::new(MemoryCache::default());

        let outcome = runner(&dir, planner, reviewer, Some(cache.clone()), 5)
            .run("bug")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Resolved);
        assert!(matches!(outcome.persisted, Some(Persistence::Skipped(_))));
        assert_eq!(cache.saved_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_plan_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);
        let cache = Arc::new(MemoryCache::default());

        let outcome = runner(&dir, planner, reviewer, Some(cache.clone()), 5)
            .run("bug")
            .await
            .unwrap();

        assert_eq!(outcome.persisted, Some(Persistence::Skipped("empty plan".into())));
        assert_eq!(cache.saved_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_rounds() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::revise("still broken"));
        let cache = Arc::new(MemoryCache::default());

        let outcome = runner(&dir, planner.clone(), reviewer.clone(), Some(cache.clone()), 3)
            .run("bug")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Exhausted);
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.rounds.len(), 3);
        assert_eq!(reviewer.calls(), 3);
        assert!(outcome.persisted.is_none());
        assert_eq!(cache.saved_count(), 0);
        assert_eq!(
            planner.modes(),
            vec![ContextMode::Fresh, ContextMode::RecoverySeeded, ContextMode::RecoverySeeded]
        );
    }

    #[tokio::test]
    async fn test_fatal_reviewer_is_infrastructure_failure() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::new(vec![Err(ReviewError::Fatal("no api key".into()))]);

        let outcome = runner(&dir, planner, reviewer, None, 5).run("bug").await.unwrap();

        assert_eq!(outcome.status, RunStatus::InfrastructureFailure("no api key".into()));
        assert_eq!(outcome.exit_code(), 3);
        assert_eq!(outcome.rounds.len(), 1);
        assert!(outcome.rounds[0].verdict.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_seeds_first_round() {
        let dir = TempDir::new().unwrap();
        let cached = Plan::new(vec![write_step()]);
        let cache = Arc::new(MemoryCache {
            lookup: Some(CachedPlanRecord::new("older bug", &cached, cached.touched_files())),
            ..Default::default()
        });
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);

        runner(&dir, planner.clone(), reviewer, Some(cache), 5)
            .run("bug")
            .await
            .unwrap();

        assert_eq!(planner.modes(), vec![ContextMode::CacheSeeded]);
    }

    #[tokio::test]
    async fn test_cache_disabled_skips_lookup_but_still_saves() {
        let dir = TempDir::new().unwrap();
        let cached = Plan::new(vec![write_step()]);
        let cache = Arc::new(MemoryCache {
            lookup: Some(CachedPlanRecord::new("older bug", &cached, cached.touched_files())),
            ..Default::default()
        });
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);
        let runner = LoopRunner::new(
            planner.clone(),
            executor(&dir),
            reviewer,
            Some(cache.clone() as Arc<dyn PlanCache>),
            LoopRunnerConfig {
                max_rounds: 5,
                cache_enabled: false,
            },
        );

        runner.run("bug").await.unwrap();
        assert_eq!(planner.modes(), vec![ContextMode::Fresh]);
        assert_eq!(cache.saved_count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_fresh() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(MemoryCache {
            fail_lookup: true,
            ..Default::default()
        });
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);

        let outcome = runner(&dir, planner.clone(), reviewer, Some(cache), 5)
            .run("bug")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Resolved);
        assert_eq!(planner.modes(), vec![ContextMode::Fresh]);
    }

    #[tokio::test]
    async fn test_save_failure_still_resolves() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(MemoryCache {
            fail_save: true,
            ..Default::default()
        });
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);

        let outcome = runner(&dir, planner, reviewer, Some(cache), 5)
            .run("bug")
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Resolved);
        assert!(matches!(outcome.persisted, Some(Persistence::Failed(ref e)) if e.contains("disk full")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![write_step()]);
        let reviewer = ScriptedReviewer::always(ReviewVerdict::Complete);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = runner(&dir, planner.clone(), reviewer.clone(), None, 5)
            .run_with_cancel("bug", &token)
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert_eq!(outcome.exit_code(), 130);
        assert!(outcome.rounds.is_empty());
        assert!(planner.modes().is_empty());
        assert_eq!(reviewer.calls(), 0);
    }

    #[tokio::test]
    async fn test_trace_matches_plan_each_round() {
        let dir = TempDir::new().unwrap();
        let planner = StubPlanner::new(vec![Step::new("bogus"), Step::new("list_files"), write_step()]);
        let reviewer = ScriptedReviewer::new(vec![Ok(ReviewVerdict::revise("again")), Ok(ReviewVerdict::Complete)]);

        let outcome = runner(&dir, planner, reviewer, None, 5).run("bug").await.unwrap();

        for round in &outcome.rounds {
            assert_eq!(round.step_count, 3);
            assert_eq!(round.error_count, 1);
        }
        assert_eq!(outcome.state.trace.len(), outcome.state.plan.len());
        assert_eq!(outcome.persisted, Some(Persistence::Skipped("no plan store configured".into())));
    }
}
