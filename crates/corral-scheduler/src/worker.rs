//! Evaluation worker: runs one evaluation under a deadline.
//!
//! Each call builds a fresh `EvalContext` (empty plan, empty eligibility
//! cache), registers the job, and runs the caller's scheduling pass on the
//! blocking pool, since durable-state reads block. If the deadline passes,
//! the evaluation is abandoned: its context and plan are dropped and the
//! caller gets `DeadlineExceeded`.

use std::time::Duration;

use tracing::{Instrument, info, info_span, warn};

use corral_core::{AttributeRegistry, CorralConfig};
use corral_state::{AllocationSource, Job};

use crate::context::EvalContext;
use crate::eligibility::EvalEligibility;
use crate::error::{EvalError, EvalResult};
use crate::escape::EscapeAnalyzer;
use crate::plan::Plan;

/// Runs evaluations against a shared durable state handle.
#[derive(Clone)]
pub struct EvalWorker<S> {
    state: S,
    registry: AttributeRegistry,
    timeout: Duration,
}

impl<S> EvalWorker<S>
where
    S: AllocationSource + Clone + Send + 'static,
{
    pub fn new(state: S, config: &CorralConfig) -> Self {
        Self {
            state,
            registry: config.attributes.clone(),
            timeout: config.worker.eval_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate `job` with `pass`, returning its output and the finished plan.
    ///
    /// Storage errors from `pass` are returned unchanged; nothing is retried.
    pub async fn run<F, T>(&self, eval_id: &str, job: Job, pass: F) -> EvalResult<(T, Plan)>
    where
        F: FnOnce(&mut EvalContext<S>) -> EvalResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let span = info_span!("eval", %eval_id, job_id = %job.id);
        let state = self.state.clone();
        let registry = self.registry.clone();
        let plan = Plan::new(eval_id);
        let ctx_span = span.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let eligibility = EvalEligibility::with_analyzer(EscapeAnalyzer::new(registry));
            let mut ctx = EvalContext::new(state, plan, ctx_span).with_eligibility(eligibility);
            ctx.eligibility_mut().set_job(&job);
            let output = pass(&mut ctx)?;
            Ok((output, ctx.into_plan()))
        });

        let timeout = self.timeout;
        async move {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(result)) => {
                    if result.is_ok() {
                        info!("evaluation complete");
                    }
                    result
                }
                Ok(Err(join_err)) => {
                    warn!(error = %join_err, "evaluation aborted");
                    Err(EvalError::Aborted {
                        eval_id: eval_id.to_string(),
                        reason: join_err.to_string(),
                    })
                }
                Err(_) => {
                    warn!(?timeout, "evaluation deadline exceeded, discarding context");
                    Err(EvalError::DeadlineExceeded {
                        eval_id: eval_id.to_string(),
                        timeout,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use corral_state::{
        Allocation, Constraint, DesiredStatus, StateError, StateResult, StateStore, TaskGroup,
    };

    use crate::context::tests::{alloc, init_tracing};

    fn job(constraints: Vec<Constraint>) -> Job {
        Job {
            id: "job-1".to_string(),
            name: "web".to_string(),
            priority: 50,
            datacenters: vec!["dc1".to_string()],
            constraints,
            task_groups: vec![TaskGroup {
                name: "web".to_string(),
                count: 1,
                constraints: Vec::new(),
                tasks: Vec::new(),
            }],
        }
    }

    fn worker(state: StateStore, timeout_ms: u64) -> EvalWorker<StateStore> {
        let mut config = CorralConfig::default();
        config.worker.eval_timeout_ms = timeout_ms;
        EvalWorker::new(state, &config)
    }

    #[derive(Clone)]
    struct DownStore;

    impl AllocationSource for DownStore {
        fn allocs_by_node(&self, _node_id: &str) -> StateResult<Vec<Allocation>> {
            Err(StateError::Unavailable("disk detached".to_string()))
        }
    }

    #[tokio::test]
    async fn returns_output_and_plan() {
        init_tracing();
        let state = StateStore::open_in_memory().unwrap();
        let existing = alloc("a1", "node-0", 1024, 1024);
        state.upsert_allocs(std::slice::from_ref(&existing)).unwrap();

        let w = worker(state, 5_000);
        let (proposed, plan) = w
            .run("eval-1", job(Vec::new()), move |ctx| {
                ctx.plan_mut().append_update(&existing, DesiredStatus::Evict);
                ctx.plan_mut().append_alloc(alloc("a2", "node-0", 512, 512));
                ctx.proposed_allocs("node-0")
            })
            .await
            .unwrap();

        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0].id, "a2");
        assert_eq!(plan.eval_id, "eval-1");
        assert_eq!(plan.updates_for("node-0").len(), 1);
    }

    #[tokio::test]
    async fn registers_job_before_the_pass() {
        init_tracing();
        let state = StateStore::open_in_memory().unwrap();
        let w = worker(state, 5_000);

        let escaping = vec![Constraint::new("${attr.unique.hostname}", "=", "a")];
        let (escaped, _plan) = w
            .run("eval-1", job(escaping), |ctx| Ok(ctx.eligibility().has_escaped()))
            .await
            .unwrap();
        assert!(escaped);
    }

    #[tokio::test]
    async fn each_evaluation_starts_fresh() {
        init_tracing();
        let state = StateStore::open_in_memory().unwrap();
        let w = worker(state, 5_000);

        let (_, first) = w
            .run("eval-1", job(Vec::new()), |ctx| {
                ctx.plan_mut().append_alloc(alloc("a1", "node-0", 1, 1));
                Ok(())
            })
            .await
            .unwrap();
        let (proposed, second) = w
            .run("eval-2", job(Vec::new()), |ctx| ctx.proposed_allocs("node-0"))
            .await
            .unwrap();

        assert!(!first.is_noop());
        assert!(second.is_noop());
        assert!(proposed.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_is_surfaced() {
        init_tracing();
        let w = EvalWorker::new(DownStore, &CorralConfig::default());
        let err = w
            .run("eval-1", job(Vec::new()), |ctx| ctx.proposed_allocs("node-0"))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Storage(StateError::Unavailable(_))));
    }

    #[tokio::test]
    async fn deadline_discards_the_evaluation() {
        init_tracing();
        let state = StateStore::open_in_memory().unwrap();
        let w = worker(state, 20);
        assert_eq!(w.timeout(), Duration::from_millis(20));

        let err = w
            .run("eval-slow", job(Vec::new()), |_ctx| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::DeadlineExceeded { ref eval_id, .. } if eval_id == "eval-slow"
        ));
    }

    #[tokio::test]
    async fn panicking_pass_is_reported_as_aborted() {
        init_tracing();
        let state = StateStore::open_in_memory().unwrap();
        let w = worker(state, 5_000);

        let err = w
            .run("eval-1", job(Vec::new()), |_ctx| -> EvalResult<()> {
                panic!("scheduler bug")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Aborted { .. }));
    }
}
