// [libs/domain/pipeline/src/dispatch.rs]
//!
//! Runs after the roll-up succeeds and before staging is swept. Rule
//! submission is synchronous and propagates errors into the surrounding
//! transaction; import hooks are best-effort and never abort the batch.

use crate::errors::PipelineError;
use async_trait::async_trait;
use tracing::{error, instrument, warn};

/// One batch's worth of work handed to the external rule evaluator: the
/// subscription/datasource it ran for and the time window it covered.
#[derive(Debug, Clone)]
pub struct RuleJob {
    pub subscription: String,
    pub datasource: String,
    pub t_start: i64,
    pub t_end: i64,
}

/// The collaborator that turns a completed batch into security-rule
/// matches. Modelled as an injected trait object — the original tool
/// called a process-global queue, which made the pipeline untestable in
/// isolation.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    async fn submit(&self, job: RuleJob) -> Result<(), String>;
}

/// A no-op evaluator for pipelines run with rule evaluation disabled, or
/// for tests that don't care about rule dispatch.
pub struct NoopRuleEvaluator;

#[async_trait]
impl RuleEvaluator for NoopRuleEvaluator {
    async fn submit(&self, _job: RuleJob) -> Result<(), String> {
        Ok(())
    }
}

/// A side-effect run against the batch after commit-path work is done.
/// Unlike [`RuleEvaluator::submit`], a failing hook is logged and
/// skipped — it never aborts the batch.
#[async_trait]
pub trait ImportHook: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, subscription: &str, datasource: &str) -> Result<(), String>;
}

/// An explicitly constructed, ordered list of import hooks, passed to the
/// pipeline rather than discovered through a process-global registry.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn ImportHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn ImportHook>) {
        self.hooks.push(hook);
    }

    #[instrument(skip(self))]
    pub async fn run_all(&self, subscription: &str, datasource: &str) {
        for hook in &self.hooks {
            if let Err(err) = hook.run(subscription, datasource).await {
                warn!(hook = hook.name(), %err, "import hook failed, continuing batch");
            }
        }
    }
}

/// Submits the rule job if `enabled`, then runs every registered import
/// hook. Returns an error only if rule submission fails — hook failures
/// are logged internally and never surface here.
#[instrument(skip(evaluator, hooks))]
pub async fn dispatch(
    evaluator: &dyn RuleEvaluator,
    hooks: &HookRegistry,
    enabled: bool,
    job: RuleJob,
) -> Result<(), PipelineError> {
    if enabled {
        evaluator
            .submit(job.clone())
            .await
            .map_err(PipelineError::RuleEvaluation)?;
    }
    hooks.run_all(&job.subscription, &job.datasource).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingHook;

    #[async_trait]
    impl ImportHook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }
        async fn run(&self, _sub: &str, _ds: &str) -> Result<(), String> {
            Err("boom".to_string())
        }
    }

    struct FailingEvaluator;

    #[async_trait]
    impl RuleEvaluator for FailingEvaluator {
        async fn submit(&self, _job: RuleJob) -> Result<(), String> {
            Err("rule engine unreachable".to_string())
        }
    }

    fn job() -> RuleJob {
        RuleJob { subscription: "7".into(), datasource: "3".into(), t_start: 1, t_end: 2 }
    }

    #[tokio::test]
    async fn hook_failure_does_not_abort_dispatch() {
        let mut hooks = HookRegistry::new();
        hooks.register(Box::new(FailingHook));
        let result = dispatch(&NoopRuleEvaluator, &hooks, true, job()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rule_evaluation_failure_aborts_dispatch() {
        let hooks = HookRegistry::new();
        let result = dispatch(&FailingEvaluator, &hooks, true, job()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn disabled_evaluation_skips_submission_entirely() {
        let hooks = HookRegistry::new();
        let result = dispatch(&FailingEvaluator, &hooks, false, job()).await;
        assert!(result.is_ok());
    }
}
