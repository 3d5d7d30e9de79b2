// [libs/domain/pipeline/src/errors.rs]
use flowmap_core_addr::AddrError;
use flowmap_infra_store::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Addr(#[from] AddrError),

    #[error(transparent)]
    Store(#[from] DbError),

    /// A rule evaluator rejected or failed on the batch's job. Unlike a
    /// hook failure, this aborts and rolls back the batch.
    #[error("rule evaluation failed: {0}")]
    RuleEvaluation(String),

    /// Invariant violated by the data itself rather than by I/O — e.g. a
    /// staging row with `links = 0`, which would divide by zero in the
    /// merge's weighted mean.
    #[error("pipeline invariant violated: {0}")]
    InvariantViolation(String),
}
