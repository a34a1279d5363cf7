//! Evaluator capabilities supplied by the execution engine.
//!
//! The checker never interprets program state itself. Predicate evaluation
//! and assertion execution are delegated through [`Engine`], keyed by the
//! opaque [`SnapshotId`] each node carries.

use tempo_graph::SnapshotId;
use thiserror::Error;

/// Error from the predicate evaluator or the assert-stepper. Always fatal
/// to the check that triggered it; the checker never masks evaluation
/// failures.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("predicate evaluation failed: {0}")]
    Predicate(String),

    #[error("assertion execution failed: {0}")]
    Assertion(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Result of one step of an assert-thread.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    /// Forked processes produced by the step. Any non-zero count means the
    /// assertion body is non-deterministic.
    pub forks: usize,
    /// Live thread count after the step.
    pub live_threads: usize,
}

/// A running assertion: a cloned process with a fresh assert-thread
/// stacked on top.
pub trait AssertRun {
    /// Thread count before the assert-thread was pushed.
    fn baseline_threads(&self) -> usize;

    /// Execute one step of the assert-thread.
    fn step(&mut self) -> EvalResult<StepOutcome>;

    /// Truth value of the return slot with the given name.
    fn verdict(&self, name: &str) -> EvalResult<bool>;
}

/// Execution-engine capabilities the checker depends on.
pub trait Engine {
    type Assert: AssertRun;

    /// Truth value of `expr` at the given snapshot. The bindings visible to
    /// the expression must include the heap plus a `__returns__` table
    /// keyed by role and invariant name.
    fn eval_predicate(&self, file: &str, expr: &str, snapshot: SnapshotId) -> EvalResult<bool>;

    /// Clone the snapshot and stack a fresh assert-thread named
    /// `thread_name` with its program counter set to `pc`.
    fn begin_assertion(
        &self,
        snapshot: SnapshotId,
        pc: &str,
        thread_name: &str,
    ) -> EvalResult<Self::Assert>;
}
