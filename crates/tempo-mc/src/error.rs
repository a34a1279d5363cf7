//! Checker errors.

use crate::eval::EvalError;
use tempo_graph::NodeId;
use thiserror::Error;

/// Fatal checker error. Violated invariants are ordinary return values;
/// these variants abort the run.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("invariant checking supports a single file, got {0}")]
    MultipleFiles(usize),

    #[error("deadlock: node {node} ('{name}') has no outbound links")]
    Deadlock { node: NodeId, name: String },

    #[error("assertions must be deterministic: '{name}' forked")]
    NondeterministicAssertion { name: String },

    #[error("no cycle found in a set known to contain one")]
    CycleNotFound,

    #[error("unsupported invariant shape: {0}")]
    UnsupportedInvariant(String),
}

pub type CheckResult<T> = Result<T, CheckError>;
