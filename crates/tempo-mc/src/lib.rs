//! Invariant and liveness checker for precomputed state graphs.

pub mod check;
pub mod error;
pub mod eval;
pub mod fairness;
pub mod liveness;
pub mod path;
pub mod safety;

pub use check::{check, CheckConfig, CheckReport, LivenessStrategy};
pub use error::{CheckError, CheckResult};
pub use eval::{AssertRun, Engine, EvalError, EvalResult, StepOutcome};
pub use liveness::{check_fast_liveness, check_strict_liveness};
pub use safety::{check_invariants, check_simple_exists_witness};
