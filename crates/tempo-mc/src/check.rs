//! Top-level dispatch: run the safety pass, the existential scan, and the
//! selected liveness strategy, collecting all verdicts into one report.

use crate::error::CheckResult;
use crate::eval::Engine;
use crate::liveness::{check_fast_liveness, check_strict_liveness};
use crate::safety::{check_invariants, check_simple_exists_witness};
use std::collections::BTreeMap;
use tempo_graph::{InvariantPosition, Link, NodeId, Spec, StateGraph};
use tracing::info;

/// Which liveness algorithm a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessStrategy {
    /// Forward DFS with per-cycle fairness analysis.
    Strict,
    /// Backward fixpoint over strongly-fair edges.
    Fast,
}

/// Configuration for a full check.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Whether to evaluate safety and eventual/existential predicates at
    /// every node. This pass also records the witness bits liveness
    /// checking reads; skipping it makes every eventual claim look
    /// unwitnessed.
    pub check_safety: bool,
    /// Whether to scan for never-witnessed `exists` invariants.
    pub check_exists: bool,
    /// Liveness strategy, or `None` to skip liveness entirely.
    pub liveness: Option<LivenessStrategy>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_safety: true,
            check_exists: true,
            liveness: Some(LivenessStrategy::Strict),
        }
    }
}

/// All verdicts of one run. Violations are values, not errors.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Per file index, the invariant indices violated as safety predicates.
    pub safety_violations: BTreeMap<usize, Vec<usize>>,
    /// Existential invariants no reachable state witnessed.
    pub unwitnessed_exists: Vec<InvariantPosition>,
    /// The first liveness violation in source order, with its
    /// counterexample lasso.
    pub liveness_violation: Option<(Vec<Link>, InvariantPosition)>,
}

impl CheckReport {
    /// True when every invariant passed.
    pub fn passed(&self) -> bool {
        self.safety_violations.values().all(|v| v.is_empty())
            && self.unwitnessed_exists.is_empty()
            && self.liveness_violation.is_none()
    }
}

/// Check every invariant of `spec` against `graph`. The graph is mutated
/// only through its monotonic witness bits.
pub fn check<E: Engine>(
    graph: &mut StateGraph,
    spec: &Spec,
    engine: &E,
    config: &CheckConfig,
) -> CheckResult<CheckReport> {
    if graph.is_empty() {
        return Ok(CheckReport::default());
    }

    let safety_violations = if config.check_safety {
        check_invariants(graph, spec, engine)?
    } else {
        BTreeMap::new()
    };

    let unwitnessed_exists = if config.check_exists {
        let nodes: Vec<NodeId> = graph.ids().collect();
        check_simple_exists_witness(graph, spec, &nodes)?
    } else {
        Vec::new()
    };

    let root = graph.root();
    let liveness_violation = match config.liveness {
        Some(LivenessStrategy::Strict) => check_strict_liveness(graph, spec, root)?,
        Some(LivenessStrategy::Fast) => check_fast_liveness(graph, spec)?,
        None => None,
    };

    let report = CheckReport {
        safety_violations,
        unwitnessed_exists,
        liveness_violation,
    };
    info!(passed = report.passed(), "check complete");
    Ok(report)
}
