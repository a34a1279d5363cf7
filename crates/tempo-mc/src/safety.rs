//! Per-state safety checking and existential witness collection.

use crate::error::{CheckError, CheckResult};
use crate::eval::{AssertRun, Engine};
use std::collections::BTreeMap;
use tempo_graph::{
    Invariant, InvariantKind, InvariantPosition, NodeId, Spec, StateGraph, TemporalOp,
};
use tracing::debug;

pub(crate) fn ensure_single_file(spec: &Spec) -> CheckResult<()> {
    if spec.files.len() > 1 {
        return Err(CheckError::MultipleFiles(spec.files.len()));
    }
    Ok(())
}

/// Evaluate every invariant at every node. Eventual and existential forms
/// that hold set the node's witness bit; safety forms that fail are
/// collected as per-file lists of violated invariant indices.
pub fn check_invariants<E: Engine>(
    graph: &mut StateGraph,
    spec: &Spec,
    engine: &E,
) -> CheckResult<BTreeMap<usize, Vec<usize>>> {
    ensure_single_file(spec)?;
    let mut results: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for file_index in 0..spec.files.len() {
        results.insert(file_index, Vec::new());
    }

    let ids: Vec<NodeId> = graph.ids().collect();
    for id in ids {
        for (i, file) in spec.files.iter().enumerate() {
            for (j, invariant) in file.invariants.iter().enumerate() {
                let (passed, eventual) = match &invariant.kind {
                    InvariantKind::Flat(flat) => (
                        check_invariant(graph, engine, &file.name, invariant, id)?,
                        flat.eventually,
                    ),
                    InvariantKind::Block { operators } => (
                        check_assertion(graph, engine, invariant, id, j)?,
                        operators.contains(&TemporalOp::Eventually)
                            || operators.contains(&TemporalOp::Exists),
                    ),
                };
                if eventual && passed {
                    graph.node_mut(id).witness.set(i, j);
                } else if !eventual && !passed {
                    let violated = results.entry(i).or_default();
                    if !violated.contains(&j) {
                        debug!(invariant = %invariant.name, node = %id, "safety violation");
                        violated.push(j);
                    }
                }
            }
        }
    }
    Ok(results)
}

/// Evaluate a flat invariant's predicate at one node. Valid only for the
/// pure always shape or the eventually-always shape encoded by nesting.
pub fn check_invariant<E: Engine>(
    graph: &StateGraph,
    engine: &E,
    file_name: &str,
    invariant: &Invariant,
    node: NodeId,
) -> CheckResult<bool> {
    let InvariantKind::Flat(flat) = &invariant.kind else {
        return Err(CheckError::UnsupportedInvariant(format!(
            "'{}' is a block invariant",
            invariant.name
        )));
    };
    let eventually_always = flat.eventually && flat.nested.as_ref().is_some_and(|n| n.always);
    if !flat.always && !eventually_always {
        return Err(CheckError::UnsupportedInvariant(format!(
            "'{}' is neither always nor eventually-always",
            invariant.name
        )));
    }
    if !eventually_always && flat.nested.is_some() {
        return Err(CheckError::UnsupportedInvariant(format!(
            "'{}' nests below an operator other than eventually",
            invariant.name
        )));
    }
    let expr = match &flat.nested {
        Some(nested) if eventually_always => &nested.expr,
        _ => &flat.expr,
    };
    let snapshot = graph.node(node).snapshot;
    Ok(engine.eval_predicate(file_name, expr, snapshot)?)
}

/// Run a block-form assertion at one node by driving a fresh assert-thread
/// to completion. The body must be deterministic; a fork is fatal.
pub fn check_assertion<E: Engine>(
    graph: &StateGraph,
    engine: &E,
    invariant: &Invariant,
    node: NodeId,
    index: usize,
) -> CheckResult<bool> {
    let InvariantKind::Block { operators } = &invariant.kind else {
        return Err(CheckError::UnsupportedInvariant(format!(
            "'{}' is a flat invariant",
            invariant.name
        )));
    };
    if !operators.contains(&TemporalOp::Always) && !operators.contains(&TemporalOp::Exists) {
        return Err(CheckError::UnsupportedInvariant(format!(
            "'{}' uses operators {:?} outside always/eventually/exists",
            invariant.name, operators
        )));
    }

    let snapshot = graph.node(node).snapshot;
    let pc = format!("Invariants[{index}]");
    let mut run = engine.begin_assertion(snapshot, &pc, &invariant.name)?;
    let baseline = run.baseline_threads();
    loop {
        let outcome = run.step()?;
        if outcome.live_threads <= baseline {
            return Ok(run.verdict(&invariant.name)?);
        }
        if outcome.forks > 0 {
            return Err(CheckError::NondeterministicAssertion {
                name: invariant.name.clone(),
            });
        }
    }
}

/// Scan `nodes` for block-form `exists` invariants; an invariant whose
/// witness bit is set at any node in the set is satisfied. Returns the
/// positions that no scanned node witnessed.
pub fn check_simple_exists_witness(
    graph: &StateGraph,
    spec: &Spec,
    nodes: &[NodeId],
) -> CheckResult<Vec<InvariantPosition>> {
    ensure_single_file(spec)?;
    let mut unsatisfied: Vec<InvariantPosition> = Vec::new();
    for (i, file) in spec.files.iter().enumerate() {
        for (j, invariant) in file.invariants.iter().enumerate() {
            if let InvariantKind::Block { operators } = &invariant.kind {
                if operators.contains(&TemporalOp::Exists) {
                    unsatisfied.push(InvariantPosition::new(i, j));
                }
            }
        }
    }
    for &id in nodes {
        if unsatisfied.is_empty() {
            break;
        }
        let witness = &graph.node(id).witness;
        unsatisfied.retain(|pos| !witness.get(pos.file, pos.invariant));
    }
    Ok(unsatisfied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalError, EvalResult, StepOutcome};
    use std::collections::{HashMap, HashSet};
    use tempo_graph::{Fairness, Node, SnapshotId};

    /// Table-driven engine fake: predicate truth per (expr, snapshot) and
    /// scripted assertion verdicts per (invariant name, snapshot).
    #[derive(Default)]
    struct TableEngine {
        predicates: HashMap<(String, u32), bool>,
        assertions: HashMap<(String, u32), bool>,
        forking: HashSet<String>,
    }

    impl TableEngine {
        fn predicate(&mut self, expr: &str, snapshot: u32, value: bool) {
            self.predicates.insert((expr.to_string(), snapshot), value);
        }

        fn assertion(&mut self, name: &str, snapshot: u32, value: bool) {
            self.assertions.insert((name.to_string(), snapshot), value);
        }
    }

    struct ScriptedAssert {
        name: String,
        verdict: bool,
        forks: bool,
    }

    impl AssertRun for ScriptedAssert {
        fn baseline_threads(&self) -> usize {
            1
        }

        fn step(&mut self) -> EvalResult<StepOutcome> {
            if self.forks {
                Ok(StepOutcome {
                    forks: 1,
                    live_threads: 2,
                })
            } else {
                Ok(StepOutcome {
                    forks: 0,
                    live_threads: 1,
                })
            }
        }

        fn verdict(&self, name: &str) -> EvalResult<bool> {
            if name == self.name {
                Ok(self.verdict)
            } else {
                Err(EvalError::Assertion(format!("no return slot '{name}'")))
            }
        }
    }

    impl Engine for TableEngine {
        type Assert = ScriptedAssert;

        fn eval_predicate(&self, _file: &str, expr: &str, snapshot: SnapshotId) -> EvalResult<bool> {
            self.predicates
                .get(&(expr.to_string(), snapshot.0))
                .copied()
                .ok_or_else(|| EvalError::Predicate(format!("unknown predicate '{expr}'")))
        }

        fn begin_assertion(
            &self,
            snapshot: SnapshotId,
            _pc: &str,
            thread_name: &str,
        ) -> EvalResult<Self::Assert> {
            let verdict = self
                .assertions
                .get(&(thread_name.to_string(), snapshot.0))
                .copied()
                .unwrap_or(false);
            Ok(ScriptedAssert {
                name: thread_name.to_string(),
                verdict,
                forks: self.forking.contains(thread_name),
            })
        }
    }

    fn chain_graph(len: u32) -> StateGraph {
        let mut g = StateGraph::new();
        let first = g.add_node(Node::new("init", SnapshotId(0)));
        let mut prev = first;
        for i in 1..len {
            let next = g.add_node(Node::new("yield", SnapshotId(i)));
            g.add_link(prev, next, &format!("step-{i}"), Fairness::None);
            prev = next;
        }
        g.add_link(prev, prev, "spin", Fairness::None);
        g
    }

    #[test]
    fn test_safety_violation_reported_once() {
        let mut g = chain_graph(10);
        let spec = Spec::single_file("main.spec", vec![Invariant::always("Small", "x < 7")]);
        let mut engine = TableEngine::default();
        for i in 0..10 {
            engine.predicate("x < 7", i, i != 7);
        }

        let results = check_invariants(&mut g, &spec, &engine).unwrap();
        assert_eq!(results[&0], vec![0]);
    }

    #[test]
    fn test_safety_pass_reports_nothing() {
        let mut g = chain_graph(4);
        let spec = Spec::single_file("main.spec", vec![Invariant::always("Ok", "true")]);
        let mut engine = TableEngine::default();
        for i in 0..4 {
            engine.predicate("true", i, true);
        }

        let results = check_invariants(&mut g, &spec, &engine).unwrap();
        assert!(results[&0].is_empty());
    }

    #[test]
    fn test_eventual_flat_sets_witness_and_never_violates() {
        let mut g = chain_graph(3);
        let spec = Spec::single_file(
            "main.spec",
            vec![Invariant::always_eventually("Recurs", "done")],
        );
        let mut engine = TableEngine::default();
        engine.predicate("done", 0, false);
        engine.predicate("done", 1, true);
        engine.predicate("done", 2, false);

        let results = check_invariants(&mut g, &spec, &engine).unwrap();
        assert!(results[&0].is_empty());
        assert!(!g.node(g.root()).witness.get(0, 0));
        let with_witness: Vec<u32> = g
            .ids()
            .filter(|&id| g.node(id).witness.get(0, 0))
            .map(|id| g.node(id).snapshot.0)
            .collect();
        assert_eq!(with_witness, vec![1]);
    }

    #[test]
    fn test_nested_eventually_always_evaluates_inner_expr() {
        let mut g = chain_graph(2);
        let spec = Spec::single_file(
            "main.spec",
            vec![Invariant::eventually_always("Settles", "stable")],
        );
        let mut engine = TableEngine::default();
        engine.predicate("stable", 0, false);
        engine.predicate("stable", 1, true);

        check_invariants(&mut g, &spec, &engine).unwrap();
        let last = g.ids().last().unwrap();
        assert!(g.node(last).witness.get(0, 0));
    }

    #[test]
    fn test_predicate_error_is_fatal() {
        let mut g = chain_graph(2);
        let spec = Spec::single_file("main.spec", vec![Invariant::always("Broken", "oops")]);
        let engine = TableEngine::default();

        let err = check_invariants(&mut g, &spec, &engine).unwrap_err();
        assert!(matches!(err, CheckError::Eval(_)));
    }

    #[test]
    fn test_forking_assertion_is_fatal() {
        let mut g = chain_graph(2);
        let spec = Spec::single_file(
            "main.spec",
            vec![Invariant::block("Det", vec![TemporalOp::Always])],
        );
        let mut engine = TableEngine::default();
        engine.forking.insert("Det".to_string());

        let err = check_invariants(&mut g, &spec, &engine).unwrap_err();
        assert!(matches!(
            err,
            CheckError::NondeterministicAssertion { ref name } if name == "Det"
        ));
    }

    #[test]
    fn test_block_assertion_violation() {
        let mut g = chain_graph(3);
        let spec = Spec::single_file(
            "main.spec",
            vec![Invariant::block("Holds", vec![TemporalOp::Always])],
        );
        let mut engine = TableEngine::default();
        engine.assertion("Holds", 0, true);
        engine.assertion("Holds", 1, false);
        engine.assertion("Holds", 2, true);

        let results = check_invariants(&mut g, &spec, &engine).unwrap();
        assert_eq!(results[&0], vec![0]);
    }

    #[test]
    fn test_multiple_files_rejected() {
        let mut g = chain_graph(1);
        let spec = Spec {
            files: vec![
                tempo_graph::SpecFile {
                    name: "a.spec".to_string(),
                    invariants: vec![],
                },
                tempo_graph::SpecFile {
                    name: "b.spec".to_string(),
                    invariants: vec![],
                },
            ],
        };
        let engine = TableEngine::default();
        let err = check_invariants(&mut g, &spec, &engine).unwrap_err();
        assert!(matches!(err, CheckError::MultipleFiles(2)));
    }

    #[test]
    fn test_unsupported_flat_shape_rejected() {
        let mut g = chain_graph(1);
        let spec = Spec::single_file(
            "main.spec",
            vec![Invariant {
                name: "Someday".to_string(),
                kind: InvariantKind::Flat(tempo_graph::FlatInvariant {
                    expr: "p".to_string(),
                    always: false,
                    eventually: true,
                    nested: None,
                }),
            }],
        );
        let engine = TableEngine::default();
        let err = check_invariants(&mut g, &spec, &engine).unwrap_err();
        assert!(matches!(err, CheckError::UnsupportedInvariant(_)));
    }

    #[test]
    fn test_exists_witness_scan() {
        let mut g = chain_graph(5);
        let spec = Spec::single_file(
            "main.spec",
            vec![
                Invariant::block("Seen", vec![TemporalOp::Exists]),
                Invariant::block("NeverSeen", vec![TemporalOp::Exists]),
            ],
        );
        let mut engine = TableEngine::default();
        engine.assertion("Seen", 3, true);

        check_invariants(&mut g, &spec, &engine).unwrap();
        let nodes: Vec<NodeId> = g.ids().collect();
        let missing = check_simple_exists_witness(&g, &spec, &nodes).unwrap();
        assert_eq!(missing, vec![InvariantPosition::new(0, 1)]);
    }

    #[test]
    fn test_exists_witness_all_satisfied() {
        let mut g = chain_graph(2);
        let spec = Spec::single_file(
            "main.spec",
            vec![Invariant::block("Seen", vec![TemporalOp::Exists])],
        );
        let mut engine = TableEngine::default();
        engine.assertion("Seen", 1, true);

        check_invariants(&mut g, &spec, &engine).unwrap();
        let nodes: Vec<NodeId> = g.ids().collect();
        assert!(check_simple_exists_witness(&g, &spec, &nodes)
            .unwrap()
            .is_empty());
    }
}
