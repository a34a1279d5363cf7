//! Shared fixtures: a graph builder, a table-driven engine fake, and a
//! counterexample path validator.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use tempo_graph::{Fairness, Link, Node, NodeId, SnapshotId, StateGraph};
use tempo_mc::{AssertRun, Engine, EvalError, EvalResult, StepOutcome};

/// Convenience builder: snapshot ids are assigned sequentially, so node k
/// carries `SnapshotId(k)`.
pub struct GraphBuilder {
    graph: StateGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: StateGraph::new(),
        }
    }

    pub fn node(&mut self, name: &str) -> NodeId {
        let snapshot = SnapshotId(self.graph.len() as u32);
        self.graph.add_node(Node::new(name, snapshot))
    }

    pub fn link(&mut self, from: NodeId, to: NodeId, name: &str, fairness: Fairness) -> &mut Self {
        self.graph.add_link(from, to, name, fairness);
        self
    }

    /// Mark invariant `invariant` of file 0 as witnessed at `node`.
    pub fn witness(&mut self, node: NodeId, invariant: usize) -> &mut Self {
        self.graph.node_mut(node).witness.set(0, invariant);
        self
    }

    pub fn build(self) -> StateGraph {
        self.graph
    }
}

/// Table-driven engine fake: predicate truth per (expr, snapshot) and
/// scripted assertion verdicts per (invariant name, snapshot). Unknown
/// predicates fail evaluation; unknown assertions return false.
#[derive(Default)]
pub struct TableEngine {
    predicates: HashMap<(String, u32), bool>,
    assertions: HashMap<(String, u32), bool>,
    forking: HashSet<String>,
}

impl TableEngine {
    pub fn predicate(&mut self, expr: &str, snapshot: u32, value: bool) -> &mut Self {
        self.predicates.insert((expr.to_string(), snapshot), value);
        self
    }

    pub fn assertion(&mut self, name: &str, snapshot: u32, value: bool) -> &mut Self {
        self.assertions.insert((name.to_string(), snapshot), value);
        self
    }

    pub fn forking(&mut self, name: &str) -> &mut Self {
        self.forking.insert(name.to_string());
        self
    }
}

pub struct ScriptedAssert {
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
        Ok(ScriptedAssert {
            name: thread_name.to_string(),
            verdict: self
                .assertions
                .get(&(thread_name.to_string(), snapshot.0))
                .copied()
                .unwrap_or(false),
            forks: self.forking.contains(thread_name),
        })
    }
}

/// Assert the structural validity of a counterexample path: it starts with
/// a synthetic Init link, every later step is either a real graph link or a
/// terminal in-place stutter, and the tail closes a cycle or stutters.
pub fn validate_path(graph: &StateGraph, path: &[Link]) {
    assert!(!path.is_empty(), "a counterexample path cannot be empty");
    assert_eq!(path[0].name, "Init");
    for i in 1..path.len() {
        let prev = &path[i - 1];
        let link = &path[i];
        if link.name == "stutter" {
            assert_eq!(i, path.len() - 1, "stutter must terminate the path");
            assert_eq!(link.node, prev.node, "stutter must stay in place");
        } else {
            let connected = graph
                .node(prev.node)
                .outbound
                .iter()
                .any(|out| out.node == link.node && out.name == link.name);
            assert!(connected, "path step {i} does not follow a graph link");
        }
    }
    let tail = path.last().unwrap();
    let closes_cycle = path[..path.len() - 1]
        .iter()
        .any(|link| link.node == tail.node);
    assert!(
        tail.name == "stutter" || closes_cycle,
        "path tail must close a cycle or stutter"
    );
}
