//! Liveness checking: fast backward fixpoints over fair edges and a final
//! forward DFS with per-cycle fairness analysis. The two strategies cover
//! semantics that neither alone handles; the dispatchers at the bottom pick
//! one per run.

use crate::error::{CheckError, CheckResult};
use crate::fairness::is_fair_cycle;
use crate::path::{cycle_finder_final, cycle_finder_final_bfs, find_cycle_path, path_to_init};
use crate::safety::ensure_single_file;
use ahash::AHashSet;
use std::collections::VecDeque;
use tempo_graph::{Fairness, InvariantPosition, Link, LivenessForm, NodeId, Spec, StateGraph};
use tracing::{debug, error, info};

fn ensure_no_deadlock(graph: &StateGraph, id: NodeId) -> CheckResult<()> {
    let node = graph.node(id);
    if node.outbound.is_empty() {
        error!(node = %id, name = %node.name, "deadlock detected");
        return Err(CheckError::Deadlock {
            node: id,
            name: node.name.clone(),
        });
    }
    Ok(())
}

/// Decide `[]<>P` by backward fixpoint: reverse-BFS from the P-satisfying
/// seeds across strongly-fair inbound links. Nodes the sweep never reaches
/// cannot reach a P-state by strong-fair progress; any of them anchors a
/// counterexample lasso.
pub fn always_eventually_fast<P>(graph: &StateGraph, predicate: P) -> CheckResult<Option<Vec<Link>>>
where
    P: Fn(NodeId) -> (bool, bool),
{
    let mut false_nodes: AHashSet<NodeId> = AHashSet::new();
    let mut visited: AHashSet<NodeId> = AHashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();

    for id in graph.ids() {
        ensure_no_deadlock(graph, id)?;
        let (relevant, value) = predicate(id);
        if relevant && value {
            queue.push_back(id);
        } else {
            false_nodes.insert(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        for link in &graph.node(id).inbound {
            if visited.contains(&link.node)
                || link.node == id
                || link.fairness != Fairness::Strong
            {
                continue;
            }
            false_nodes.remove(&link.node);
            queue.push_back(link.node);
        }
    }

    if false_nodes.is_empty() {
        debug!("always-eventually invariant passed");
        return Ok(None);
    }

    let dead = closest_dead_node(graph, &false_nodes);
    let mut path = path_to_init(graph, dead);
    path.extend(find_cycle_path(graph, dead, &false_nodes)?);
    Ok(Some(path))
}

/// Pick the violating node the counterexample should run to: prefer a node
/// with no live threads, then the smaller action depth, then the smaller
/// fork depth.
fn closest_dead_node(graph: &StateGraph, false_nodes: &AHashSet<NodeId>) -> NodeId {
    let mut closest: Option<NodeId> = None;
    for id in graph.ids().filter(|id| false_nodes.contains(id)) {
        let Some(best) = closest else {
            closest = Some(id);
            continue;
        };
        let node = graph.node(id);
        let best_node = graph.node(best);
        if best_node.threads > 0 && node.threads == 0 {
            closest = Some(id);
            continue;
        }
        if node.action_depth > best_node.action_depth {
            continue;
        } else if node.action_depth < best_node.action_depth {
            closest = Some(id);
        } else if node.fork_depth < best_node.fork_depth {
            closest = Some(id);
        }
    }
    closest.expect("dead-node selection requires a non-empty set")
}

/// Decide `<>[]P`. Reverse-BFS from the not-P states across all inbound
/// links erodes the P-seed set down to states from which no bad state is
/// reachable at all; reaching that set by strong-fair progress is then an
/// always-eventually question. An empty remainder means every behavior
/// revisits a bad state, and any reachable cycle is a counterexample.
pub fn eventually_always_fast<P>(graph: &StateGraph, predicate: P) -> CheckResult<Option<Vec<Link>>>
where
    P: Fn(NodeId) -> (bool, bool),
{
    let mut true_nodes: AHashSet<NodeId> = AHashSet::new();
    let mut visited: AHashSet<NodeId> = AHashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();

    for id in graph.ids() {
        ensure_no_deadlock(graph, id)?;
        let (relevant, value) = predicate(id);
        if relevant && !value {
            queue.push_back(id);
        } else if relevant {
            true_nodes.insert(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        for link in &graph.node(id).inbound {
            if visited.contains(&link.node) {
                continue;
            }
            true_nodes.remove(&link.node);
            queue.push_back(link.node);
        }
    }

    if !true_nodes.is_empty() {
        debug!(safe = true_nodes.len(), "reducing to always-eventually over the safe set");
        return always_eventually_fast(graph, |id| (true, true_nodes.contains(&id)));
    }

    info!("every behavior eventually reaches a failing state");
    Ok(cycle_finder_final_bfs(graph, graph.root(), |_| false))
}

/// Decide `[]<>P` by forward DFS: a cycle that contains no P-state and is
/// fair under the cycle's own fairness constraints violates the claim; an
/// unfair cycle is live because fairness will force an exit.
pub fn always_eventually_final<P>(graph: &StateGraph, root: NodeId, predicate: P) -> Option<Vec<Link>>
where
    P: Fn(NodeId) -> (bool, bool),
{
    cycle_finder_final(graph, root, |path| {
        let merge_node = path[path.len() - 1].node;
        let mut merge_index = 0;
        for i in (0..path.len()).rev() {
            let (relevant, value) = predicate(path[i].node);
            if relevant && value {
                return true;
            }
            if i < path.len() - 1 && path[i].node == merge_node {
                merge_index = i;
                break;
            }
        }
        !is_fair_cycle(graph, &path[merge_index..])
    })
}

/// Decide `<>[]P` by forward DFS: a fair cycle that still visits a not-P
/// state violates the claim.
pub fn eventually_always_final<P>(graph: &StateGraph, root: NodeId, predicate: P) -> Option<Vec<Link>>
where
    P: Fn(NodeId) -> (bool, bool),
{
    cycle_finder_final(graph, root, |path| {
        let merge_node = path[path.len() - 1].node;
        let mut merge_index = 0;
        let mut dead_node_found = false;
        for i in (0..path.len()).rev() {
            let (relevant, value) = predicate(path[i].node);
            if relevant && !value {
                dead_node_found = true;
            }
            if i < path.len() - 1 && path[i].node == merge_node {
                merge_index = i;
                break;
            }
        }
        !(dead_node_found && is_fair_cycle(graph, &path[merge_index..]))
    })
}

type Violation = Option<(Vec<Link>, InvariantPosition)>;

/// Walk liveness invariants in source order and decide each with the final
/// (forward DFS) strategy. A state is relevant when it has no live threads
/// or is a yield. Returns the first violation, or `None` when all pass.
pub fn check_strict_liveness(graph: &StateGraph, spec: &Spec, root: NodeId) -> CheckResult<Violation> {
    ensure_single_file(spec)?;
    for (i, file) in spec.files.iter().enumerate() {
        for (j, invariant) in file.invariants.iter().enumerate() {
            let Some(form) = invariant.liveness_form() else {
                continue;
            };
            let predicate = |id: NodeId| {
                let node = graph.node(id);
                (
                    node.threads == 0 || node.name == "yield",
                    node.witness.get(i, j),
                )
            };
            let failure = match form {
                LivenessForm::EventuallyAlways => {
                    info!(invariant = %invariant.name, "checking eventually-always");
                    eventually_always_final(graph, root, predicate)
                }
                LivenessForm::AlwaysEventually => {
                    info!(invariant = %invariant.name, "checking always-eventually");
                    always_eventually_final(graph, root, predicate)
                }
            };
            if let Some(path) = failure {
                return Ok(Some((path, InvariantPosition::new(i, j))));
            }
        }
    }
    Ok(None)
}

/// The fast-strategy analogue of [`check_strict_liveness`]: same walk and
/// classification, but each claim is decided by backward fixpoint over the
/// full node set, and relevance requires a quiescent state (no threads).
pub fn check_fast_liveness(graph: &StateGraph, spec: &Spec) -> CheckResult<Violation> {
    info!("checking liveness with the fast strategy");
    ensure_single_file(spec)?;
    for (i, file) in spec.files.iter().enumerate() {
        for (j, invariant) in file.invariants.iter().enumerate() {
            let Some(form) = invariant.liveness_form() else {
                continue;
            };
            let predicate = |id: NodeId| {
                let node = graph.node(id);
                (node.threads == 0, node.witness.get(i, j))
            };
            let failure = match form {
                LivenessForm::EventuallyAlways => {
                    info!(invariant = %invariant.name, "checking eventually-always");
                    eventually_always_fast(graph, predicate)?
                }
                LivenessForm::AlwaysEventually => {
                    info!(invariant = %invariant.name, "checking always-eventually");
                    always_eventually_fast(graph, predicate)?
                }
            };
            if let Some(path) = failure {
                return Ok(Some((path, InvariantPosition::new(i, j))));
            }
        }
    }
    Ok(None)
}
