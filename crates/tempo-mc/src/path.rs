//! Counterexample path construction: init prefixes, cycle searches, and
//! the forward cycle finders shared by the liveness strategies.

use crate::error::{CheckError, CheckResult};
use ahash::AHashSet;
use std::collections::VecDeque;
use tempo_graph::{Fairness, Link, NodeId, StateGraph};

/// Callback invoked on every candidate cycle or stutter path. Returns
/// `true` when the path is live (no violation).
pub type CycleCallback<'a> = dyn FnMut(&[Link]) -> bool + 'a;

/// Synthetic link marking the entry into a path at `node`, carrying the
/// node's rendering metadata.
pub fn init_link(graph: &StateGraph, node: NodeId) -> Link {
    let n = graph.node(node);
    Link {
        node,
        name: "Init".to_string(),
        fairness: n.fairness,
        labels: n.labels.clone(),
    }
}

/// Flip an inbound link into the forward direction: the result points at
/// `node` and keeps the action metadata.
pub fn reverse_link(inbound: &Link, node: NodeId) -> Link {
    Link {
        node,
        name: inbound.name.clone(),
        fairness: inbound.fairness,
        labels: inbound.labels.clone(),
    }
}

fn stutter_link(node: NodeId) -> Link {
    Link {
        node,
        name: "stutter".to_string(),
        fairness: Fairness::None,
        labels: Vec::new(),
    }
}

/// A shortest-parent path from the graph root to `target`, built by
/// following each node's first inbound link. Reads init -> target.
pub fn path_to_init(graph: &StateGraph, target: NodeId) -> Vec<Link> {
    let mut path = Vec::new();
    let mut current = target;
    loop {
        let node = graph.node(current);
        if node.inbound.is_empty() || node.name == "init" || current == graph.root() {
            path.push(init_link(graph, current));
            break;
        }
        let parent = &node.inbound[0];
        path.push(reverse_link(parent, current));
        current = parent.node;
    }
    path.reverse();
    path
}

/// BFS for a cycle from `start` across strong-fair links whose target stays
/// within `allowed`. A branch with no qualifying edge ends in a synthetic
/// stutter link. The caller has proven the set contains a cycle or a
/// stutter, so an exhausted queue is a structural error.
pub fn find_cycle_path(
    graph: &StateGraph,
    start: NodeId,
    allowed: &AHashSet<NodeId>,
) -> CheckResult<Vec<Link>> {
    struct Branch {
        at: NodeId,
        path: Vec<Link>,
        visited: AHashSet<NodeId>,
    }

    let mut queue = VecDeque::new();
    queue.push_back(Branch {
        at: start,
        path: Vec::new(),
        visited: AHashSet::new(),
    });

    while let Some(branch) = queue.pop_front() {
        let node = branch.at;
        let mut fair_count = 0;
        for link in &graph.node(node).outbound {
            if link.fairness != Fairness::Strong || !allowed.contains(&link.node) {
                continue;
            }
            fair_count += 1;
            if branch.visited.contains(&node) {
                return Ok(branch.path);
            }
            let mut path = branch.path.clone();
            path.push(link.clone());
            // Marked after the child is built, so a node reached through two
            // fair parents may prune its second branch.
            let mut visited = branch.visited.clone();
            visited.insert(node);
            queue.push_back(Branch {
                at: link.node,
                path,
                visited,
            });
        }
        if fair_count == 0 {
            let mut path = branch.path;
            path.push(stutter_link(node));
            return Ok(path);
        }
    }
    Err(CheckError::CycleNotFound)
}

/// Forward DFS surfacing every cycle and stutter candidate to `callback`.
/// Per-branch `visited` detects cycles on the current path; the shared
/// `global_visited` skips nodes some earlier branch already proved safe.
/// Returns the first path the callback rejects, or `None` when all
/// candidates are live.
pub fn cycle_finder_final<F>(graph: &StateGraph, root: NodeId, mut callback: F) -> Option<Vec<Link>>
where
    F: FnMut(&[Link]) -> bool,
{
    let mut global_visited = AHashSet::new();
    let path = vec![init_link(graph, root)];
    dfs(graph, root, &mut callback, AHashSet::new(), path, &mut global_visited)
}

fn dfs(
    graph: &StateGraph,
    node: NodeId,
    callback: &mut CycleCallback<'_>,
    mut visited: AHashSet<NodeId>,
    path: Vec<Link>,
    global_visited: &mut AHashSet<NodeId>,
) -> Option<Vec<Link>> {
    if visited.contains(&node) {
        if callback(&path) {
            return None;
        }
        return Some(path);
    }
    visited.insert(node);
    if !global_visited.insert(node) {
        return None;
    }

    let n = graph.node(node);
    let has_fair = n.outbound.iter().any(|link| link.fairness.is_fair());
    let pending_action = n.outbound.iter().any(|link| link.name.starts_with("thread-"));

    // Infinite stuttering at a yield that fairness cannot force out of and
    // that no pending thread can advance; no DFS cycle would surface it.
    if n.name == "yield" && !has_fair && !pending_action {
        let mut stutter_path = path.clone();
        stutter_path.push(stutter_link(node));
        if !callback(&stutter_path) {
            return Some(stutter_path);
        }
    }

    for link in &n.outbound {
        let mut child_path = path.clone();
        child_path.push(link.clone());
        if let Some(failed) = dfs(
            graph,
            link.node,
            callback,
            visited.clone(),
            child_path,
            global_visited,
        ) {
            return Some(failed);
        }
    }
    None
}

/// BFS variant of the cycle finder, used by the fast strategy when every
/// behavior provably reaches a failing state and any reachable cycle
/// serves as the counterexample.
pub fn cycle_finder_final_bfs<F>(
    graph: &StateGraph,
    root: NodeId,
    mut callback: F,
) -> Option<Vec<Link>>
where
    F: FnMut(&[Link]) -> bool,
{
    struct Branch {
        link: Link,
        path: Vec<Link>,
        visited: AHashSet<NodeId>,
    }

    let mut queue = VecDeque::new();
    queue.push_back(Branch {
        link: init_link(graph, root),
        path: Vec::new(),
        visited: AHashSet::new(),
    });

    while let Some(branch) = queue.pop_front() {
        let node = branch.link.node;
        let mut path = branch.path;
        let mut visited = branch.visited;

        if visited.contains(&node) {
            path.push(branch.link);
            if callback(&path) {
                continue;
            }
            return Some(path);
        }
        visited.insert(node);
        path.push(branch.link);

        let mut fair_count = 0;
        for link in &graph.node(node).outbound {
            if link.fairness.is_fair() {
                fair_count += 1;
            }
            queue.push_back(Branch {
                link: link.clone(),
                path: path.clone(),
                visited: visited.clone(),
            });
        }
        if fair_count == 0 {
            let mut stutter_path = path.clone();
            stutter_path.push(stutter_link(node));
            if callback(&stutter_path) {
                continue;
            }
            return Some(stutter_path);
        }
    }
    None
}
