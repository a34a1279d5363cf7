//! Fair-cycle analysis.

use ahash::AHashSet;
use tempo_graph::{Fairness, Link, StateGraph};
use tracing::trace;

/// Decide whether a cyclic path is fair: no fairness constraint by itself
/// can force the execution out of the cycle.
///
/// Only scheduling points participate in the accounting; the intervening
/// states are mid-action and cannot be scheduled away from. A strong-fair
/// action escapes the cycle unless some occurrence of it stays in the
/// chain. A weak-fair action escapes only if it is enabled at every
/// scheduling point of the cycle, so the per-node out-of-chain sets are
/// intersected. A cycle that takes a crash link although the previous
/// scheduling point had a non-crash alternative is never fair.
pub fn is_fair_cycle(graph: &StateGraph, path: &[Link]) -> bool {
    let mut strong_in_chain: AHashSet<&str> = AHashSet::new();
    let mut strong_out_of_chain: AHashSet<&str> = AHashSet::new();
    let mut weak_in_chain: AHashSet<&str> = AHashSet::new();
    let mut weak_out_of_chain: AHashSet<&str> = AHashSet::new();

    let chain_len = path.len();
    let mut first_yield: Option<usize> = None;
    let mut prev_has_non_crash = false;
    let mut next_is_crash = false;

    for (i, link) in path.iter().enumerate() {
        let node = graph.node(link.node);
        let mut unvisited_weak_out: AHashSet<&str> = AHashSet::new();

        if next_is_crash && prev_has_non_crash {
            trace!("cycle crashes although the previous state had a non-crash option");
            return false;
        }
        if !node.is_scheduling_point() {
            continue;
        }
        if first_yield.is_none() {
            first_yield = Some(i);
        }

        prev_has_non_crash = false;
        let next_node = path[(i + 1) % chain_len].node;
        for out in &node.outbound {
            if out.name != "crash" {
                prev_has_non_crash = true;
            } else if out.node == next_node {
                next_is_crash = true;
            }
            match out.fairness {
                Fairness::Strong => {
                    if out.node == next_node {
                        strong_in_chain.insert(out.name.as_str());
                        strong_out_of_chain.remove(out.name.as_str());
                    } else if !strong_in_chain.contains(out.name.as_str()) {
                        strong_out_of_chain.insert(out.name.as_str());
                    }
                }
                Fairness::Weak => {
                    if out.node == next_node {
                        weak_in_chain.insert(out.name.as_str());
                        unvisited_weak_out.remove(out.name.as_str());
                    } else if !weak_in_chain.contains(out.name.as_str()) {
                        unvisited_weak_out.insert(out.name.as_str());
                    }
                }
                Fairness::None => {}
            }
        }

        if first_yield == Some(i) {
            weak_out_of_chain = unvisited_weak_out;
        } else {
            weak_out_of_chain.retain(|name| unvisited_weak_out.contains(name));
        }
    }

    trace!(
        strong_in = strong_in_chain.len(),
        strong_out = strong_out_of_chain.len(),
        weak_in = weak_in_chain.len(),
        weak_out = weak_out_of_chain.len(),
        "fair-cycle classification"
    );
    strong_out_of_chain.is_empty() && weak_out_of_chain.is_empty()
}
