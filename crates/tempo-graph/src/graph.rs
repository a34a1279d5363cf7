//! Arena-backed state graph: nodes, action-labeled links, fairness levels.

use crate::witness::Witness;
use std::fmt;

/// Index of a node in the graph arena. Links refer to nodes by id, so the
/// bidirectional adjacency forms no ownership cycle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a heap/thread snapshot owned by the execution engine. The
/// checker never inspects the snapshot; it only forwards the handle to the
/// evaluator capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(pub u32);

/// Scheduling guarantee attached to a link. Weak: an action continuously
/// enabled is eventually taken. Strong: an action repeatedly enabled is
/// eventually taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fairness {
    #[default]
    None,
    Weak,
    Strong,
}

impl Fairness {
    /// Weak or strong.
    #[inline]
    pub fn is_fair(self) -> bool {
        !matches!(self, Fairness::None)
    }
}

/// A directed, action-labeled edge. In an outbound list `node` is the
/// target; in an inbound list it is the origin. Both directions are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub node: NodeId,
    /// Action label. `"crash"`, `"stutter"`, `"Init"` and names prefixed
    /// `"thread-"` carry special meaning to the checker.
    pub name: String,
    pub fairness: Fairness,
    pub labels: Vec<String>,
}

impl Link {
    pub fn new(node: NodeId, name: impl Into<String>, fairness: Fairness) -> Self {
        Self {
            node,
            name: name.into(),
            fairness,
            labels: Vec::new(),
        }
    }
}

/// A reachable state of the checked program.
#[derive(Debug, Clone)]
pub struct Node {
    /// Symbolic state name; `"init"` and `"yield"` mark scheduling points.
    pub name: String,
    /// Opaque handle to the heap/thread snapshot for this state.
    pub snapshot: SnapshotId,
    /// Live thread count of the snapshot.
    pub threads: usize,
    /// Depth counters used only for counterexample tie-breaking.
    pub action_depth: u32,
    pub fork_depth: u32,
    /// Rendering metadata, copied onto synthetic links.
    pub labels: Vec<String>,
    pub fairness: Fairness,
    /// Adjacency, kept mutually consistent by [`StateGraph::add_link`].
    pub outbound: Vec<Link>,
    pub inbound: Vec<Link>,
    /// Per-(file, invariant) witness bits.
    pub witness: Witness,
}

impl Node {
    pub fn new(name: impl Into<String>, snapshot: SnapshotId) -> Self {
        Self {
            name: name.into(),
            snapshot,
            threads: 0,
            action_depth: 0,
            fork_depth: 0,
            labels: Vec::new(),
            fairness: Fairness::None,
            outbound: Vec::new(),
            inbound: Vec::new(),
            witness: Witness::new(),
        }
    }

    /// True at states where the scheduler may switch threads. Only these
    /// states participate in fairness accounting.
    #[inline]
    pub fn is_scheduling_point(&self) -> bool {
        self.name == "init" || self.name == "yield"
    }
}

/// The reachable-state graph, immutable during checking apart from the
/// monotonic witness bits.
#[derive(Debug, Default)]
pub struct StateGraph {
    nodes: Vec<Node>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root node. By construction the engine inserts the initial state
    /// first, so the root is always node 0.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Insert a link `from -> to`, recording it outbound on `from` and
    /// inbound on `to`.
    pub fn add_link(&mut self, from: NodeId, to: NodeId, name: &str, fairness: Fairness) {
        self.add_link_with_labels(from, to, name, fairness, Vec::new());
    }

    pub fn add_link_with_labels(
        &mut self,
        from: NodeId,
        to: NodeId,
        name: &str,
        fairness: Fairness,
        labels: Vec<String>,
    ) {
        let mut out = Link::new(to, name, fairness);
        out.labels = labels.clone();
        self.nodes[from.index()].outbound.push(out);

        let mut inb = Link::new(from, name, fairness);
        inb.labels = labels;
        self.nodes[to.index()].inbound.push(inb);
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}
