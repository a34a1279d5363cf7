//! State-transition graph model for temporal invariant checking.

pub mod graph;
pub mod invariant;
pub mod witness;

pub use graph::{Fairness, Link, Node, NodeId, SnapshotId, StateGraph};
pub use invariant::{
    FlatInvariant, Invariant, InvariantKind, InvariantPosition, LivenessForm, Spec, SpecFile,
    TemporalOp,
};
pub use witness::Witness;
