//! Invariant declarations and their temporal classification.

use std::fmt;

/// Temporal operator of a block-form invariant. The order of the operator
/// list encodes the nesting: `[Eventually, Always]` reads "eventually
/// always".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalOp {
    Always,
    Eventually,
    Exists,
}

impl fmt::Display for TemporalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalOp::Always => write!(f, "always"),
            TemporalOp::Eventually => write!(f, "eventually"),
            TemporalOp::Exists => write!(f, "exists"),
        }
    }
}

/// A flat invariant: a predicate expression with temporal flags. The
/// "eventually always" shape is encoded by `eventually` plus a nested
/// invariant carrying `always`.
#[derive(Debug, Clone)]
pub struct FlatInvariant {
    /// Predicate expression, evaluated by the engine against the heap plus
    /// the `__returns__` table.
    pub expr: String,
    pub always: bool,
    pub eventually: bool,
    pub nested: Option<Box<FlatInvariant>>,
}

/// The two shapes an invariant can take.
#[derive(Debug, Clone)]
pub enum InvariantKind {
    Flat(FlatInvariant),
    /// An imperative assertion body addressed by its position; the operator
    /// list carries the temporal nesting.
    Block { operators: Vec<TemporalOp> },
}

/// A declared claim over the state graph.
#[derive(Debug, Clone)]
pub struct Invariant {
    pub name: String,
    pub kind: InvariantKind,
}

/// The two liveness shapes the checker decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessForm {
    /// `[]<>P`: on every infinite run, P recurs.
    AlwaysEventually,
    /// `<>[]P`: on every infinite run, P eventually becomes permanent.
    EventuallyAlways,
}

impl Invariant {
    /// A plain safety invariant: always P.
    pub fn always(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InvariantKind::Flat(FlatInvariant {
                expr: expr.into(),
                always: true,
                eventually: false,
                nested: None,
            }),
        }
    }

    /// Flat `[]<>P`.
    pub fn always_eventually(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InvariantKind::Flat(FlatInvariant {
                expr: expr.into(),
                always: true,
                eventually: true,
                nested: None,
            }),
        }
    }

    /// Flat `<>[]P`, encoded as eventually over a nested always.
    pub fn eventually_always(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InvariantKind::Flat(FlatInvariant {
                expr: String::new(),
                always: false,
                eventually: true,
                nested: Some(Box::new(FlatInvariant {
                    expr: expr.into(),
                    always: true,
                    eventually: false,
                    nested: None,
                })),
            }),
        }
    }

    /// A block-form invariant with the given operator nesting.
    pub fn block(name: impl Into<String>, operators: Vec<TemporalOp>) -> Self {
        Self {
            name: name.into(),
            kind: InvariantKind::Block { operators },
        }
    }

    /// Classify this invariant as a liveness claim, or `None` when it is a
    /// plain safety or existence claim. Pure function of the shape.
    pub fn liveness_form(&self) -> Option<LivenessForm> {
        match &self.kind {
            InvariantKind::Flat(flat) => {
                if flat.always && flat.eventually {
                    Some(LivenessForm::AlwaysEventually)
                } else if flat.eventually
                    && flat.nested.as_ref().is_some_and(|nested| nested.always)
                {
                    Some(LivenessForm::EventuallyAlways)
                } else {
                    None
                }
            }
            InvariantKind::Block { operators } => {
                if !operators.contains(&TemporalOp::Eventually) {
                    return None;
                }
                match (operators.first(), operators.get(1)) {
                    (Some(TemporalOp::Eventually), Some(TemporalOp::Always)) => {
                        Some(LivenessForm::EventuallyAlways)
                    }
                    (Some(TemporalOp::Always), Some(TemporalOp::Eventually)) => {
                        Some(LivenessForm::AlwaysEventually)
                    }
                    _ => None,
                }
            }
        }
    }
}

/// A source file and its invariants.
#[derive(Debug, Clone)]
pub struct SpecFile {
    pub name: String,
    pub invariants: Vec<Invariant>,
}

/// The checked specification. Currently restricted to a single file.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    pub files: Vec<SpecFile>,
}

impl Spec {
    pub fn single_file(name: impl Into<String>, invariants: Vec<Invariant>) -> Self {
        Self {
            files: vec![SpecFile {
                name: name.into(),
                invariants,
            }],
        }
    }
}

/// Stable (file, invariant) coordinates used for witness bookkeeping and
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvariantPosition {
    pub file: usize,
    pub invariant: usize,
}

impl InvariantPosition {
    pub fn new(file: usize, invariant: usize) -> Self {
        Self { file, invariant }
    }
}

impl fmt::Display for InvariantPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.invariant)
    }
}
