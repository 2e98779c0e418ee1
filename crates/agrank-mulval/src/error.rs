//! Error types for the agrank-mulval crate.

use thiserror::Error;

use agrank_core::CoreError;
use agrank_graph::GraphError;

#[derive(Error, Debug)]
pub enum MulvalError {
    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Vertex {vertex} has unknown type {kind:?} (expected LEAF, OR or AND)")]
    UnknownVertexType { vertex: usize, kind: String },

    #[error("Vertex ids are 1-indexed, got 0")]
    ZeroVertexId,

    #[error("Vertex {0} is defined twice")]
    DuplicateVertex(usize),

    #[error("Arc references unknown vertex {0}")]
    UnknownVertex(usize),

    #[error("Arc {src} -> {dst} links two vertices of the same kind")]
    MalformedArc { src: usize, dst: usize },

    #[error("AND vertex {vertex} grants {successors} propositions (expected exactly 1)")]
    AmbiguousGrant { vertex: usize, successors: usize },

    #[error("Goal vertex {0} is not a proposition")]
    InvalidGoal(usize),

    #[error("No goal proposition found")]
    NoGoalProposition,

    #[error("Invalid generator settings: {0}")]
    InvalidGenerator(String),

    #[error("Store error: {0}")]
    Core(#[from] CoreError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MulvalError>;
