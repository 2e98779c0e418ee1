//! Error types for the agrank-rank crate.

use thiserror::Error;

use agrank_graph::{GraphKind, NodeId};

#[derive(Error, Debug)]
pub enum RankError {
    #[error("Graph error: {0}")]
    Graph(#[from] agrank_graph::GraphError),

    #[error("Core error: {0}")]
    Core(#[from] agrank_core::CoreError),

    #[error("Node {node} is divided by but has no outgoing edges")]
    ZeroOutDegree { node: NodeId },

    #[error("Outgoing edges of node {node} carry no probability mass")]
    ZeroProbabilityMass { node: NodeId },

    #[error("Graph has no initial node")]
    MissingInitialNode,

    #[error("Method {method} does not apply to {kind} graphs")]
    UnsupportedGraph { method: String, kind: GraphKind },

    #[error("Dependency graph has a cycle through {remaining} unevaluated nodes")]
    CyclicDependency { remaining: usize },

    #[error("D-separating set of {size} nodes is too large to enumerate")]
    SeparatingSetTooLarge { size: usize },

    #[error("Rankings cover different exploits")]
    MismatchedRankings,
}

pub type Result<T> = std::result::Result<T, RankError>;
