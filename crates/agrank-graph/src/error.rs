//! Error types for the agrank-graph crate.

use thiserror::Error;

use agrank_core::{CoreError, ExploitId, PropositionId};

use crate::topology::NodeId;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    #[error("Goal proposition {0} is not defined in the store")]
    MissingGoalProposition(PropositionId),

    #[error("States {first} and {second} hold the same propositions")]
    DuplicateState { first: NodeId, second: NodeId },

    #[error("Nodes {first} and {second} stand for the same store item")]
    DuplicateReference { first: NodeId, second: NodeId },

    #[error("Node {0} references an item missing from the store")]
    DanglingReference(NodeId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Edge not found: {from} -> {to}")]
    EdgeNotFound { from: NodeId, to: NodeId },

    #[error("Edge {from} -> {to} carries no exploit")]
    EmptyEdge { from: NodeId, to: NodeId },

    #[error("Edge {from} -> {to} references unknown exploit {exploit}")]
    UnknownExploit {
        from: NodeId,
        to: NodeId,
        exploit: ExploitId,
    },

    #[error("Edge {from} -> {to} does not match the exploit it is labelled with")]
    InvalidTransition { from: NodeId, to: NodeId },

    #[error("State space exceeded {limit} states")]
    StateLimitExceeded { limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
