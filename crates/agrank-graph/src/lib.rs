//! agrank-graph: In-memory attack graphs.
//!
//! Two graph variants are derived from a proposition/exploit [`Store`]:
//! the state graph (nodes are reachable sets of true propositions, edges are
//! the exploits moving between them) and the dependency graph (one node per
//! proposition and per exploit). Both share a [`Topology`] and the pruning
//! routine, and expose the read-only [`GraphView`] capability interface used
//! by ranking and clustering consumers.
//!
//! [`Store`]: agrank_core::Store

pub mod dependency;
pub mod error;
pub mod persist;
mod prune;
pub mod state;
pub mod topology;
pub mod view;

pub use dependency::{DependencyGraph, DependencyNode};
pub use error::{GraphError, Result};
pub use persist::AnyGraph;
pub use state::{StateEdge, StateGraph, StateNode, INITIAL_NODE};
pub use topology::{NodeId, Topology};
pub use view::{GraphKind, GraphView, PrunableGraph};
