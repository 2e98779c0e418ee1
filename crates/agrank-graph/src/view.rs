//! Read-only capability interface shared by the graph variants.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use agrank_core::{ExploitId, Store};

use crate::topology::{NodeId, Topology};

/// Discriminator between the two graph variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    State,
    Dependency,
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => write!(f, "state"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}

/// What every attack graph exposes to algorithms and external consumers.
///
/// Implementors only provide their topology, store, and goal bookkeeping;
/// node and edge queries come from the shared [`Topology`].
pub trait GraphView {
    fn topology(&self) -> &Topology;

    fn store(&self) -> &Store;

    fn kind(&self) -> GraphKind;

    /// Nodes in which the attacker has reached the goal.
    fn goal_nodes(&self) -> BTreeSet<NodeId>;

    /// Node ids in ascending order.
    fn node_ids(&self) -> Vec<NodeId> {
        self.topology().nodes().collect()
    }

    fn successors(&self, node: NodeId) -> Vec<NodeId> {
        self.topology().successors(node).collect()
    }

    fn predecessors(&self, node: NodeId) -> Vec<NodeId> {
        self.topology().predecessors(node).collect()
    }

    fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.topology().edges().collect()
    }

    fn number_of_nodes(&self) -> usize {
        self.topology().node_count()
    }

    fn number_of_edges(&self) -> usize {
        self.topology().edge_count()
    }
}

/// Graphs that can be copied with a subset of their exploits.
pub trait PrunableGraph: GraphView + Sized {
    /// Exploits that still label at least one transition of this graph.
    fn exploit_ids(&self) -> BTreeSet<ExploitId>;

    /// A new graph keeping only transitions justified by `exploits_to_keep`,
    /// with dangling nodes removed until a fixed point. `self` is untouched.
    fn get_pruned_graph(&self, exploits_to_keep: &BTreeSet<ExploitId>) -> Self;

    /// Whether at least one goal node is still present.
    fn reaches_goal(&self) -> bool {
        !self.goal_nodes().is_empty()
    }
}

/// Map each node id to its row/column in matrices built over `ordering`.
pub fn node_positions(ordering: &[NodeId]) -> HashMap<NodeId, usize> {
    ordering.iter().enumerate().map(|(i, &n)| (n, i)).collect()
}

/// Dense adjacency matrix: `a[i, j] = 1` when an edge runs from the `i`-th to
/// the `j`-th node of the returned ordering (ascending node ids).
pub fn adjacency_matrix<G: GraphView>(graph: &G) -> (Vec<NodeId>, Array2<f64>) {
    let ordering = graph.node_ids();
    let positions = node_positions(&ordering);
    let mut matrix = Array2::zeros((ordering.len(), ordering.len()));
    for (from, to) in graph.topology().edges() {
        matrix[[positions[&from], positions[&to]]] = 1.0;
    }
    (ordering, matrix)
}
