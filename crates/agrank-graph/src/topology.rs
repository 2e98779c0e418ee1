//! Directed adjacency shared by every graph variant.

use std::collections::{BTreeMap, BTreeSet};

/// Node identifier inside one graph. Ids are stable across pruning: a pruned
/// copy keeps the ids of the nodes it retains.
pub type NodeId = usize;

/// Successor and predecessor sets per node, kept in sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    successors: BTreeMap<NodeId, BTreeSet<NodeId>>,
    predecessors: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeId) {
        self.successors.entry(node).or_default();
        self.predecessors.entry(node).or_default();
    }

    /// Add an edge, creating missing endpoints. Returns `false` if it existed.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        self.add_node(from);
        self.add_node(to);
        self.predecessors.entry(to).or_default().insert(from);
        self.successors.entry(from).or_default().insert(to)
    }

    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        if let Some(preds) = self.predecessors.get_mut(&to) {
            preds.remove(&from);
        }
        self.successors
            .get_mut(&from)
            .is_some_and(|succs| succs.remove(&to))
    }

    /// Remove a node and its incident edges. Returns the removed edges.
    pub fn remove_node(&mut self, node: NodeId) -> Vec<(NodeId, NodeId)> {
        let mut removed = Vec::new();
        if let Some(succs) = self.successors.remove(&node) {
            for to in succs {
                if let Some(preds) = self.predecessors.get_mut(&to) {
                    preds.remove(&node);
                }
                removed.push((node, to));
            }
        }
        if let Some(preds) = self.predecessors.remove(&node) {
            for from in preds {
                if let Some(succs) = self.successors.get_mut(&from) {
                    succs.remove(&node);
                }
                removed.push((from, node));
            }
        }
        removed
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.successors.contains_key(&node)
    }

    pub fn contains_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.successors
            .get(&from)
            .is_some_and(|succs| succs.contains(&to))
    }

    /// Node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.successors.keys().copied()
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.successors.get(&node).into_iter().flatten().copied()
    }

    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.predecessors.get(&node).into_iter().flatten().copied()
    }

    /// All edges, ordered by source then target.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.successors
            .iter()
            .flat_map(|(&from, succs)| succs.iter().map(move |&to| (from, to)))
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.successors.get(&node).map_or(0, BTreeSet::len)
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.predecessors.get(&node).map_or(0, BTreeSet::len)
    }

    pub fn node_count(&self) -> usize {
        self.successors.len()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.values().map(BTreeSet::len).sum()
    }
}
