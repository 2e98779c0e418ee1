//! Dependency attack graph: a bipartite graph with one node per proposition
//! and one per exploit. Edges run from each required proposition to the
//! exploit, and from the exploit to the proposition it grants.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use agrank_core::{ExploitId, PropositionId, Store};

use crate::error::{GraphError, Result};
use crate::prune::{self, Prune};
use crate::topology::{NodeId, Topology};
use crate::view::{GraphKind, GraphView, PrunableGraph};

/// What a dependency graph node stands for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DependencyNode {
    Proposition(PropositionId),
    Exploit(ExploitId),
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    store: Arc<Store>,
    goal_proposition: PropositionId,
    topology: Topology,
    nodes: BTreeMap<NodeId, DependencyNode>,
    proposition_nodes: BTreeMap<PropositionId, NodeId>,
    exploit_nodes: BTreeMap<ExploitId, NodeId>,
}

impl DependencyGraph {
    /// One node per proposition (ascending proposition id), followed by one
    /// node per exploit (ascending exploit id).
    pub fn build(store: Arc<Store>, goal_proposition: PropositionId) -> Result<Self> {
        if !store.contains_proposition(goal_proposition) {
            return Err(GraphError::MissingGoalProposition(goal_proposition));
        }
        store.validate()?;

        let mut nodes = Vec::with_capacity(store.proposition_count() + store.exploit_count());
        nodes.extend(store.propositions().map(|p| DependencyNode::Proposition(p.id)));
        nodes.extend(store.exploits().map(|e| DependencyNode::Exploit(e.id)));

        let mut graph = Self::empty(store, goal_proposition);
        for (id, node) in nodes.into_iter().enumerate() {
            graph.insert_node(id, node)?;
        }

        let exploits: Vec<(NodeId, Vec<PropositionId>, PropositionId)> = graph
            .store
            .exploits()
            .map(|e| {
                (
                    graph.exploit_nodes[&e.id],
                    e.required_propositions.iter().copied().collect(),
                    e.granted_proposition,
                )
            })
            .collect();
        for (exploit_node, required, granted) in exploits {
            for proposition in required {
                graph
                    .topology
                    .add_edge(graph.proposition_nodes[&proposition], exploit_node);
            }
            graph
                .topology
                .add_edge(exploit_node, graph.proposition_nodes[&granted]);
        }

        tracing::debug!(
            nodes = graph.topology.node_count(),
            edges = graph.topology.edge_count(),
            "Dependency graph built"
        );
        Ok(graph)
    }

    /// Rebuild a graph from stored nodes and edges. Every node must point at
    /// a store item, no item may appear twice, and every edge must follow a
    /// requirement or grant relation of the store.
    pub fn from_parts(
        store: Arc<Store>,
        goal_proposition: PropositionId,
        nodes: Vec<(NodeId, DependencyNode)>,
        edges: Vec<(NodeId, NodeId)>,
    ) -> Result<Self> {
        if !store.contains_proposition(goal_proposition) {
            return Err(GraphError::MissingGoalProposition(goal_proposition));
        }
        store.validate()?;

        let mut graph = Self::empty(store, goal_proposition);
        for (id, node) in nodes {
            graph.insert_node(id, node)?;
        }

        for (from, to) in edges {
            let source = graph.node(from).ok_or(GraphError::NodeNotFound(from))?;
            let target = graph.node(to).ok_or(GraphError::NodeNotFound(to))?;
            let valid = match (source, target) {
                (DependencyNode::Proposition(p), DependencyNode::Exploit(e)) => graph
                    .store
                    .exploit(e)
                    .is_some_and(|e| e.required_propositions.contains(&p)),
                (DependencyNode::Exploit(e), DependencyNode::Proposition(p)) => graph
                    .store
                    .exploit(e)
                    .is_some_and(|e| e.granted_proposition == p),
                _ => false,
            };
            if !valid {
                return Err(GraphError::InvalidTransition { from, to });
            }
            graph.topology.add_edge(from, to);
        }
        Ok(graph)
    }

    fn empty(store: Arc<Store>, goal_proposition: PropositionId) -> Self {
        Self {
            store,
            goal_proposition,
            topology: Topology::new(),
            nodes: BTreeMap::new(),
            proposition_nodes: BTreeMap::new(),
            exploit_nodes: BTreeMap::new(),
        }
    }

    fn insert_node(&mut self, id: NodeId, node: DependencyNode) -> Result<()> {
        let previous = match node {
            DependencyNode::Proposition(p) => {
                if !self.store.contains_proposition(p) {
                    return Err(GraphError::DanglingReference(id));
                }
                self.proposition_nodes.insert(p, id)
            }
            DependencyNode::Exploit(e) => {
                if self.store.exploit(e).is_none() {
                    return Err(GraphError::DanglingReference(id));
                }
                self.exploit_nodes.insert(e, id)
            }
        };
        if let Some(first) = previous {
            return Err(GraphError::DuplicateReference { first, second: id });
        }
        if self.nodes.insert(id, node).is_some() {
            return Err(GraphError::DuplicateReference { first: id, second: id });
        }
        self.topology.add_node(id);
        Ok(())
    }

    pub fn goal_proposition(&self) -> PropositionId {
        self.goal_proposition
    }

    pub fn shared_store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    pub fn node(&self, id: NodeId) -> Option<DependencyNode> {
        self.nodes.get(&id).copied()
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, DependencyNode)> + '_ {
        self.nodes.iter().map(|(&id, &node)| (id, node))
    }

    pub fn proposition_node(&self, proposition: PropositionId) -> Option<NodeId> {
        self.proposition_nodes.get(&proposition).copied()
    }

    pub fn exploit_node(&self, exploit: ExploitId) -> Option<NodeId> {
        self.exploit_nodes.get(&exploit).copied()
    }

    /// The node of the goal proposition, unless pruning removed it.
    pub fn goal_node(&self) -> Option<NodeId> {
        self.proposition_node(self.goal_proposition)
    }

    /// Nodes of propositions that hold in the initial state.
    pub fn initial_nodes(&self) -> BTreeSet<NodeId> {
        self.proposition_nodes
            .iter()
            .filter(|(&p, _)| self.is_initial(p))
            .map(|(_, &id)| id)
            .collect()
    }

    fn is_initial(&self, proposition: PropositionId) -> bool {
        self.store.proposition(proposition).is_some_and(|p| p.initial)
    }

    /// Success probability of leaving `node`: an exploit node succeeds with
    /// its own probability, a proposition node always enables its exploits.
    pub fn node_probability(&self, node: NodeId) -> Result<f64> {
        match self.node(node).ok_or(GraphError::NodeNotFound(node))? {
            DependencyNode::Proposition(_) => Ok(1.0),
            DependencyNode::Exploit(e) => self
                .store
                .exploit(e)
                .map(|e| e.probability())
                .ok_or(GraphError::DanglingReference(node)),
        }
    }

    /// Probability of the transition `from -> to`, which is the success
    /// probability of `from`.
    pub fn edge_probability(&self, from: NodeId, to: NodeId) -> Result<f64> {
        if !self.topology.contains_edge(from, to) {
            return Err(GraphError::EdgeNotFound { from, to });
        }
        self.node_probability(from)
    }
}

impl GraphView for DependencyGraph {
    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn store(&self) -> &Store {
        &self.store
    }

    fn kind(&self) -> GraphKind {
        GraphKind::Dependency
    }

    fn goal_nodes(&self) -> BTreeSet<NodeId> {
        self.goal_node().into_iter().collect()
    }
}

impl PrunableGraph for DependencyGraph {
    fn exploit_ids(&self) -> BTreeSet<ExploitId> {
        self.exploit_nodes.keys().copied().collect()
    }

    fn get_pruned_graph(&self, exploits_to_keep: &BTreeSet<ExploitId>) -> Self {
        let mut pruned = self.clone();

        let dropped: Vec<NodeId> = pruned
            .exploit_nodes
            .iter()
            .filter(|(e, _)| !exploits_to_keep.contains(e))
            .map(|(_, &node)| node)
            .collect();
        for node in &dropped {
            Prune::remove_node(&mut pruned, *node);
        }

        let removed = prune::remove_dangling(&mut pruned);
        tracing::debug!(
            dropped_exploits = dropped.len(),
            removed_nodes = removed,
            remaining_nodes = pruned.nodes.len(),
            "Dependency graph pruned"
        );
        pruned
    }
}

impl Prune for DependencyGraph {
    fn is_entry(&self, node: NodeId) -> bool {
        matches!(self.node(node), Some(DependencyNode::Proposition(p)) if self.is_initial(p))
    }

    fn is_terminal_goal(&self, node: NodeId) -> bool {
        matches!(self.node(node), Some(DependencyNode::Proposition(p)) if p == self.goal_proposition)
    }

    /// An exploit that lost one of its required propositions can no longer fire.
    fn is_invalid(&self, node: NodeId) -> bool {
        match self.node(node) {
            Some(DependencyNode::Exploit(e)) => self.store.exploit(e).is_some_and(|exploit| {
                self.topology.in_degree(node) != exploit.required_propositions.len()
            }),
            _ => false,
        }
    }

    fn remove_node(&mut self, node: NodeId) {
        self.topology.remove_node(node);
        match self.nodes.remove(&node) {
            Some(DependencyNode::Proposition(p)) => {
                self.proposition_nodes.remove(&p);
            }
            Some(DependencyNode::Exploit(e)) => {
                self.exploit_nodes.remove(&e);
            }
            None => {}
        }
    }
}
