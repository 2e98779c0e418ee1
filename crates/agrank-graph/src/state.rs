//! State attack graph: one node per distinct reachable set of true
//! propositions, one edge per pair of states linked by at least one exploit.
//!
//! Construction is a depth-first expansion from the initial state with global
//! deduplication. An explicit stack of expansion frames replaces recursion, and
//! a hash map keyed by the (ordered) proposition set gives O(1) lookup of
//! already created states.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use agrank_core::{ExploitId, ProbabilityPolicy, PropositionId, Store};

use crate::error::{GraphError, Result};
use crate::prune::{self, Prune};
use crate::topology::{NodeId, Topology};
use crate::view::{GraphKind, GraphView, PrunableGraph};

/// The initial state is always created first.
pub const INITIAL_NODE: NodeId = 0;

/// A reachable set of true propositions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateNode {
    pub id: NodeId,
    pub true_propositions: BTreeSet<PropositionId>,
}

/// A transition between two states and every exploit that justifies it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub exploits: BTreeSet<ExploitId>,
}

#[derive(Debug, Clone)]
pub struct StateGraph {
    store: Arc<Store>,
    goal_proposition: PropositionId,
    topology: Topology,
    nodes: BTreeMap<NodeId, StateNode>,
    edges: BTreeMap<(NodeId, NodeId), StateEdge>,
    goal_nodes: BTreeSet<NodeId>,
}

impl StateGraph {
    /// Expand every state reachable from the initial propositions.
    pub fn build(store: Arc<Store>, goal_proposition: PropositionId) -> Result<Self> {
        Self::build_with_limit(store, goal_proposition, None)
    }

    /// Like [`StateGraph::build`], failing once more than `limit` states exist.
    pub fn build_with_limit(
        store: Arc<Store>,
        goal_proposition: PropositionId,
        limit: Option<usize>,
    ) -> Result<Self> {
        if !store.contains_proposition(goal_proposition) {
            return Err(GraphError::MissingGoalProposition(goal_proposition));
        }
        store.validate()?;

        let mut builder = Builder {
            store: &store,
            goal_proposition,
            limit,
            topology: Topology::new(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            goal_nodes: BTreeSet::new(),
            index: HashMap::new(),
        };
        builder.expand()?;

        let Builder {
            topology,
            nodes,
            edges,
            goal_nodes,
            ..
        } = builder;

        tracing::debug!(
            states = nodes.len(),
            transitions = edges.len(),
            goal_states = goal_nodes.len(),
            "State graph built"
        );

        Ok(Self {
            store,
            goal_proposition,
            topology,
            nodes,
            edges,
            goal_nodes,
        })
    }

    /// Rebuild a graph from stored nodes and edges, re-checking every
    /// invariant the builder guarantees.
    pub fn from_parts(
        store: Arc<Store>,
        goal_proposition: PropositionId,
        nodes: Vec<StateNode>,
        edges: Vec<StateEdge>,
    ) -> Result<Self> {
        if !store.contains_proposition(goal_proposition) {
            return Err(GraphError::MissingGoalProposition(goal_proposition));
        }
        store.validate()?;

        let mut topology = Topology::new();
        let mut node_map = BTreeMap::new();
        let mut seen: HashMap<&BTreeSet<PropositionId>, NodeId> = HashMap::new();
        for node in &nodes {
            if let Some(&first) = seen.get(&node.true_propositions) {
                return Err(GraphError::DuplicateState {
                    first,
                    second: node.id,
                });
            }
            seen.insert(&node.true_propositions, node.id);
        }
        for node in nodes {
            topology.add_node(node.id);
            node_map.insert(node.id, node);
        }

        let mut edge_map = BTreeMap::new();
        for edge in edges {
            let (Some(from), Some(to)) = (node_map.get(&edge.from), node_map.get(&edge.to)) else {
                let missing = if node_map.contains_key(&edge.from) { edge.to } else { edge.from };
                return Err(GraphError::NodeNotFound(missing));
            };
            if edge.exploits.is_empty() {
                return Err(GraphError::EmptyEdge {
                    from: edge.from,
                    to: edge.to,
                });
            }
            for &id in &edge.exploits {
                let exploit = store.exploit(id).ok_or(GraphError::UnknownExploit {
                    from: edge.from,
                    to: edge.to,
                    exploit: id,
                })?;
                let mut expected = from.true_propositions.clone();
                let grows = exploit.is_usable(&from.true_propositions)
                    && expected.insert(exploit.granted_proposition)
                    && expected == to.true_propositions;
                if !grows {
                    return Err(GraphError::InvalidTransition {
                        from: edge.from,
                        to: edge.to,
                    });
                }
            }
            topology.add_edge(edge.from, edge.to);
            edge_map.insert((edge.from, edge.to), edge);
        }

        let goal_nodes = node_map
            .values()
            .filter(|n| n.true_propositions.contains(&goal_proposition))
            .map(|n| n.id)
            .collect();

        Ok(Self {
            store,
            goal_proposition,
            topology,
            nodes: node_map,
            edges: edge_map,
            goal_nodes,
        })
    }

    pub fn goal_proposition(&self) -> PropositionId {
        self.goal_proposition
    }

    /// Shared handle on the store, for building sibling graphs.
    pub fn shared_store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// The initial state, unless pruning removed it.
    pub fn initial_node(&self) -> Option<NodeId> {
        self.nodes.contains_key(&INITIAL_NODE).then_some(INITIAL_NODE)
    }

    pub fn node(&self, id: NodeId) -> Option<&StateNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.values()
    }

    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&StateEdge> {
        self.edges.get(&(from, to))
    }

    /// Edges ordered by source then target.
    pub fn state_edges(&self) -> impl Iterator<Item = &StateEdge> {
        self.edges.values()
    }

    /// The state holding exactly `propositions`, if any.
    pub fn find_node(&self, propositions: &BTreeSet<PropositionId>) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| &n.true_propositions == propositions)
            .map(|n| n.id)
    }

    /// Success probability of the transition `from -> to`, combining the
    /// probabilities of its exploits with `policy`.
    pub fn edge_probability(
        &self,
        from: NodeId,
        to: NodeId,
        policy: ProbabilityPolicy,
    ) -> Result<f64> {
        let edge = self
            .edges
            .get(&(from, to))
            .ok_or(GraphError::EdgeNotFound { from, to })?;
        let probabilities = edge
            .exploits
            .iter()
            .map(|&id| {
                self.store
                    .exploit(id)
                    .map(|e| e.probability())
                    .ok_or(GraphError::UnknownExploit {
                        from,
                        to,
                        exploit: id,
                    })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(policy.combine(probabilities))
    }
}

impl GraphView for StateGraph {
    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn store(&self) -> &Store {
        &self.store
    }

    fn kind(&self) -> GraphKind {
        GraphKind::State
    }

    fn goal_nodes(&self) -> BTreeSet<NodeId> {
        self.goal_nodes.clone()
    }
}

impl PrunableGraph for StateGraph {
    fn exploit_ids(&self) -> BTreeSet<ExploitId> {
        self.edges
            .values()
            .flat_map(|e| e.exploits.iter().copied())
            .collect()
    }

    fn get_pruned_graph(&self, exploits_to_keep: &BTreeSet<ExploitId>) -> Self {
        let mut pruned = self.clone();

        let mut emptied = Vec::new();
        for (&key, edge) in pruned.edges.iter_mut() {
            edge.exploits.retain(|id| exploits_to_keep.contains(id));
            if edge.exploits.is_empty() {
                emptied.push(key);
            }
        }
        for (from, to) in emptied {
            pruned.edges.remove(&(from, to));
            pruned.topology.remove_edge(from, to);
        }

        let removed = prune::remove_dangling(&mut pruned);
        tracing::debug!(
            kept_exploits = exploits_to_keep.len(),
            removed_states = removed,
            remaining_states = pruned.nodes.len(),
            "State graph pruned"
        );
        pruned
    }
}

impl Prune for StateGraph {
    fn is_entry(&self, node: NodeId) -> bool {
        node == INITIAL_NODE
    }

    fn is_terminal_goal(&self, node: NodeId) -> bool {
        self.goal_nodes.contains(&node)
    }

    fn remove_node(&mut self, node: NodeId) {
        for key in self.topology.remove_node(node) {
            self.edges.remove(&key);
        }
        self.nodes.remove(&node);
        self.goal_nodes.remove(&node);
    }
}

// ── Construction ──────────────────────────────────────────────────

/// A state whose usable exploits are being tried one after the other.
struct Expansion {
    node: NodeId,
    /// `(exploit, granted proposition)` in ascending exploit id order.
    usable: Vec<(ExploitId, PropositionId)>,
    next: usize,
}

struct Builder<'a> {
    store: &'a Store,
    goal_proposition: PropositionId,
    limit: Option<usize>,
    topology: Topology,
    nodes: BTreeMap<NodeId, StateNode>,
    edges: BTreeMap<(NodeId, NodeId), StateEdge>,
    goal_nodes: BTreeSet<NodeId>,
    index: HashMap<BTreeSet<PropositionId>, NodeId>,
}

impl Builder<'_> {
    fn expand(&mut self) -> Result<()> {
        let root = self.create_node(self.store.initial_propositions())?;
        let mut stack = vec![self.expansion(root)];

        while let Some(frame) = stack.last_mut() {
            let Some(&(exploit, granted)) = frame.usable.get(frame.next) else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let current = frame.node;

            let mut reached = self.nodes[&current].true_propositions.clone();
            reached.insert(granted);

            match self.index.get(&reached) {
                Some(&existing) => {
                    if existing != current {
                        self.link(current, existing, exploit);
                    }
                }
                None => {
                    let created = self.create_node(reached)?;
                    self.link(current, created, exploit);
                    stack.push(self.expansion(created));
                }
            }
        }
        Ok(())
    }

    fn create_node(&mut self, true_propositions: BTreeSet<PropositionId>) -> Result<NodeId> {
        if let Some(limit) = self.limit {
            if self.nodes.len() >= limit {
                return Err(GraphError::StateLimitExceeded { limit });
            }
        }
        let id = self.nodes.len();
        if true_propositions.contains(&self.goal_proposition) {
            self.goal_nodes.insert(id);
        }
        self.index.insert(true_propositions.clone(), id);
        self.topology.add_node(id);
        self.nodes.insert(
            id,
            StateNode {
                id,
                true_propositions,
            },
        );
        Ok(id)
    }

    /// Goal states are terminal and get no usable exploit.
    fn expansion(&self, node: NodeId) -> Expansion {
        let usable = if self.goal_nodes.contains(&node) {
            Vec::new()
        } else {
            let state = &self.nodes[&node].true_propositions;
            self.store
                .exploits()
                .filter(|e| e.is_usable(state))
                .map(|e| (e.id, e.granted_proposition))
                .collect()
        };
        Expansion {
            node,
            usable,
            next: 0,
        }
    }

    fn link(&mut self, from: NodeId, to: NodeId, exploit: ExploitId) {
        self.topology.add_edge(from, to);
        self.edges
            .entry((from, to))
            .or_insert_with(|| StateEdge {
                from,
                to,
                exploits: BTreeSet::new(),
            })
            .exploits
            .insert(exploit);
    }
}
