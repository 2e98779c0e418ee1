//! Risk quantification on dependency graphs after Homer et al.
//!
//! Every node gets the probability that the attacker eventually makes it
//! true. A proposition holds when any of its exploits succeeds, an exploit
//! succeeds with its own probability once all of its propositions hold.
//! Shared ancestors make sibling events dependent; their joint probability
//! is computed by conditioning on a d-separating set of branch nodes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use agrank_graph::{DependencyGraph, DependencyNode, GraphView, NodeId, Topology};

use crate::error::{RankError, Result};
use crate::method::RankingMethod;
use crate::types::NodeScores;

/// Largest d-separating set whose `2^n` assignments are enumerated.
pub const MAX_SEPARATING_SET: usize = 20;

/// Truth value assigned to each node of a set.
type Polarities = BTreeMap<NodeId, bool>;

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskQuantifier;

impl RankingMethod<DependencyGraph> for RiskQuantifier {
    fn name(&self) -> &'static str {
        "risk_quantifier"
    }

    /// Risk of every node. Initially true propositions score 1.
    fn apply(&self, graph: &DependencyGraph) -> Result<NodeScores> {
        let mut evaluation = Evaluation::new(graph)?;
        evaluation.run()?;

        let mut scores: BTreeMap<NodeId, f64> = evaluation
            .phi
            .iter()
            .filter(|(&node, _)| node != evaluation.root)
            .map(|(&node, &phi)| (node, phi))
            .collect();
        scores.extend(evaluation.removed.iter().map(|&node| (node, 1.0)));

        tracing::debug!(
            nodes = scores.len(),
            memoized = evaluation.joint_memo.len() + evaluation.conditional_memo.len(),
            "Risk quantified"
        );
        Ok(NodeScores {
            iterations: scores.len(),
            scores,
            converged: true,
        })
    }

    /// Sum of all node risks.
    fn summarize(&self, _graph: &DependencyGraph, scores: &NodeScores) -> Result<f64> {
        Ok(scores.scores.values().sum())
    }
}

struct Evaluation<'a> {
    graph: &'a DependencyGraph,
    /// The graph without its initial propositions, plus the root.
    topology: Topology,
    /// Synthetic always-true proposition feeding the exploits whose
    /// requirements were all initially true.
    root: NodeId,
    removed: Vec<NodeId>,
    exploit_probabilities: HashMap<NodeId, f64>,
    branch_nodes: BTreeSet<NodeId>,
    /// Unconditional probability of each evaluated node.
    phi: HashMap<NodeId, f64>,
    /// Branch nodes the node depends on.
    chi: HashMap<NodeId, BTreeSet<NodeId>>,
    /// Branch nodes the node cannot hold without.
    delta: HashMap<NodeId, BTreeSet<NodeId>>,
    joint_memo: HashMap<Polarities, f64>,
    conditional_memo: HashMap<(Polarities, Polarities), f64>,
}

impl<'a> Evaluation<'a> {
    fn new(graph: &'a DependencyGraph) -> Result<Self> {
        let removed: Vec<NodeId> = graph.initial_nodes().into_iter().collect();
        let mut topology = graph.topology().clone();
        for &node in &removed {
            topology.remove_node(node);
        }

        let root = graph.node_ids().last().map_or(0, |&n| n + 1);
        topology.add_node(root);
        let orphans: Vec<NodeId> = topology
            .nodes()
            .filter(|&n| {
                topology.in_degree(n) == 0 && matches!(graph.node(n), Some(DependencyNode::Exploit(_)))
            })
            .collect();
        for node in orphans {
            topology.add_edge(root, node);
        }

        let mut exploit_probabilities = HashMap::new();
        for (node, kind) in graph.nodes() {
            if matches!(kind, DependencyNode::Exploit(_)) && topology.contains_node(node) {
                exploit_probabilities.insert(node, graph.node_probability(node)?);
            }
        }
        let branch_nodes = topology
            .nodes()
            .filter(|&n| topology.out_degree(n) > 1)
            .collect();

        Ok(Self {
            graph,
            topology,
            root,
            removed,
            exploit_probabilities,
            branch_nodes,
            phi: HashMap::new(),
            chi: HashMap::new(),
            delta: HashMap::new(),
            joint_memo: HashMap::new(),
            conditional_memo: HashMap::new(),
        })
    }

    fn is_proposition(&self, node: NodeId) -> bool {
        node == self.root || matches!(self.graph.node(node), Some(DependencyNode::Proposition(_)))
    }

    fn phi(&self, node: NodeId) -> f64 {
        self.phi.get(&node).copied().unwrap_or(0.0)
    }

    fn probability(&self, node: NodeId) -> f64 {
        self.exploit_probabilities.get(&node).copied().unwrap_or(0.0)
    }

    /// Evaluate nodes in topological order, smallest ready id first.
    fn run(&mut self) -> Result<()> {
        let mut pending: HashMap<NodeId, usize> = self
            .topology
            .nodes()
            .map(|n| (n, self.topology.in_degree(n)))
            .collect();
        let mut ready: BTreeSet<NodeId> = pending
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&n, _)| n)
            .collect();
        let total = pending.len();
        let mut evaluated = 0;

        while let Some(node) = ready.pop_first() {
            self.evaluate(node)?;
            evaluated += 1;
            let successors: Vec<NodeId> = self.topology.successors(node).collect();
            for successor in successors {
                if let Some(count) = pending.get_mut(&successor) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(successor);
                    }
                }
            }
        }

        if evaluated < total {
            return Err(RankError::CyclicDependency {
                remaining: total - evaluated,
            });
        }
        Ok(())
    }

    fn evaluate(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            self.phi.insert(node, 1.0);
            return Ok(());
        }
        let predecessors: Vec<NodeId> = self.topology.predecessors(node).collect();
        let mut chi = BTreeSet::new();

        if self.is_proposition(node) {
            let all_false = predecessors.iter().map(|&p| (p, false)).collect();
            let phi = 1.0 - self.joint(&all_false)?;

            let mut delta: Option<BTreeSet<NodeId>> = None;
            for p in &predecessors {
                chi.extend(self.chi.get(p).into_iter().flatten().copied());
                let incoming = self.delta.get(p).cloned().unwrap_or_default();
                delta = Some(match delta {
                    Some(d) => d.intersection(&incoming).copied().collect(),
                    None => incoming,
                });
            }
            self.phi.insert(node, phi);
            self.delta.insert(node, delta.unwrap_or_default());
        } else {
            let all_true = predecessors.iter().map(|&p| (p, true)).collect();
            let phi = self.probability(node) * self.joint(&all_true)?;

            let mut delta: BTreeSet<NodeId> = predecessors
                .iter()
                .copied()
                .filter(|p| self.branch_nodes.contains(p))
                .collect();
            chi.extend(delta.iter().copied());
            for p in &predecessors {
                chi.extend(self.chi.get(p).into_iter().flatten().copied());
                delta.extend(self.delta.get(p).into_iter().flatten().copied());
            }
            self.phi.insert(node, phi);
            self.delta.insert(node, delta);
        }
        self.chi.insert(node, chi);
        Ok(())
    }

    /// Probability that every node of `nodes` has its given truth value.
    fn joint(&mut self, nodes: &Polarities) -> Result<f64> {
        if let Some(&value) = self.joint_memo.get(nodes) {
            return Ok(value);
        }

        let keys: Vec<NodeId> = nodes.keys().copied().collect();
        let mut separating = BTreeSet::new();
        for (i, n) in keys.iter().enumerate() {
            for m in &keys[i + 1..] {
                if let (Some(a), Some(b)) = (self.chi.get(n), self.chi.get(m)) {
                    separating.extend(a.intersection(b).copied());
                }
            }
        }

        let value = if separating.is_empty() {
            nodes
                .iter()
                .map(|(&n, &holds)| if holds { self.phi(n) } else { 1.0 - self.phi(n) })
                .product()
        } else {
            if separating.len() > MAX_SEPARATING_SET {
                return Err(RankError::SeparatingSetTooLarge {
                    size: separating.len(),
                });
            }
            let separating: Vec<NodeId> = separating.into_iter().collect();
            let mut total = 0.0;
            for mask in 0u64..(1 << separating.len()) {
                let given: Polarities = separating
                    .iter()
                    .enumerate()
                    .map(|(i, &d)| (d, mask & (1 << i) == 0))
                    .collect();
                total += self.conditional(nodes, &given)? * self.joint(&given)?;
            }
            total
        };

        self.joint_memo.insert(nodes.clone(), value);
        Ok(value)
    }

    /// Probability of `nodes` given the truth values in `given`. The nodes
    /// are independent once `given` is fixed.
    fn conditional(&mut self, nodes: &Polarities, given: &Polarities) -> Result<f64> {
        let key = (nodes.clone(), given.clone());
        if let Some(&value) = self.conditional_memo.get(&key) {
            return Ok(value);
        }

        let value = match nodes.iter().next() {
            Some((&node, &holds)) if nodes.len() == 1 => {
                if holds {
                    self.holds_given(node, given)?
                } else {
                    1.0 - self.conditional(&Polarities::from([(node, true)]), given)?
                }
            }
            _ => {
                let mut value = 1.0;
                for (&node, &holds) in nodes {
                    value *= self.conditional(&Polarities::from([(node, holds)]), given)?;
                }
                value
            }
        };

        self.conditional_memo.insert(key, value);
        Ok(value)
    }

    fn holds_given(&mut self, node: NodeId, given: &Polarities) -> Result<f64> {
        match given.get(&node) {
            Some(true) => return Ok(1.0),
            Some(false) => return Ok(0.0),
            None => {}
        }
        let needs_false = self
            .delta
            .get(&node)
            .is_some_and(|d| d.iter().any(|b| given.get(b) == Some(&false)));
        if needs_false {
            return Ok(0.0);
        }
        let affected = self
            .chi
            .get(&node)
            .is_some_and(|c| given.keys().any(|d| c.contains(d)));
        if !affected {
            return Ok(self.phi(node));
        }

        let predecessors: Vec<NodeId> = self.topology.predecessors(node).collect();
        if self.is_proposition(node) {
            let all_false = predecessors.iter().map(|&p| (p, false)).collect();
            Ok(1.0 - self.conditional(&all_false, given)?)
        } else {
            let all_true = predecessors.iter().map(|&p| (p, true)).collect();
            Ok(self.probability(node) * self.conditional(&all_true, given)?)
        }
    }
}
