//! Value iteration over attack graphs seen as Markov decision processes.
//!
//! From each node the attacker picks the successor maximizing
//! `λ·(p·V(succ) + (1-p)·V(node))`: a failed attempt leaves the attacker
//! where it was. Goal nodes are worth 1 and nodes without successors 0.

use ndarray::Array1;

use agrank_core::ProbabilityPolicy;
use agrank_graph::view::node_positions;
use agrank_graph::{DependencyGraph, GraphView, NodeId, PrunableGraph, StateGraph};

use crate::config::RankingConfig;
use crate::error::{RankError, Result};
use crate::method::RankingMethod;
use crate::types::NodeScores;

/// A graph whose edges carry success probabilities.
pub trait MarkovView: GraphView {
    /// Successors of `node` with the probability of reaching each.
    fn transitions(&self, node: NodeId, policy: ProbabilityPolicy) -> Result<Vec<(NodeId, f64)>>;

    /// The graph-wide value the exploit ranking compares.
    fn summary(&self, values: &NodeScores) -> Result<f64>;
}

impl MarkovView for StateGraph {
    fn transitions(&self, node: NodeId, policy: ProbabilityPolicy) -> Result<Vec<(NodeId, f64)>> {
        self.successors(node)
            .into_iter()
            .map(|s| Ok((s, self.edge_probability(node, s, policy)?)))
            .collect()
    }

    /// Value of the initial state.
    fn summary(&self, values: &NodeScores) -> Result<f64> {
        self.initial_node()
            .and_then(|n| values.get(n))
            .ok_or(RankError::MissingInitialNode)
    }
}

impl MarkovView for DependencyGraph {
    /// Propositions enable each of their exploits with certainty; an
    /// exploit grants its proposition with its own success probability.
    fn transitions(&self, node: NodeId, _policy: ProbabilityPolicy) -> Result<Vec<(NodeId, f64)>> {
        self.successors(node)
            .into_iter()
            .map(|s| Ok((s, self.edge_probability(node, s)?)))
            .collect()
    }

    /// Sum of the values of the initially true propositions.
    fn summary(&self, values: &NodeScores) -> Result<f64> {
        Ok(values.total(self.initial_nodes()))
    }
}

#[derive(Debug, Clone)]
pub struct ValueIteration {
    pub precision: f64,
    pub lambda: f64,
    pub max_iterations: usize,
    pub policy: ProbabilityPolicy,
}

impl ValueIteration {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            precision: config.precision,
            lambda: config.lambda,
            max_iterations: config.max_iterations,
            policy: config.probability_policy,
        }
    }

    pub fn values<G: MarkovView>(&self, graph: &G) -> Result<NodeScores> {
        let nodes = graph.node_ids();
        let positions = node_positions(&nodes);
        let goal_nodes = graph.goal_nodes();
        let mut transitions: Vec<Vec<(usize, f64)>> = Vec::with_capacity(nodes.len());
        for &node in &nodes {
            transitions.push(
                graph
                    .transitions(node, self.policy)?
                    .into_iter()
                    .map(|(s, p)| (positions[&s], p))
                    .collect(),
            );
        }
        let is_goal: Vec<bool> = nodes.iter().map(|n| goal_nodes.contains(n)).collect();

        let mut values = Array1::<f64>::zeros(nodes.len());
        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            let mut next = values.clone();
            for (i, actions) in transitions.iter().enumerate() {
                next[i] = if is_goal[i] {
                    1.0
                } else if actions.is_empty() {
                    0.0
                } else {
                    actions
                        .iter()
                        .map(|&(j, p)| self.lambda * (p * values[j] + (1.0 - p) * values[i]))
                        .fold(f64::NEG_INFINITY, f64::max)
                };
            }
            let delta = (&next - &values).mapv(|x| x * x).sum().sqrt();
            values = next;
            iterations += 1;
            if delta <= self.precision {
                converged = true;
                break;
            }
        }
        if !converged {
            tracing::warn!(iterations, "Value iteration stopped at the iteration cap");
        }
        tracing::debug!(nodes = nodes.len(), iterations, "Value iteration finished");

        Ok(NodeScores {
            scores: nodes.into_iter().zip(values.iter().copied()).collect(),
            iterations,
            converged,
        })
    }
}

impl Default for ValueIteration {
    fn default() -> Self {
        Self::new(&RankingConfig::default())
    }
}

impl<G> RankingMethod<G> for ValueIteration
where
    G: PrunableGraph + MarkovView + Sync,
{
    fn name(&self) -> &'static str {
        "value_iteration"
    }

    fn apply(&self, graph: &G) -> Result<NodeScores> {
        self.values(graph)
    }

    fn summarize(&self, graph: &G, scores: &NodeScores) -> Result<f64> {
        graph.summary(scores)
    }
}
