//! Absorbing Markov chain view of a state graph.
//!
//! Goal states absorb; every other state is transient and moves to one of
//! its successors with probability proportional to the edge's success
//! probability. The fundamental matrix `N = Σ Q^i` yields absorption
//! probabilities `B = N·R` and expected path lengths `t = N·1`.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use agrank_core::ProbabilityPolicy;
use agrank_graph::view::node_positions;
use agrank_graph::{GraphView, NodeId, StateGraph};

use crate::config::RankingConfig;
use crate::error::{RankError, Result};
use crate::method::RankingMethod;
use crate::types::NodeScores;

/// Transient/absorbing decomposition of a state graph.
#[derive(Debug, Clone)]
pub struct AbsorbingChain {
    pub transient: Vec<NodeId>,
    pub absorbing: Vec<NodeId>,
    /// Transient to transient transitions.
    pub q: Array2<f64>,
    /// Transient to absorbing transitions.
    pub r: Array2<f64>,
    /// Fundamental matrix.
    pub n: Array2<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl AbsorbingChain {
    pub fn build(graph: &StateGraph, config: &RankingConfig) -> Result<Self> {
        let goal_nodes = graph.goal_nodes();
        let (absorbing, transient): (Vec<NodeId>, Vec<NodeId>) =
            graph.node_ids().into_iter().partition(|n| goal_nodes.contains(n));
        let (q, r) = transition_blocks(graph, &transient, &absorbing, config.probability_policy)?;

        let k = transient.len();
        let mut n = Array2::eye(k);
        let mut power = Array2::<f64>::eye(k);
        let mut iterations = 0;
        while power.sum() > config.absorption_threshold {
            if iterations == config.max_iterations {
                tracing::warn!(iterations, "Fundamental matrix stopped at the iteration cap");
                break;
            }
            power = power.dot(&q);
            n += &power;
            iterations += 1;
        }
        let converged = power.sum() <= config.absorption_threshold;

        tracing::debug!(
            transient = k,
            absorbing = absorbing.len(),
            iterations,
            "Absorbing chain built"
        );
        Ok(Self {
            transient,
            absorbing,
            q,
            r,
            n,
            iterations,
            converged,
        })
    }

    /// `B[i, j]`: probability that transient state `i` ends in goal state `j`.
    pub fn absorption_probabilities(&self) -> Array2<f64> {
        self.n.dot(&self.r)
    }

    /// Expected number of transitions before absorption, per transient state.
    pub fn expected_steps(&self) -> Array1<f64> {
        self.n.sum_axis(ndarray::Axis(1))
    }
}

/// `Q` and `R`, normalizing each row by the total success probability of the
/// state's outgoing edges.
fn transition_blocks(
    graph: &StateGraph,
    transient: &[NodeId],
    absorbing: &[NodeId],
    policy: ProbabilityPolicy,
) -> Result<(Array2<f64>, Array2<f64>)> {
    let transient_positions = node_positions(transient);
    let absorbing_positions = node_positions(absorbing);
    let mut q = Array2::zeros((transient.len(), transient.len()));
    let mut r = Array2::zeros((transient.len(), absorbing.len()));

    for (i, &node) in transient.iter().enumerate() {
        let probabilities = graph
            .successors(node)
            .into_iter()
            .map(|s| Ok((s, graph.edge_probability(node, s, policy)?)))
            .collect::<Result<Vec<(NodeId, f64)>>>()?;
        if probabilities.is_empty() {
            continue;
        }
        let total: f64 = probabilities.iter().map(|(_, p)| p).sum();
        if total <= 0.0 {
            return Err(RankError::ZeroProbabilityMass { node });
        }
        for (successor, probability) in probabilities {
            let transition = probability / total;
            match transient_positions.get(&successor) {
                Some(&j) => q[[i, j]] = transition,
                None => r[[i, absorbing_positions[&successor]]] = transition,
            }
        }
    }
    Ok((q, r))
}

fn initial_value(graph: &StateGraph, scores: &NodeScores) -> Result<f64> {
    graph
        .initial_node()
        .and_then(|n| scores.get(n))
        .ok_or(RankError::MissingInitialNode)
}

// ── Probabilistic path ────────────────────────────────────────────

/// Highest probability of ending in any single goal state.
#[derive(Debug, Clone, Default)]
pub struct ProbabilisticPath {
    pub config: RankingConfig,
}

impl ProbabilisticPath {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl RankingMethod<StateGraph> for ProbabilisticPath {
    fn name(&self) -> &'static str {
        "probabilistic_path"
    }

    fn apply(&self, graph: &StateGraph) -> Result<NodeScores> {
        let chain = AbsorbingChain::build(graph, &self.config)?;
        let b = chain.absorption_probabilities();
        let mut scores: BTreeMap<NodeId, f64> = chain
            .transient
            .iter()
            .zip(b.rows())
            .map(|(&node, row)| (node, row.iter().copied().fold(0.0, f64::max)))
            .collect();
        scores.extend(chain.absorbing.iter().map(|&node| (node, 1.0)));
        Ok(NodeScores {
            scores,
            iterations: chain.iterations,
            converged: chain.converged,
        })
    }

    fn summarize(&self, graph: &StateGraph, scores: &NodeScores) -> Result<f64> {
        initial_value(graph, scores)
    }
}

// ── Expected path length ──────────────────────────────────────────

/// Expected number of exploits used before reaching a goal state.
#[derive(Debug, Clone, Default)]
pub struct ExpectedPathLength {
    pub config: RankingConfig,
}

impl ExpectedPathLength {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl RankingMethod<StateGraph> for ExpectedPathLength {
    fn name(&self) -> &'static str {
        "expected_path_length"
    }

    fn apply(&self, graph: &StateGraph) -> Result<NodeScores> {
        let chain = AbsorbingChain::build(graph, &self.config)?;
        let steps = chain.expected_steps();
        let mut scores: BTreeMap<NodeId, f64> = chain
            .transient
            .iter()
            .copied()
            .zip(steps.iter().copied())
            .collect();
        scores.extend(chain.absorbing.iter().map(|&node| (node, 0.0)));
        Ok(NodeScores {
            scores,
            iterations: chain.iterations,
            converged: chain.converged,
        })
    }

    fn summarize(&self, graph: &StateGraph, scores: &NodeScores) -> Result<f64> {
        initial_value(graph, scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_single_step_chain() {
        let graph = fixtures::single_step(8.0);
        let chain = AbsorbingChain::build(&graph, &RankingConfig::default()).unwrap();
        assert_eq!(chain.transient, vec![0]);
        assert_eq!(chain.absorbing, vec![1]);
        assert_eq!(chain.q[[0, 0]], 0.0);
        assert_eq!(chain.r[[0, 0]], 1.0);
        assert_eq!(chain.n[[0, 0]], 1.0);
        assert!(chain.converged);
    }

    #[test]
    fn test_diamond_blocks() {
        // Transient n0 n1 n2 n4, absorbing n3.
        let graph = fixtures::diamond();
        let chain = AbsorbingChain::build(&graph, &RankingConfig::default()).unwrap();
        assert_eq!(chain.transient, vec![0, 1, 2, 4]);
        assert_eq!(chain.absorbing, vec![3]);

        // n0 -> n1 via e0 (0.9), n0 -> n4 via e1 (0.5): 0.9/1.4 and 0.5/1.4.
        assert!((chain.q[[0, 1]] - 0.9 / 1.4).abs() < 1e-12);
        assert!((chain.q[[0, 3]] - 0.5 / 1.4).abs() < 1e-12);
        assert_eq!(chain.r[[2, 0]], 1.0);

        // Q is nilpotent on a DAG: Q^3 = 0 after three products.
        assert_eq!(chain.iterations, 3);
    }

    #[test]
    fn test_expected_path_length() {
        // Every route from n0 takes exactly three exploits.
        let graph = fixtures::diamond();
        let method = ExpectedPathLength::default();
        let scores = method.apply(&graph).unwrap();
        assert!((scores.get(0).unwrap() - 3.0).abs() < 1e-12);
        assert!((scores.get(1).unwrap() - 2.0).abs() < 1e-12);
        assert!((scores.get(2).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(scores.get(3), Some(0.0));
        assert!((method.score(&graph).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_probabilistic_path() {
        let graph = fixtures::diamond();
        let scores = ProbabilisticPath::default().apply(&graph).unwrap();
        // Without dead ends every state is eventually absorbed.
        for node in [0, 1, 2, 4] {
            assert!((scores.get(node).unwrap() - 1.0).abs() < 1e-12);
        }
        assert_eq!(scores.get(3), Some(1.0));
    }

    #[test]
    fn test_probabilistic_path_splits_between_goals() {
        // Two goal states reached from n0 with 0.6 and 0.4 success chance.
        let graph = fixtures::two_goals();
        let chain = AbsorbingChain::build(&graph, &RankingConfig::default()).unwrap();
        let b = chain.absorption_probabilities();
        assert_eq!(chain.absorbing.len(), 2);
        assert!((b[[0, 0]] - 0.6).abs() < 1e-12);
        assert!((b[[0, 1]] - 0.4).abs() < 1e-12);

        let score = ProbabilisticPath::default().score(&graph).unwrap();
        assert!((score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_zero_probability_edges() {
        let graph = fixtures::single_step(0.0);
        let err = ProbabilisticPath::default().apply(&graph).unwrap_err();
        assert!(matches!(err, RankError::ZeroProbabilityMass { node: 0 }));
    }
}
