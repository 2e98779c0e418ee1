//! Reachability rankings of state graph nodes after Mehta et al.: PageRank
//! with a restart toward the initial state, and Kuehlmann's discounted
//! power series.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use agrank_graph::view::node_positions;
use agrank_graph::{GraphView, NodeId, StateGraph};

use crate::config::RankingConfig;
use crate::error::{RankError, Result};
use crate::method::RankingMethod;
use crate::types::NodeScores;

/// Node ordering and `Z[i, j] = 1 / out_degree(j)` for every edge `j -> i`.
pub fn transition_matrix<G: GraphView>(graph: &G) -> Result<(Vec<NodeId>, Array2<f64>)> {
    let ordering = graph.node_ids();
    let positions = node_positions(&ordering);
    let n = ordering.len();
    let mut z = Array2::zeros((n, n));
    for &i in &ordering {
        for j in graph.topology().predecessors(i) {
            let out_degree = graph.topology().out_degree(j);
            if out_degree == 0 {
                return Err(RankError::ZeroOutDegree { node: j });
            }
            z[[positions[&i], positions[&j]]] = 1.0 / out_degree as f64;
        }
    }
    Ok((ordering, z))
}

fn start_position(graph: &StateGraph, ordering: &[NodeId]) -> Result<usize> {
    let initial = graph.initial_node().ok_or(RankError::MissingInitialNode)?;
    ordering
        .iter()
        .position(|&n| n == initial)
        .ok_or(RankError::MissingInitialNode)
}

fn l2_distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    (a - b).mapv(|x| x * x).sum().sqrt()
}

fn to_scores(ordering: &[NodeId], values: &Array1<f64>) -> BTreeMap<NodeId, f64> {
    ordering.iter().copied().zip(values.iter().copied()).collect()
}

// ── PageRank ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PageRank {
    pub damping: f64,
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl PageRank {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            damping: config.damping,
            epsilon: config.epsilon,
            max_iterations: config.max_iterations,
        }
    }

    /// `d·Z` plus `1 - d` on every entry of the initial node's row.
    pub fn restart_matrix(&self, z: &Array2<f64>, start: usize) -> Array2<f64> {
        let mut m = z * self.damping;
        m.row_mut(start).mapv_inplace(|v| v + (1.0 - self.damping));
        m
    }

    /// Iterate `R <- M·R` from the uniform vector until successive iterates
    /// are within `epsilon`.
    fn power_iteration(&self, m: &Array2<f64>) -> (Array1<f64>, usize, bool) {
        let n = m.nrows();
        let mut r = Array1::from_elem(n, 1.0 / n as f64);
        let mut iterations = 0;
        while iterations < self.max_iterations {
            let next = m.dot(&r);
            let distance = l2_distance(&next, &r);
            r = next;
            iterations += 1;
            if distance <= self.epsilon {
                return (r, iterations, true);
            }
        }
        tracing::warn!(iterations, "PageRank stopped at the iteration cap");
        (r, iterations, false)
    }
}

impl Default for PageRank {
    fn default() -> Self {
        Self::new(&RankingConfig::default())
    }
}

impl RankingMethod<StateGraph> for PageRank {
    fn name(&self) -> &'static str {
        "page_rank"
    }

    fn apply(&self, graph: &StateGraph) -> Result<NodeScores> {
        let (ordering, z) = transition_matrix(graph)?;
        let start = start_position(graph, &ordering)?;
        let m = self.restart_matrix(&z, start);
        let (mut r, iterations, converged) = self.power_iteration(&m);
        // The initial state does not count as reached.
        r[start] = 0.0;
        tracing::debug!(nodes = ordering.len(), iterations, "PageRank computed");
        Ok(NodeScores {
            scores: to_scores(&ordering, &r),
            iterations,
            converged,
        })
    }

    /// Total score of the goal states.
    fn summarize(&self, graph: &StateGraph, scores: &NodeScores) -> Result<f64> {
        Ok(scores.total(graph.goal_nodes()))
    }
}

// ── Kuehlmann ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Kuehlmann {
    pub eta: f64,
    pub max_m: usize,
}

impl Kuehlmann {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            eta: config.eta,
            max_m: config.max_m,
        }
    }
}

impl Default for Kuehlmann {
    fn default() -> Self {
        Self::new(&RankingConfig::default())
    }
}

impl RankingMethod<StateGraph> for Kuehlmann {
    fn name(&self) -> &'static str {
        "kuehlmann"
    }

    /// `r = (1-η)/η · Σ_{m=1..max_m} η^m · Σ_{k=1..m+1} P^k·s`, with `s` the
    /// indicator of the initial node.
    fn apply(&self, graph: &StateGraph) -> Result<NodeScores> {
        let (ordering, p) = transition_matrix(graph)?;
        let start = start_position(graph, &ordering)?;
        let n = ordering.len();

        let mut s = Array1::zeros(n);
        s[start] = 1.0;
        let mut power = p.dot(&s);
        let mut cumulative = power.clone();
        let mut r = Array1::<f64>::zeros(n);
        let mut discount = 1.0;
        for _ in 1..=self.max_m {
            discount *= self.eta;
            power = p.dot(&power);
            cumulative += &power;
            r.scaled_add(discount, &cumulative);
        }
        r *= (1.0 - self.eta) / self.eta;

        tracing::debug!(nodes = n, max_m = self.max_m, "Kuehlmann scores computed");
        Ok(NodeScores {
            scores: to_scores(&ordering, &r),
            iterations: self.max_m,
            converged: true,
        })
    }

    /// Total score of the goal states.
    fn summarize(&self, graph: &StateGraph, scores: &NodeScores) -> Result<f64> {
        Ok(scores.total(graph.goal_nodes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use agrank_core::Store;
    use agrank_graph::{GraphKind, Topology};
    use std::collections::BTreeSet;

    #[test]
    fn test_transition_matrix_columns() {
        let graph = fixtures::diamond();
        let (ordering, z) = transition_matrix(&graph).unwrap();
        assert_eq!(ordering, vec![0, 1, 2, 3, 4]);

        // n0 has two successors, n1 n2 n4 one each, the goal n3 none.
        let sums = z.sum_axis(ndarray::Axis(0));
        assert_eq!(sums.to_vec(), vec![1.0, 1.0, 1.0, 0.0, 1.0]);
        assert_eq!(z[[1, 0]], 0.5);
        assert_eq!(z[[4, 0]], 0.5);
        assert_eq!(z[[2, 4]], 1.0);
    }

    #[test]
    fn test_restart_matrix_is_stochastic_off_sinks() {
        let graph = fixtures::diamond();
        let (_, z) = transition_matrix(&graph).unwrap();
        let m = PageRank::default().restart_matrix(&z, 0);
        let sums = m.sum_axis(ndarray::Axis(0));
        // d + (1 - d) = 1 where the node has successors, 1 - d at the goal.
        for (i, sum) in sums.iter().enumerate() {
            let expected = if i == 3 { 0.15 } else { 1.0 };
            assert!((sum - expected).abs() < 1e-12, "column {i}: {sum}");
        }
    }

    /// A 3-cycle without sinks. Every column of `M` sums to one, so the
    /// total mass of `R` stays exactly 1 at every iteration.
    struct Cycle {
        topology: Topology,
        store: Store,
    }

    impl GraphView for Cycle {
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
            BTreeSet::new()
        }
    }

    #[test]
    fn test_page_rank_conserves_mass_without_sinks() {
        let mut topology = Topology::new();
        topology.add_edge(0, 1);
        topology.add_edge(1, 2);
        topology.add_edge(2, 0);
        let cycle = Cycle {
            topology,
            store: Store::new(),
        };

        let page_rank = PageRank::default();
        let (_, z) = transition_matrix(&cycle).unwrap();
        let (r, _, converged) = page_rank.power_iteration(&page_rank.restart_matrix(&z, 0));
        assert!(converged);
        assert!((r.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_page_rank_zeroes_initial_node() {
        let graph = fixtures::diamond();
        let scores = PageRank::default().apply(&graph).unwrap();
        assert!(scores.converged);
        assert_eq!(scores.get(0), Some(0.0));
        assert_eq!(scores.scores.len(), 5);
        assert!(scores.scores.values().all(|&s| s >= 0.0));
    }

    #[test]
    fn test_page_rank_symmetric_branches() {
        // Both branches out of n0 carry half of its mass.
        let graph = fixtures::diamond();
        let scores = PageRank::default().apply(&graph).unwrap();
        let (n1, n4) = (scores.get(1).unwrap(), scores.get(4).unwrap());
        assert!((n1 - n4).abs() < 1e-12);
    }

    #[test]
    fn test_page_rank_iteration_cap() {
        let page_rank = PageRank {
            max_iterations: 1,
            epsilon: 0.0,
            ..PageRank::default()
        };
        let scores = page_rank.apply(&fixtures::diamond()).unwrap();
        assert!(!scores.converged);
        assert_eq!(scores.iterations, 1);
    }

    #[test]
    fn test_kuehlmann_chain() {
        // P·s reaches the goal in one step, P²·s = 0. Every term of the
        // series is η^m at the goal, so r_goal = (1-η)/η · η(1-η^M)/(1-η)
        // = 1 - η^M.
        let graph = fixtures::single_step(8.0);
        let scores = Kuehlmann::default().apply(&graph).unwrap();
        let expected = 1.0 - 0.85f64.powi(100);
        assert!((scores.get(1).unwrap() - expected).abs() < 1e-12);
        assert_eq!(scores.get(0), Some(0.0));
    }

    #[test]
    fn test_kuehlmann_converges_in_max_m() {
        let graph = fixtures::diamond();
        let short = Kuehlmann { max_m: 60, ..Kuehlmann::default() };
        let long = Kuehlmann { max_m: 120, ..Kuehlmann::default() };
        let a = short.apply(&graph).unwrap();
        let b = long.apply(&graph).unwrap();
        for node in graph.node_ids() {
            let (x, y) = (a.get(node).unwrap(), b.get(node).unwrap());
            assert!((x - y).abs() < 1e-3, "node {node}: {x} vs {y}");
        }
    }

    #[test]
    fn test_kuehlmann_goal_score() {
        // The diamond reaches the goal in exactly 3 steps on either branch.
        let graph = fixtures::diamond();
        let score = Kuehlmann::default().score(&graph).unwrap();
        // Σ_m η^m for m >= 2, times (1-η)/η, is η.
        assert!((score - 0.85).abs() < 1e-6);
    }
}
