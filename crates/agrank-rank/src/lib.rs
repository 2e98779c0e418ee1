//! agrank-rank: ranking methods for attack graphs and exploit prioritization.
//!
//! Node ranking methods score how exposed each node of a state or dependency
//! graph is. The incremental-removal driver turns any of them into an
//! exploit ranking: the exploits whose removal hurts the attacker most come
//! first.

pub mod absorbing;
pub mod compare;
pub mod config;
pub mod error;
pub mod exploits;
pub mod homer;
pub mod mehta;
pub mod method;
pub mod types;
pub mod value_iteration;

#[cfg(test)]
mod fixtures;

pub use config::RankingConfig;
pub use error::{RankError, Result};
pub use method::RankingMethod;
pub use types::{
    ComparisonReport, ExploitRanking, GraphStats, Method, NodeScores, RankEntry, RankingReport,
    ScoresReport,
};

use std::time::Instant;

use chrono::Utc;

use agrank_graph::{AnyGraph, DependencyGraph, GraphView, PrunableGraph, StateGraph};

use crate::absorbing::{ExpectedPathLength, ProbabilisticPath};
use crate::homer::RiskQuantifier;
use crate::mehta::{Kuehlmann, PageRank};
use crate::value_iteration::ValueIteration;

/// Runs ranking methods on persisted or freshly built graphs.
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    /// Create an engine with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom ranking parameters.
    pub fn with_config(mut self, config: RankingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// The method as applied to state graphs, if it applies to them.
    pub fn state_method(&self, method: Method) -> Option<Box<dyn RankingMethod<StateGraph>>> {
        let config = &self.config;
        match method {
            Method::PageRank => Some(Box::new(PageRank::new(config))),
            Method::Kuehlmann => Some(Box::new(Kuehlmann::new(config))),
            Method::ValueIteration => Some(Box::new(ValueIteration::new(config))),
            Method::ProbabilisticPath => Some(Box::new(ProbabilisticPath::new(config))),
            Method::ExpectedPathLength => Some(Box::new(ExpectedPathLength::new(config))),
            Method::RiskQuantifier => None,
        }
    }

    /// The method as applied to dependency graphs, if it applies to them.
    pub fn dependency_method(
        &self,
        method: Method,
    ) -> Option<Box<dyn RankingMethod<DependencyGraph>>> {
        match method {
            Method::ValueIteration => Some(Box::new(ValueIteration::new(&self.config))),
            Method::RiskQuantifier => Some(Box::new(RiskQuantifier)),
            Method::PageRank
            | Method::Kuehlmann
            | Method::ProbabilisticPath
            | Method::ExpectedPathLength => None,
        }
    }

    /// Score every node of `graph` with `method`.
    pub fn node_scores(&self, method: Method, graph: &AnyGraph) -> Result<ScoresReport> {
        let start = Instant::now();
        let unsupported = || unsupported_graph(method, graph);
        let (node_scores, summary_score) = match graph {
            AnyGraph::State(g) => {
                let m = self.state_method(method).ok_or_else(unsupported)?;
                scores_and_summary(&*m, g)?
            }
            AnyGraph::Dependency(g) => {
                let m = self.dependency_method(method).ok_or_else(unsupported)?;
                scores_and_summary(&*m, g)?
            }
        };

        let computation_ms = start.elapsed().as_millis() as u64;
        tracing::info!(%method, summary_score, computation_ms, "Node scores computed");
        Ok(ScoresReport {
            method,
            graph_stats: GraphStats::of(graph),
            node_scores,
            summary_score,
            computation_ms,
            computed_at: Utc::now(),
        })
    }

    /// Rank the exploits of `graph` by incremental removal.
    pub fn rank(&self, method: Method, graph: &AnyGraph) -> Result<RankingReport> {
        let start = Instant::now();
        let parallel = self.config.parallel;
        let unsupported = || unsupported_graph(method, graph);
        let ranking = match graph {
            AnyGraph::State(g) => {
                let m = self.state_method(method).ok_or_else(unsupported)?;
                exploits::rank_exploits(&*m, g, parallel)?
            }
            AnyGraph::Dependency(g) => {
                let m = self.dependency_method(method).ok_or_else(unsupported)?;
                exploits::rank_exploits(&*m, g, parallel)?
            }
        };

        Ok(RankingReport {
            method,
            graph_stats: GraphStats::of(graph),
            ranking,
            computation_ms: start.elapsed().as_millis() as u64,
            computed_at: Utc::now(),
        })
    }

    /// Rank exploits with every method and compare the rankings pairwise.
    ///
    /// Each method runs on the first of `graphs` it applies to. All graphs
    /// should be built from the same store so the rankings cover the same
    /// exploits.
    pub fn compare(&self, methods: &[Method], graphs: &[AnyGraph]) -> Result<ComparisonReport> {
        let start = Instant::now();
        let mut rankings = Vec::with_capacity(methods.len());
        for &method in methods {
            let graph = graphs
                .iter()
                .find(|g| method.supports(g.kind()))
                .ok_or_else(|| RankError::UnsupportedGraph {
                    method: method.to_string(),
                    kind: graphs.first().map_or(agrank_graph::GraphKind::State, |g| g.kind()),
                })?;
            rankings.push(self.rank(method, graph)?.ranking);
        }

        let matrix = compare::ppce_matrix(&rankings)?;
        Ok(ComparisonReport {
            methods: methods.to_vec(),
            ppce_matrix: matrix.outer_iter().map(|row| row.to_vec()).collect(),
            computation_ms: start.elapsed().as_millis() as u64,
            computed_at: Utc::now(),
        })
    }
}

fn unsupported_graph(method: Method, graph: &AnyGraph) -> RankError {
    RankError::UnsupportedGraph {
        method: method.to_string(),
        kind: graph.kind(),
    }
}

fn scores_and_summary<G, M>(method: &M, graph: &G) -> Result<(NodeScores, f64)>
where
    G: PrunableGraph,
    M: RankingMethod<G> + ?Sized,
{
    let scores = method.apply(graph)?;
    let summary = method.summarize(graph, &scores)?;
    Ok((scores, summary))
}
