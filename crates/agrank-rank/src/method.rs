//! The interface every ranking method implements.

use agrank_graph::PrunableGraph;

use crate::error::Result;
use crate::types::NodeScores;

/// A ranking method over graphs of type `G`.
///
/// `summarize` reduces the per-node output of `apply` to the single number
/// the incremental-removal driver compares across pruned graphs.
/// Implementors must be `Sync` so the driver can score pruned graphs
/// concurrently.
pub trait RankingMethod<G: PrunableGraph>: Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, graph: &G) -> Result<NodeScores>;

    fn summarize(&self, graph: &G, scores: &NodeScores) -> Result<f64>;

    fn score(&self, graph: &G) -> Result<f64> {
        self.summarize(graph, &self.apply(graph)?)
    }
}
