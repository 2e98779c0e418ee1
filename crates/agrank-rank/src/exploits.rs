//! Exploit prioritization by incremental removal.
//!
//! Each exploit is removed in turn, the graph is pruned, and the ranking
//! method's summary score is recomputed. Exploits whose removal lowers the
//! score the most come first. An exploit without which the goal cannot be
//! reached scores negative infinity.

use std::collections::BTreeSet;

use rayon::prelude::*;

use agrank_core::ExploitId;
use agrank_graph::PrunableGraph;

use crate::error::Result;
use crate::method::RankingMethod;
use crate::types::{ExploitRanking, RankEntry};

/// Summary score of `graph` pruned to every exploit but `removed`.
pub fn score_without<G, M>(method: &M, graph: &G, removed: ExploitId) -> Result<f64>
where
    G: PrunableGraph,
    M: RankingMethod<G> + ?Sized,
{
    let keep: BTreeSet<ExploitId> = graph
        .exploit_ids()
        .into_iter()
        .filter(|&e| e != removed)
        .collect();
    let pruned = graph.get_pruned_graph(&keep);
    if !pruned.reaches_goal() {
        tracing::debug!(exploit = %removed, "Goal unreachable without exploit");
        return Ok(f64::NEG_INFINITY);
    }
    method.score(&pruned)
}

/// Rank every exploit of the store behind `graph`, together with the
/// unmodified baseline. An exploit that labels no transition scores the
/// same as the baseline.
///
/// With `parallel` set, pruned graphs are scored on the rayon pool. The
/// result does not depend on it.
pub fn rank_exploits<G, M>(method: &M, graph: &G, parallel: bool) -> Result<ExploitRanking>
where
    G: PrunableGraph + Sync,
    M: RankingMethod<G> + ?Sized,
{
    let baseline = method.score(graph)?;
    let exploits: Vec<ExploitId> = graph.store().exploit_ids().into_iter().collect();

    let scores: Vec<f64> = if parallel {
        exploits
            .par_iter()
            .map(|&e| score_without(method, graph, e))
            .collect::<Result<_>>()?
    } else {
        exploits
            .iter()
            .map(|&e| score_without(method, graph, e))
            .collect::<Result<_>>()?
    };

    let candidates: Vec<(Option<ExploitId>, f64)> = std::iter::once((None, baseline))
        .chain(exploits.iter().map(|&e| Some(e)).zip(scores))
        .collect();
    let ranking = ordinal_ranking(candidates);

    tracing::info!(
        method = method.name(),
        exploits = exploits.len(),
        critical = ranking.critical_exploits().len(),
        baseline,
        "Exploits ranked"
    );
    Ok(ranking)
}

/// Sort ascending by score, ties keeping input order, and number the
/// entries from 0.
pub fn ordinal_ranking(candidates: Vec<(Option<ExploitId>, f64)>) -> ExploitRanking {
    let mut indexed: Vec<(usize, Option<ExploitId>, f64)> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, (exploit, score))| (i, exploit, score))
        .collect();
    indexed.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));

    ExploitRanking {
        entries: indexed
            .into_iter()
            .enumerate()
            .map(|(rank, (_, exploit, score))| RankEntry {
                exploit,
                score,
                rank,
            })
            .collect(),
    }
}
