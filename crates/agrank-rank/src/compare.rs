//! Percentage of pairwise comparison errors (PPCE) between exploit rankings.
//!
//! Two rankings disagree on a pair of entries when they order the pair
//! differently. The PPCE is the share of pairs they disagree on.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use agrank_core::ExploitId;

use crate::error::{RankError, Result};
use crate::types::ExploitRanking;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairwiseErrors {
    pub pairs: usize,
    pub discordant_pairs: usize,
    pub ppce: f64,
}

fn ranks(ranking: &ExploitRanking) -> BTreeMap<Option<ExploitId>, usize> {
    ranking.entries.iter().map(|e| (e.exploit, e.rank)).collect()
}

/// Compare two rankings over the same entries, baseline included.
pub fn pairwise_errors(a: &ExploitRanking, b: &ExploitRanking) -> Result<PairwiseErrors> {
    let (ranks_a, ranks_b) = (ranks(a), ranks(b));
    if !ranks_a.keys().eq(ranks_b.keys()) {
        return Err(RankError::MismatchedRankings);
    }

    let entries: Vec<(usize, usize)> = ranks_a
        .iter()
        .map(|(key, &rank_a)| (rank_a, ranks_b[key]))
        .collect();
    let mut pairs = 0;
    let mut discordant_pairs = 0;
    for (i, &(a0, b0)) in entries.iter().enumerate() {
        for &(a1, b1) in &entries[i + 1..] {
            pairs += 1;
            if (a0 < a1) != (b0 < b1) {
                discordant_pairs += 1;
            }
        }
    }

    let ppce = if pairs == 0 {
        0.0
    } else {
        discordant_pairs as f64 / pairs as f64
    };
    Ok(PairwiseErrors {
        pairs,
        discordant_pairs,
        ppce,
    })
}

/// Symmetric matrix of PPCE values, zero on the diagonal.
pub fn ppce_matrix(rankings: &[ExploitRanking]) -> Result<Array2<f64>> {
    let n = rankings.len();
    let mut matrix = Array2::zeros((n, n));
    for i in 0..n {
        for j in i + 1..n {
            let ppce = pairwise_errors(&rankings[i], &rankings[j])?.ppce;
            matrix[[i, j]] = ppce;
            matrix[[j, i]] = ppce;
        }
    }
    Ok(matrix)
}
