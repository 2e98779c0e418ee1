//! Ranking inputs and results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrank_core::ExploitId;
use agrank_graph::{GraphKind, NodeId, PrunableGraph};

/// The ranking methods the engine knows how to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    PageRank,
    Kuehlmann,
    ValueIteration,
    ProbabilisticPath,
    ExpectedPathLength,
    RiskQuantifier,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Self::PageRank,
        Self::Kuehlmann,
        Self::ValueIteration,
        Self::ProbabilisticPath,
        Self::ExpectedPathLength,
        Self::RiskQuantifier,
    ];

    /// Whether the method is defined on graphs of the given kind.
    pub fn supports(&self, kind: GraphKind) -> bool {
        match self {
            Self::ValueIteration => true,
            Self::RiskQuantifier => kind == GraphKind::Dependency,
            Self::PageRank | Self::Kuehlmann | Self::ProbabilisticPath | Self::ExpectedPathLength => {
                kind == GraphKind::State
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageRank => "page_rank",
            Self::Kuehlmann => "kuehlmann",
            Self::ValueIteration => "value_iteration",
            Self::ProbabilisticPath => "probabilistic_path",
            Self::ExpectedPathLength => "expected_path_length",
            Self::RiskQuantifier => "risk_quantifier",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "page_rank" | "pagerank" => Ok(Self::PageRank),
            "kuehlmann" => Ok(Self::Kuehlmann),
            "value_iteration" | "vi" => Ok(Self::ValueIteration),
            "probabilistic_path" => Ok(Self::ProbabilisticPath),
            "expected_path_length" => Ok(Self::ExpectedPathLength),
            "risk_quantifier" | "homer" => Ok(Self::RiskQuantifier),
            _ => Err(format!(
                "Invalid ranking method: {s}. Choose: page-rank, kuehlmann, value-iteration, \
                 probabilistic-path, expected-path-length, risk-quantifier"
            )),
        }
    }
}

/// Per-node output of a ranking method.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeScores {
    pub scores: BTreeMap<NodeId, f64>,
    /// Iterations of the method's main loop; 0 for closed-form methods.
    pub iterations: usize,
    /// False when the iteration cap stopped the loop.
    pub converged: bool,
}

impl NodeScores {
    pub fn get(&self, node: NodeId) -> Option<f64> {
        self.scores.get(&node).copied()
    }

    pub fn total<I>(&self, nodes: I) -> f64
    where
        I: IntoIterator<Item = NodeId>,
    {
        nodes.into_iter().filter_map(|n| self.get(n)).sum()
    }
}

/// One line of an exploit ranking. `exploit` is `None` for the baseline,
/// the score of the graph with nothing removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankEntry {
    pub exploit: Option<ExploitId>,
    /// Summary score of the graph without this exploit. Negative infinity
    /// (serialized as `null`) when removing it cuts every path to the goal.
    #[serde(with = "score_format")]
    pub score: f64,
    /// Zero-based ordinal rank; smaller means removing the exploit hurts the
    /// attacker more.
    pub rank: usize,
}

/// Exploits ordered by ascending summary score after their removal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExploitRanking {
    pub entries: Vec<RankEntry>,
}

impl ExploitRanking {
    pub fn baseline(&self) -> Option<&RankEntry> {
        self.entries.iter().find(|e| e.exploit.is_none())
    }

    pub fn rank_of(&self, exploit: ExploitId) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.exploit == Some(exploit))
            .map(|e| e.rank)
    }

    /// Exploits whose removal makes the goal unreachable.
    pub fn critical_exploits(&self) -> Vec<ExploitId> {
        self.entries
            .iter()
            .filter(|e| e.score == f64::NEG_INFINITY)
            .filter_map(|e| e.exploit)
            .collect()
    }
}

/// Size of the ranked graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphStats {
    pub kind: GraphKind,
    pub nodes: usize,
    pub edges: usize,
    pub exploits: usize,
    pub goal_nodes: usize,
}

impl GraphStats {
    pub fn of<G: PrunableGraph>(graph: &G) -> Self {
        Self {
            kind: graph.kind(),
            nodes: graph.number_of_nodes(),
            edges: graph.number_of_edges(),
            exploits: graph.exploit_ids().len(),
            goal_nodes: graph.goal_nodes().len(),
        }
    }
}

/// Result of running one method on one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoresReport {
    pub method: Method,
    pub graph_stats: GraphStats,
    pub node_scores: NodeScores,
    pub summary_score: f64,
    pub computation_ms: u64,
    pub computed_at: DateTime<Utc>,
}

/// Result of the incremental-removal exploit ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingReport {
    pub method: Method,
    pub graph_stats: GraphStats,
    pub ranking: ExploitRanking,
    pub computation_ms: u64,
    pub computed_at: DateTime<Utc>,
}

/// Pairwise disagreement between the exploit rankings of several methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub methods: Vec<Method>,
    /// `ppce_matrix[i][j]`: PPCE between `methods[i]` and `methods[j]`.
    pub ppce_matrix: Vec<Vec<f64>>,
    pub computation_ms: u64,
    pub computed_at: DateTime<Utc>,
}

/// Scores serialize as JSON numbers, with the unreachable-goal score `-inf`
/// written as `null`.
mod score_format {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if score.is_finite() {
            serializer.serialize_some(score)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("page-rank".parse::<Method>().unwrap(), Method::PageRank);
        assert_eq!("VI".parse::<Method>().unwrap(), Method::ValueIteration);
        assert_eq!("homer".parse::<Method>().unwrap(), Method::RiskQuantifier);
        assert!("dijkstra".parse::<Method>().is_err());
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
        }
    }

    #[test]
    fn test_method_capabilities() {
        assert!(Method::ValueIteration.supports(GraphKind::State));
        assert!(Method::ValueIteration.supports(GraphKind::Dependency));
        assert!(!Method::PageRank.supports(GraphKind::Dependency));
        assert!(!Method::RiskQuantifier.supports(GraphKind::State));
    }

    #[test]
    fn test_unreachable_score_round_trips_as_null() {
        let entry = RankEntry {
            exploit: Some(ExploitId(3)),
            score: f64::NEG_INFINITY,
            rank: 0,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"exploit":3,"score":null,"rank":0}"#);
        let back: RankEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_critical_exploits() {
        let ranking = ExploitRanking {
            entries: vec![
                RankEntry { exploit: Some(ExploitId(2)), score: f64::NEG_INFINITY, rank: 0 },
                RankEntry { exploit: Some(ExploitId(0)), score: 0.4, rank: 1 },
                RankEntry { exploit: None, score: 0.9, rank: 2 },
            ],
        };
        assert_eq!(ranking.critical_exploits(), vec![ExploitId(2)]);
        assert_eq!(ranking.baseline().unwrap().score, 0.9);
        assert_eq!(ranking.rank_of(ExploitId(0)), Some(1));
        assert_eq!(ranking.rank_of(ExploitId(7)), None);
    }
}
