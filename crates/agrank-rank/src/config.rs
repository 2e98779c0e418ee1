//! Ranking method parameters.

use serde::{Deserialize, Serialize};

use agrank_core::config::{load_section, DEFAULT_ENV_PREFIX};
use agrank_core::ProbabilityPolicy;

use crate::error::Result;

/// Parameters shared by every ranking method.
///
/// Loaded from the `[ranking]` section of `agrank.toml` or from
/// `AGRANK__RANKING__` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// PageRank damping factor.
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// PageRank convergence threshold on the L2 distance between iterates.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Kuehlmann discount.
    #[serde(default = "default_eta")]
    pub eta: f64,

    /// Number of terms of the Kuehlmann power series.
    #[serde(default = "default_max_m")]
    pub max_m: usize,

    /// Value iteration convergence threshold.
    #[serde(default = "default_precision")]
    pub precision: f64,

    /// Value iteration discount.
    #[serde(default = "default_lambda")]
    pub lambda: f64,

    /// The fundamental matrix series stops once `sum(Q^i)` falls to this.
    #[serde(default = "default_absorption_threshold")]
    pub absorption_threshold: f64,

    /// Cap on every fixed-point loop.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// How exploits sharing a state graph edge combine.
    #[serde(default)]
    pub probability_policy: ProbabilityPolicy,

    /// Score pruned graphs on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl RankingConfig {
    /// Read the `[ranking]` section from `<file_prefix>.toml` and the
    /// environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        Ok(load_section(file_prefix, DEFAULT_ENV_PREFIX, "ranking")?)
    }
}

fn default_damping() -> f64 {
    0.85
}

fn default_epsilon() -> f64 {
    1e-4
}

fn default_eta() -> f64 {
    0.85
}

fn default_max_m() -> usize {
    100
}

fn default_precision() -> f64 {
    1e-4
}

fn default_lambda() -> f64 {
    0.9
}

fn default_absorption_threshold() -> f64 {
    1e-15
}

fn default_max_iterations() -> usize {
    10_000
}

fn default_parallel() -> bool {
    true
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            epsilon: default_epsilon(),
            eta: default_eta(),
            max_m: default_max_m(),
            precision: default_precision(),
            lambda: default_lambda(),
            absorption_threshold: default_absorption_threshold(),
            max_iterations: default_max_iterations(),
            probability_policy: ProbabilityPolicy::default(),
            parallel: default_parallel(),
        }
    }
}
