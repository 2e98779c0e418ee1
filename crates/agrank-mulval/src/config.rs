//! Configuration for MulVAL ingestion and random graph generation.

use serde::{Deserialize, Serialize};

use crate::error::{MulvalError, Result};

/// How MulVAL vertices are turned into store entries.
///
/// Loaded from `agrank.toml` `[ingest]` section or `AGRANK__INGEST__`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Severity given to AND vertices whose metric is outside `(0, 10]`.
    #[serde(default = "default_severity")]
    pub default_severity: f64,

    /// MulVAL id (1-indexed) of the goal vertex. When absent the sink
    /// proposition with the smallest id is used.
    #[serde(default)]
    pub goal_vertex: Option<usize>,
}

/// Random attack graph generator settings.
///
/// Loaded from `agrank.toml` `[generator]` section or `AGRANK__GENERATOR__`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Number of exploits in the generated graph.
    #[serde(default = "default_n_exploits")]
    pub n_exploits: usize,

    /// Relative weight of an exploit requiring 1, 2, 3, ... propositions.
    #[serde(default = "default_predecessor_weights")]
    pub predecessor_count_weights: Vec<f64>,

    /// Relative weight of a proposition enabling 1, 2, 3, ... exploits.
    #[serde(default = "default_successor_weights")]
    pub successor_count_weights: Vec<f64>,

    /// Chance that a required proposition is a fresh initial one rather than
    /// an existing proposition with spare capacity.
    #[serde(default = "default_probability_new_proposition")]
    pub probability_new_proposition: f64,

    /// Fixed seed for reproducible graphs.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_exploits == 0 {
            return Err(MulvalError::InvalidGenerator(
                "n_exploits must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.probability_new_proposition) {
            return Err(MulvalError::InvalidGenerator(format!(
                "probability_new_proposition must be in [0, 1], got {}",
                self.probability_new_proposition
            )));
        }
        for (name, weights) in [
            ("predecessor_count_weights", &self.predecessor_count_weights),
            ("successor_count_weights", &self.successor_count_weights),
        ] {
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
                || weights.iter().sum::<f64>() <= 0.0
            {
                return Err(MulvalError::InvalidGenerator(format!(
                    "{name} must hold non-negative weights with a positive sum"
                )));
            }
        }
        Ok(())
    }
}

fn default_severity() -> f64 {
    10.0
}

fn default_n_exploits() -> usize {
    30
}

fn default_predecessor_weights() -> Vec<f64> {
    vec![0.45, 0.30, 0.25]
}

fn default_successor_weights() -> Vec<f64> {
    vec![0.45, 0.35, 0.20]
}

fn default_probability_new_proposition() -> f64 {
    0.4
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            default_severity: default_severity(),
            goal_vertex: None,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n_exploits: default_n_exploits(),
            predecessor_count_weights: default_predecessor_weights(),
            successor_count_weights: default_successor_weights(),
            probability_new_proposition: default_probability_new_proposition(),
            seed: None,
        }
    }
}
