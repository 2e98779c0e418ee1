//! Random attack graph generation.
//!
//! Exploits are added one at a time. Each one requires a sampled number of
//! propositions, either fresh initial ones or existing propositions that still
//! have room for another consumer, and grants a fresh proposition. Once all
//! exploits exist, every proposition nothing depends on is merged into one
//! goal proposition.

use std::collections::BTreeSet;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use agrank_core::{PropositionId, Store};

use crate::config::GeneratorConfig;
use crate::error::{MulvalError, Result};
use crate::AttackInput;

pub struct Generator {
    config: GeneratorConfig,
    rng: StdRng,
    predecessor_counts: WeightedIndex<f64>,
    successor_counts: WeightedIndex<f64>,
}

/// A proposition of the graph under construction.
struct DraftProposition {
    initial: bool,
    /// Number of exploits allowed to require this proposition.
    capacity: usize,
    consumers: usize,
    producers: Vec<usize>,
    merged: bool,
}

struct DraftExploit {
    required: Vec<usize>,
    granted: usize,
}

#[derive(Default)]
struct Draft {
    propositions: Vec<DraftProposition>,
    exploits: Vec<DraftExploit>,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let weights = |w: &[f64]| {
            WeightedIndex::new(w.iter().copied())
                .map_err(|e| MulvalError::InvalidGenerator(e.to_string()))
        };
        let predecessor_counts = weights(&config.predecessor_count_weights)?;
        let successor_counts = weights(&config.successor_count_weights)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng,
            predecessor_counts,
            successor_counts,
        })
    }

    /// Generate a fresh store and its goal proposition.
    pub fn generate(&mut self) -> Result<AttackInput> {
        let mut draft = Draft::default();
        let mut probability_new = self.config.probability_new_proposition;

        while draft.exploits.len() < self.config.n_exploits {
            let mut available = draft.available();
            let remaining = self.config.n_exploits - draft.exploits.len();
            // Enough open slots to finish: stop creating propositions for good.
            if available.len() >= remaining {
                probability_new = 0.0;
            }

            let n_required = self.predecessor_counts.sample(&mut self.rng) + 1;
            let mut required = Vec::with_capacity(n_required);
            for _ in 0..n_required {
                let fresh = self.rng.gen::<f64>() < probability_new;
                let proposition = if fresh || available.is_empty() {
                    self.add_proposition(&mut draft, true)
                } else {
                    available.remove(self.rng.gen_range(0..available.len()))
                };
                draft.propositions[proposition].consumers += 1;
                required.push(proposition);
            }

            let granted = self.add_proposition(&mut draft, false);
            draft.propositions[granted].producers.push(draft.exploits.len());
            draft.exploits.push(DraftExploit { required, granted });
        }

        let goal = draft.merge_sinks()?;
        self.finish(draft, goal)
    }

    fn add_proposition(&mut self, draft: &mut Draft, initial: bool) -> usize {
        let capacity = self.successor_counts.sample(&mut self.rng) + 1;
        draft.propositions.push(DraftProposition {
            initial,
            capacity,
            consumers: 0,
            producers: Vec::new(),
            merged: false,
        });
        draft.propositions.len() - 1
    }

    /// Renumber the surviving propositions and synthesize exploit data.
    fn finish(&mut self, draft: Draft, goal: usize) -> Result<AttackInput> {
        let mut store = Store::new();
        let mut ids: Vec<Option<PropositionId>> = Vec::with_capacity(draft.propositions.len());
        for proposition in &draft.propositions {
            ids.push((!proposition.merged).then(|| {
                let id = PropositionId(store.proposition_count());
                store.add_proposition(&format!("Randomly generated {id}"), proposition.initial)
            }));
        }
        let id_of = |index: usize| {
            ids[index].ok_or_else(|| {
                MulvalError::InvalidGenerator(format!("merged proposition {index} still referenced"))
            })
        };

        for exploit in &draft.exploits {
            let required: BTreeSet<PropositionId> = exploit
                .required
                .iter()
                .map(|&p| id_of(p))
                .collect::<Result<_>>()?;
            let cve = self.rng.gen_range(1..=9999);
            let severity = f64::from(self.rng.gen_range(1u32..=100)) / 10.0;
            store.add_exploit(
                required,
                id_of(exploit.granted)?,
                severity,
                &format!("CVE-2020-{cve:04} (generated)"),
            )?;
        }

        let goal_proposition = id_of(goal)?;
        tracing::info!(
            propositions = store.proposition_count(),
            exploits = store.exploit_count(),
            goal = %goal_proposition,
            "Random attack graph generated"
        );
        Ok(AttackInput::new(store, goal_proposition))
    }
}

impl Draft {
    /// Propositions that can still be required by another exploit, in
    /// creation order.
    fn available(&self) -> Vec<usize> {
        self.propositions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.consumers < p.capacity)
            .map(|(i, _)| i)
            .collect()
    }

    /// Redirect every exploit granting a consumer-less proposition to the
    /// first such proposition, which becomes the goal.
    fn merge_sinks(&mut self) -> Result<usize> {
        let sinks: Vec<usize> = self
            .propositions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.consumers == 0)
            .map(|(i, _)| i)
            .collect();
        let (&goal, rest) = sinks.split_first().ok_or(MulvalError::NoGoalProposition)?;

        for &sink in rest {
            let producers = std::mem::take(&mut self.propositions[sink].producers);
            for &exploit in &producers {
                self.exploits[exploit].granted = goal;
            }
            self.propositions[goal].producers.extend(producers);
            self.propositions[sink].merged = true;
        }
        tracing::debug!(merged = rest.len(), "Sink propositions merged into the goal");
        Ok(goal)
    }
}
