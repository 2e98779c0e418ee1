//! agrank-mulval: Inputs for the agrank attack graph builders.
//!
//! Two ways to obtain a proposition/exploit store and its goal:
//! - Ingest a MulVAL `AttackGraph.xml` (LEAF and OR vertices become
//!   propositions, AND vertices become exploits)
//! - Generate a random dependency structure with a configurable shape

pub mod config;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod mulval_xml;

use std::sync::Arc;

use agrank_core::{PropositionId, Store};
use agrank_graph::{DependencyGraph, StateGraph};

pub use config::{GeneratorConfig, IngestOptions};
pub use error::{MulvalError, Result};
pub use generate::Generator;
pub use ingest::{ingest, load_mulval};

/// A populated store together with the proposition the attacker is after.
#[derive(Debug, Clone)]
pub struct AttackInput {
    pub store: Arc<Store>,
    pub goal_proposition: PropositionId,
}

impl AttackInput {
    pub fn new(store: Store, goal_proposition: PropositionId) -> Self {
        Self {
            store: Arc::new(store),
            goal_proposition,
        }
    }

    /// Expand the state space, optionally capped at `limit` states.
    pub fn state_graph(&self, limit: Option<usize>) -> Result<StateGraph> {
        Ok(StateGraph::build_with_limit(
            Arc::clone(&self.store),
            self.goal_proposition,
            limit,
        )?)
    }

    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        Ok(DependencyGraph::build(
            Arc::clone(&self.store),
            self.goal_proposition,
        )?)
    }
}
