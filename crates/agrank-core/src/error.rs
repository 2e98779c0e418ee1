use thiserror::Error;

use crate::types::{ExploitId, PropositionId};

/// Top-level error type for the proposition/exploit store and configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Exploit {exploit} has no required propositions")]
    EmptyRequirements { exploit: ExploitId },

    #[error("Exploit {exploit} references unknown proposition {proposition}")]
    UnknownProposition {
        exploit: ExploitId,
        proposition: PropositionId,
    },

    #[error("Proposition {0} is already defined")]
    DuplicateProposition(PropositionId),

    #[error("Exploit {0} is already defined")]
    DuplicateExploit(ExploitId),

    #[error("Exploit {exploit} has severity {severity} outside [0, 10]")]
    InvalidSeverity { exploit: ExploitId, severity: f64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
