//! Core domain types for attack graphs.
//!
//! A proposition is a fact that is either true or false (LEAF and OR
//! vertices of a MulVAL graph). An exploit is an action that requires a set
//! of true propositions and grants one more (AND vertices).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Ids ───────────────────────────────────────────────────────────

/// Identifier of a proposition in a [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PropositionId(pub usize);

/// Identifier of an exploit in a [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ExploitId(pub usize);

impl fmt::Display for PropositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ExploitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Propositions and exploits ─────────────────────────────────────

/// An atomic fact, e.g. "attacker has root on host X".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposition {
    pub id: PropositionId,
    pub text: String,
    /// True in the start state.
    pub initial: bool,
}

/// An action requiring a set of true propositions and granting a new one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exploit {
    pub id: ExploitId,
    pub text: String,
    pub required_propositions: BTreeSet<PropositionId>,
    pub granted_proposition: PropositionId,
    /// CVSS-like score in `[0, 10]`.
    pub severity: f64,
}

impl Exploit {
    /// Success probability used by the probabilistic ranking methods.
    pub fn probability(&self) -> f64 {
        self.severity / 10.0
    }

    /// Whether this exploit can be performed from the given set of true
    /// propositions: every requirement holds and the grant is still false.
    pub fn is_usable(&self, true_propositions: &BTreeSet<PropositionId>) -> bool {
        !true_propositions.contains(&self.granted_proposition)
            && self.required_propositions.is_subset(true_propositions)
    }
}

// ── Probability policy ────────────────────────────────────────────

/// How the success probabilities of several exploits labelling the same
/// transition combine into one transition probability.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityPolicy {
    /// The attacker uses the most likely exploit.
    #[default]
    Max,
    /// Probabilities are added; ranking methods normalize per source node.
    Sum,
    /// Exploits are attempted independently: `1 - Π(1 - p)`.
    IndependentOr,
}

impl ProbabilityPolicy {
    /// Combine exploit success probabilities. Returns 0 for an empty input.
    pub fn combine<I>(&self, probabilities: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        let mut iter = probabilities.into_iter().peekable();
        if iter.peek().is_none() {
            return 0.0;
        }
        match self {
            Self::Max => iter.fold(f64::NEG_INFINITY, f64::max),
            Self::Sum => iter.sum(),
            Self::IndependentOr => 1.0 - iter.map(|p| 1.0 - p).product::<f64>(),
        }
    }
}

impl std::str::FromStr for ProbabilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "max" => Ok(Self::Max),
            "sum" => Ok(Self::Sum),
            "independent_or" | "or" => Ok(Self::IndependentOr),
            _ => Err(format!(
                "Invalid probability policy: {s}. Choose: max, sum, independent-or"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exploit(required: &[usize], granted: usize) -> Exploit {
        Exploit {
            id: ExploitId(0),
            text: "test".to_string(),
            required_propositions: required.iter().map(|&p| PropositionId(p)).collect(),
            granted_proposition: PropositionId(granted),
            severity: 7.5,
        }
    }

    fn set(ids: &[usize]) -> BTreeSet<PropositionId> {
        ids.iter().map(|&p| PropositionId(p)).collect()
    }

    #[test]
    fn usable_requires_all_propositions() {
        let e = exploit(&[0, 1], 2);
        assert!(e.is_usable(&set(&[0, 1])));
        assert!(!e.is_usable(&set(&[0])));
    }

    #[test]
    fn usable_excludes_already_granted() {
        let e = exploit(&[0], 2);
        assert!(!e.is_usable(&set(&[0, 2])));
    }

    #[test]
    fn probability_is_severity_over_ten() {
        assert!((exploit(&[0], 1).probability() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn policy_combinations() {
        let ps = [0.5, 0.8];
        assert!((ProbabilityPolicy::Max.combine(ps) - 0.8).abs() < 1e-12);
        assert!((ProbabilityPolicy::Sum.combine(ps) - 1.3).abs() < 1e-12);
        assert!((ProbabilityPolicy::IndependentOr.combine(ps) - 0.9).abs() < 1e-12);
        assert_eq!(ProbabilityPolicy::Max.combine(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("max".parse::<ProbabilityPolicy>(), Ok(ProbabilityPolicy::Max));
        assert_eq!(
            "independent-or".parse::<ProbabilityPolicy>(),
            Ok(ProbabilityPolicy::IndependentOr)
        );
        assert!("median".parse::<ProbabilityPolicy>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&PropositionId(4)).unwrap();
        assert_eq!(json, "4");
    }
}
