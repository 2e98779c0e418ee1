//! The proposition/exploit store: a flat, additive table that every attack
//! graph variant is derived from.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{Exploit, ExploitId, Proposition, PropositionId};

/// Propositions and exploits keyed by id.
///
/// Ids handed out by [`Store::add_proposition`] and [`Store::add_exploit`]
/// increase monotonically. Explicit-id insertion (used by adapters that keep
/// external vertex ids) advances the counters past the inserted id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    propositions: BTreeMap<PropositionId, Proposition>,
    exploits: BTreeMap<ExploitId, Exploit>,
    next_proposition: usize,
    next_exploit: usize,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a proposition with the next free id.
    pub fn add_proposition(&mut self, text: &str, initial: bool) -> PropositionId {
        let id = PropositionId(self.next_proposition);
        self.next_proposition += 1;
        self.propositions.insert(
            id,
            Proposition {
                id,
                text: text.to_string(),
                initial,
            },
        );
        id
    }

    /// Add an exploit with the next free id.
    ///
    /// Fails if `required` is empty or references a proposition that is not in
    /// the store, or if the severity is outside `[0, 10]`.
    pub fn add_exploit(
        &mut self,
        required: BTreeSet<PropositionId>,
        granted: PropositionId,
        severity: f64,
        text: &str,
    ) -> Result<ExploitId> {
        let id = ExploitId(self.next_exploit);
        self.insert_exploit(Exploit {
            id,
            text: text.to_string(),
            required_propositions: required,
            granted_proposition: granted,
            severity,
        })?;
        Ok(id)
    }

    /// Insert a proposition keeping its id.
    pub fn insert_proposition(&mut self, proposition: Proposition) -> Result<()> {
        if self.propositions.contains_key(&proposition.id) {
            return Err(CoreError::DuplicateProposition(proposition.id));
        }
        self.next_proposition = self.next_proposition.max(proposition.id.0 + 1);
        self.propositions.insert(proposition.id, proposition);
        Ok(())
    }

    /// Insert an exploit keeping its id. Its propositions must already exist.
    pub fn insert_exploit(&mut self, exploit: Exploit) -> Result<()> {
        if self.exploits.contains_key(&exploit.id) {
            return Err(CoreError::DuplicateExploit(exploit.id));
        }
        self.validate_exploit(&exploit)?;
        self.next_exploit = self.next_exploit.max(exploit.id.0 + 1);
        self.exploits.insert(exploit.id, exploit);
        Ok(())
    }

    pub fn proposition(&self, id: PropositionId) -> Option<&Proposition> {
        self.propositions.get(&id)
    }

    pub fn exploit(&self, id: ExploitId) -> Option<&Exploit> {
        self.exploits.get(&id)
    }

    pub fn propositions(&self) -> impl Iterator<Item = &Proposition> {
        self.propositions.values()
    }

    pub fn exploits(&self) -> impl Iterator<Item = &Exploit> {
        self.exploits.values()
    }

    pub fn exploit_ids(&self) -> BTreeSet<ExploitId> {
        self.exploits.keys().copied().collect()
    }

    pub fn contains_proposition(&self, id: PropositionId) -> bool {
        self.propositions.contains_key(&id)
    }

    /// The propositions flagged as true in the start state.
    pub fn initial_propositions(&self) -> BTreeSet<PropositionId> {
        self.propositions
            .values()
            .filter(|p| p.initial)
            .map(|p| p.id)
            .collect()
    }

    pub fn proposition_count(&self) -> usize {
        self.propositions.len()
    }

    pub fn exploit_count(&self) -> usize {
        self.exploits.len()
    }

    /// Re-check every exploit against the store invariants.
    pub fn validate(&self) -> Result<()> {
        self.exploits
            .values()
            .try_for_each(|exploit| self.validate_exploit(exploit))
    }

    fn validate_exploit(&self, exploit: &Exploit) -> Result<()> {
        if exploit.required_propositions.is_empty() {
            return Err(CoreError::EmptyRequirements {
                exploit: exploit.id,
            });
        }
        if !(0.0..=10.0).contains(&exploit.severity) {
            return Err(CoreError::InvalidSeverity {
                exploit: exploit.id,
                severity: exploit.severity,
            });
        }
        let referenced = exploit
            .required_propositions
            .iter()
            .chain(std::iter::once(&exploit.granted_proposition));
        for &proposition in referenced {
            if !self.propositions.contains_key(&proposition) {
                return Err(CoreError::UnknownProposition {
                    exploit: exploit.id,
                    proposition,
                });
            }
        }
        Ok(())
    }
}

/// Flat serialized form: two lists, so that ids survive a JSON round trip
/// without relying on stringified map keys.
#[derive(Serialize, Deserialize)]
struct StoreRecord {
    propositions: Vec<Proposition>,
    exploits: Vec<Exploit>,
}

impl Serialize for Store {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        StoreRecord {
            propositions: self.propositions.values().cloned().collect(),
            exploits: self.exploits.values().cloned().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Store {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = StoreRecord::deserialize(deserializer)?;
        Store::try_from_parts(record.propositions, record.exploits).map_err(serde::de::Error::custom)
    }
}

impl Store {
    /// Build a store from explicit lists, validating every exploit.
    pub fn try_from_parts(propositions: Vec<Proposition>, exploits: Vec<Exploit>) -> Result<Self> {
        let mut store = Store::new();
        for proposition in propositions {
            store.insert_proposition(proposition)?;
        }
        for exploit in exploits {
            store.insert_exploit(exploit)?;
        }
        Ok(store)
    }
}
