//! Small attack graphs shared by the unit tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use agrank_core::{PropositionId, Store};
use agrank_graph::{DependencyGraph, StateGraph};

/// `initial` flags per proposition, then `(required, granted, severity)`.
pub fn store(initial: &[bool], exploit_specs: &[(&[usize], usize, f64)]) -> Arc<Store> {
    let mut store = Store::new();
    for (i, &init) in initial.iter().enumerate() {
        store.add_proposition(&format!("p{i}"), init);
    }
    for (i, (required, granted, severity)) in exploit_specs.iter().enumerate() {
        let required: BTreeSet<PropositionId> = required.iter().map(|&p| PropositionId(p)).collect();
        store
            .add_exploit(required, PropositionId(*granted), *severity, &format!("e{i}"))
            .unwrap();
    }
    Arc::new(store)
}

/// ```text
/// n0 {0,1} --e0--> n1 {0,1,2}
/// ```
pub fn single_step(severity: f64) -> StateGraph {
    let s = store(&[true, true, false], &[(&[0, 1], 2, severity)]);
    StateGraph::build(s, PropositionId(2)).unwrap()
}

/// ```text
/// n0 {0} --e0--> n1 {0,1} --e1--> n2 {0,1,2} --e2--> n3 {0,1,2,3}
/// n0 {0} --e1--> n4 {0,2} --e0--> n2
/// ```
/// with severities 9, 5 and 7.
pub fn diamond() -> StateGraph {
    StateGraph::build(diamond_store(), PropositionId(3)).unwrap()
}

pub fn diamond_store() -> Arc<Store> {
    store(
        &[true, false, false, false],
        &[(&[0], 1, 9.0), (&[0], 2, 5.0), (&[1, 2], 3, 7.0)],
    )
}

/// ```text
/// n0 {0} --e0 (0.6)--> n1 {0,1}          goal
/// n0 {0} --e1 (0.4)--> n2 {0,2} --e0--> n3 {0,1,2}  goal
/// ```
pub fn two_goals() -> StateGraph {
    let s = store(&[true, false, false], &[(&[0], 1, 6.0), (&[0], 2, 4.0)]);
    StateGraph::build(s, PropositionId(1)).unwrap()
}

/// Two exploits share the ancestor p1, and the goal needs both.
///
/// ```text
/// p0 -> e0 (0.5) -> p1 -> e1 (0.8) -> p2 \
///                      \-> e2 (0.6) -> p3 -> e3 (1.0) -> p4
/// ```
///
/// Nodes 0-4 are p0-p4, nodes 5-8 are e0-e3.
pub fn shared_ancestor() -> DependencyGraph {
    let s = store(
        &[true, false, false, false, false],
        &[(&[0], 1, 5.0), (&[1], 2, 8.0), (&[1], 3, 6.0), (&[2, 3], 4, 10.0)],
    );
    DependencyGraph::build(s, PropositionId(4)).unwrap()
}
