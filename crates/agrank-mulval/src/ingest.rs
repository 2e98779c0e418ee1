//! Conversion of a parsed MulVAL graph into a proposition/exploit store.
//!
//! LEAF vertices become initial propositions, OR vertices non-initial
//! propositions, and AND vertices exploits. MulVAL arcs point from a derived
//! fact to its reasons, so they are reversed: an exploit requires the facts
//! its AND vertex points to and grants the single fact pointing at it.
//! Store ids are the MulVAL ids minus one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use agrank_core::{Exploit, ExploitId, Proposition, PropositionId, Store};

use crate::config::IngestOptions;
use crate::error::{MulvalError, Result};
use crate::mulval_xml::{parse_mulval_xml, MulvalGraph, Vertex, VertexKind};
use crate::AttackInput;

/// Read and ingest a MulVAL `AttackGraph.xml` file.
pub fn load_mulval(path: &Path, options: &IngestOptions) -> Result<AttackInput> {
    let xml = std::fs::read(path)?;
    let graph = parse_mulval_xml(&xml)?;
    tracing::debug!(
        path = %path.display(),
        vertices = graph.vertex_count(),
        arcs = graph.arc_count(),
        "MulVAL XML parsed"
    );
    ingest(&graph, options)
}

pub fn ingest(graph: &MulvalGraph, options: &IngestOptions) -> Result<AttackInput> {
    let mut vertices: BTreeMap<usize, (VertexKind, &Vertex)> = BTreeMap::new();
    for vertex in &graph.vertices.vertices {
        if vertex.id == 0 {
            return Err(MulvalError::ZeroVertexId);
        }
        if vertices.insert(vertex.id, (vertex.kind()?, vertex)).is_some() {
            return Err(MulvalError::DuplicateVertex(vertex.id));
        }
    }

    // Attack flow runs dst -> src.
    let mut flow_predecessors: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut flow_successors: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for arc in &graph.arcs.arcs {
        let (from, to) = (arc.dst, arc.src);
        let from_kind = vertices.get(&from).ok_or(MulvalError::UnknownVertex(from))?.0;
        let to_kind = vertices.get(&to).ok_or(MulvalError::UnknownVertex(to))?.0;
        if (from_kind == VertexKind::And) == (to_kind == VertexKind::And) {
            return Err(MulvalError::MalformedArc {
                src: arc.src,
                dst: arc.dst,
            });
        }
        flow_predecessors.entry(to).or_default().insert(from);
        flow_successors.entry(from).or_default().insert(to);
    }

    let mut store = Store::new();
    for (&id, &(kind, vertex)) in &vertices {
        if kind != VertexKind::And {
            store.insert_proposition(Proposition {
                id: PropositionId(id - 1),
                text: vertex.fact.clone(),
                initial: kind == VertexKind::Leaf,
            })?;
        }
    }

    let mut defaulted = 0usize;
    for (&id, &(kind, vertex)) in &vertices {
        if kind != VertexKind::And {
            continue;
        }
        let granted = match flow_successors.get(&id) {
            Some(successors) if successors.len() == 1 => successors.iter().next().copied(),
            _ => None,
        };
        let Some(granted) = granted else {
            return Err(MulvalError::AmbiguousGrant {
                vertex: id,
                successors: flow_successors.get(&id).map_or(0, BTreeSet::len),
            });
        };
        let required = flow_predecessors
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&p| PropositionId(p - 1))
            .collect();
        let severity = vertex.severity().unwrap_or_else(|| {
            defaulted += 1;
            options.default_severity
        });
        store.insert_exploit(Exploit {
            id: ExploitId(id - 1),
            text: vertex.fact.clone(),
            required_propositions: required,
            granted_proposition: PropositionId(granted - 1),
            severity,
        })?;
    }

    let goal_proposition = match options.goal_vertex {
        Some(goal) => match vertices.get(&goal) {
            Some((kind, _)) if *kind != VertexKind::And => PropositionId(goal - 1),
            _ => return Err(MulvalError::InvalidGoal(goal)),
        },
        None => find_goal(&vertices, &flow_successors)?,
    };

    tracing::info!(
        propositions = store.proposition_count(),
        exploits = store.exploit_count(),
        default_severity_used = defaulted,
        goal = %goal_proposition,
        "MulVAL graph ingested"
    );

    Ok(AttackInput::new(store, goal_proposition))
}

/// The derived fact nothing else depends on. MulVAL puts the attack goal at
/// the root of its graph, so there is normally exactly one.
fn find_goal(
    vertices: &BTreeMap<usize, (VertexKind, &Vertex)>,
    flow_successors: &BTreeMap<usize, BTreeSet<usize>>,
) -> Result<PropositionId> {
    let sinks: Vec<usize> = vertices
        .iter()
        .filter(|(id, (kind, _))| *kind == VertexKind::Or && !flow_successors.contains_key(*id))
        .map(|(&id, _)| id)
        .collect();

    let Some(&goal) = sinks.first() else {
        return Err(MulvalError::NoGoalProposition);
    };
    if sinks.len() > 1 {
        tracing::warn!(
            candidates = ?sinks,
            chosen = goal,
            "Several MulVAL facts could be the goal; using the smallest vertex id"
        );
    }
    Ok(PropositionId(goal - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrank_graph::{GraphView, PrunableGraph};

    /// Goal (1) needs rule 2 (needs 3, 4) or rule 5 (needs 4, 6).
    const TWO_RULES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<attack_graph>
  <arcs>
    <arc><src>1</src><dst>2</dst></arc>
    <arc><src>2</src><dst>3</dst></arc>
    <arc><src>2</src><dst>4</dst></arc>
    <arc><src>1</src><dst>5</dst></arc>
    <arc><src>5</src><dst>4</dst></arc>
    <arc><src>5</src><dst>6</dst></arc>
  </arcs>
  <vertices>
    <vertex><id>1</id><fact>execCode(db,root)</fact><metric>0</metric><type>OR</type></vertex>
    <vertex><id>2</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>9.8</metric><type>AND</type></vertex>
    <vertex><id>3</id><fact>vulExists(db,'CVE-2021-44228',log4j,remoteExploit,privEscalation)</fact><metric>0</metric><type>LEAF</type></vertex>
    <vertex><id>4</id><fact>netAccess(db,tcp,8080)</fact><metric>0</metric><type>LEAF</type></vertex>
    <vertex><id>5</id><fact>RULE 6 (weak password)</fact><metric>0</metric><type>AND</type></vertex>
    <vertex><id>6</id><fact>weakPassword(db,admin)</fact><metric>0</metric><type>LEAF</type></vertex>
  </vertices>
</attack_graph>"#;

    fn parse(xml: &str) -> MulvalGraph {
        parse_mulval_xml(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_ingest_two_rules() {
        let input = ingest(&parse(TWO_RULES_XML), &IngestOptions::default()).unwrap();
        let store = &input.store;

        assert_eq!(input.goal_proposition, PropositionId(0));
        assert_eq!(store.proposition_count(), 4);
        assert_eq!(store.exploit_count(), 2);
        assert_eq!(
            store.initial_propositions(),
            BTreeSet::from([PropositionId(2), PropositionId(3), PropositionId(5)])
        );

        let rule = store.exploit(ExploitId(1)).unwrap();
        assert_eq!(
            rule.required_propositions,
            BTreeSet::from([PropositionId(2), PropositionId(3)])
        );
        assert_eq!(rule.granted_proposition, PropositionId(0));
        assert_eq!(rule.severity, 9.8);

        // Metric 0 falls back to the default severity.
        assert_eq!(store.exploit(ExploitId(4)).unwrap().severity, 10.0);
    }

    #[test]
    fn test_ingested_store_builds_graphs() {
        let input = ingest(&parse(TWO_RULES_XML), &IngestOptions::default()).unwrap();

        let state = input.state_graph(None).unwrap();
        // Both rules lead from the initial state to the same goal state.
        assert_eq!(state.number_of_nodes(), 2);
        assert_eq!(state.number_of_edges(), 1);
        assert_eq!(state.exploit_ids().len(), 2);

        let dependency = input.dependency_graph().unwrap();
        assert_eq!(dependency.number_of_nodes(), 6);
        assert_eq!(dependency.number_of_edges(), 6);
    }

    #[test]
    fn test_ambiguous_grant() {
        let xml = r#"<attack_graph>
  <arcs>
    <arc><src>1</src><dst>2</dst></arc>
    <arc><src>3</src><dst>2</dst></arc>
    <arc><src>2</src><dst>4</dst></arc>
  </arcs>
  <vertices>
    <vertex><id>1</id><fact>a</fact><type>OR</type></vertex>
    <vertex><id>2</id><fact>rule</fact><type>AND</type></vertex>
    <vertex><id>3</id><fact>b</fact><type>OR</type></vertex>
    <vertex><id>4</id><fact>c</fact><type>LEAF</type></vertex>
  </vertices>
</attack_graph>"#;
        let err = ingest(&parse(xml), &IngestOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            MulvalError::AmbiguousGrant {
                vertex: 2,
                successors: 2
            }
        ));
    }

    #[test]
    fn test_arc_to_unknown_vertex() {
        let xml = r#"<attack_graph>
  <arcs><arc><src>1</src><dst>9</dst></arc></arcs>
  <vertices><vertex><id>1</id><fact>a</fact><type>OR</type></vertex></vertices>
</attack_graph>"#;
        let err = ingest(&parse(xml), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, MulvalError::UnknownVertex(9)));
    }

    #[test]
    fn test_goal_override() {
        let options = IngestOptions {
            goal_vertex: Some(4),
            ..IngestOptions::default()
        };
        let input = ingest(&parse(TWO_RULES_XML), &options).unwrap();
        assert_eq!(input.goal_proposition, PropositionId(3));

        let options = IngestOptions {
            goal_vertex: Some(2),
            ..IngestOptions::default()
        };
        let err = ingest(&parse(TWO_RULES_XML), &options).unwrap_err();
        assert!(matches!(err, MulvalError::InvalidGoal(2)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AttackGraph.xml");
        std::fs::write(&path, TWO_RULES_XML).unwrap();

        let input = load_mulval(&path, &IngestOptions::default()).unwrap();
        assert_eq!(input.store.exploit_count(), 2);
    }
}
