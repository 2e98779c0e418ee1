//! Node-link JSON persistence for both graph variants.
//!
//! The document carries a `type` discriminator (`"state"` or `"dependency"`),
//! the node and link lists, and the full proposition/exploit store so a graph
//! can be reloaded on its own. Loading re-checks every invariant the builders
//! guarantee.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use agrank_core::{Exploit, ExploitId, Proposition, PropositionId, Store};

use crate::dependency::{DependencyGraph, DependencyNode};
use crate::error::Result;
use crate::state::{StateEdge, StateGraph, StateNode};
use crate::topology::{NodeId, Topology};
use crate::view::{GraphKind, GraphView, PrunableGraph};

/// Either graph variant, as read from or written to disk.
#[derive(Debug, Clone)]
pub enum AnyGraph {
    State(StateGraph),
    Dependency(DependencyGraph),
}

impl From<StateGraph> for AnyGraph {
    fn from(graph: StateGraph) -> Self {
        Self::State(graph)
    }
}

impl From<DependencyGraph> for AnyGraph {
    fn from(graph: DependencyGraph) -> Self {
        Self::Dependency(graph)
    }
}

impl AnyGraph {
    pub fn goal_proposition(&self) -> PropositionId {
        match self {
            Self::State(g) => g.goal_proposition(),
            Self::Dependency(g) => g.goal_proposition(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&GraphRecord::from(self))?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: GraphRecord = serde_json::from_str(json)?;
        record.into_graph()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), kind = %self.kind(), "Graph saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let graph = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            kind = %graph.kind(),
            nodes = graph.number_of_nodes(),
            "Graph loaded"
        );
        Ok(graph)
    }
}

impl GraphView for AnyGraph {
    fn topology(&self) -> &Topology {
        match self {
            Self::State(g) => g.topology(),
            Self::Dependency(g) => g.topology(),
        }
    }

    fn store(&self) -> &Store {
        match self {
            Self::State(g) => g.store(),
            Self::Dependency(g) => g.store(),
        }
    }

    fn kind(&self) -> GraphKind {
        match self {
            Self::State(_) => GraphKind::State,
            Self::Dependency(_) => GraphKind::Dependency,
        }
    }

    fn goal_nodes(&self) -> BTreeSet<NodeId> {
        match self {
            Self::State(g) => g.goal_nodes(),
            Self::Dependency(g) => g.goal_nodes(),
        }
    }
}

impl PrunableGraph for AnyGraph {
    fn exploit_ids(&self) -> BTreeSet<ExploitId> {
        match self {
            Self::State(g) => g.exploit_ids(),
            Self::Dependency(g) => g.exploit_ids(),
        }
    }

    fn get_pruned_graph(&self, exploits_to_keep: &BTreeSet<ExploitId>) -> Self {
        match self {
            Self::State(g) => Self::State(g.get_pruned_graph(exploits_to_keep)),
            Self::Dependency(g) => Self::Dependency(g.get_pruned_graph(exploits_to_keep)),
        }
    }
}

// ── On-disk records ───────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum GraphRecord {
    State(StateRecord),
    Dependency(DependencyRecord),
}

#[derive(Serialize, Deserialize)]
struct StateRecord {
    #[serde(default = "default_directed")]
    directed: bool,
    goal_proposition: PropositionId,
    #[serde(default)]
    goal_nodes: Vec<NodeId>,
    nodes: Vec<StateNodeRecord>,
    links: Vec<StateLinkRecord>,
    propositions: Vec<Proposition>,
    exploits: Vec<Exploit>,
}

#[derive(Serialize, Deserialize)]
struct StateNodeRecord {
    id: NodeId,
    ids_propositions: BTreeSet<PropositionId>,
}

#[derive(Serialize, Deserialize)]
struct StateLinkRecord {
    source: NodeId,
    target: NodeId,
    ids_exploits: BTreeSet<ExploitId>,
}

#[derive(Serialize, Deserialize)]
struct DependencyRecord {
    #[serde(default = "default_directed")]
    directed: bool,
    goal_proposition: PropositionId,
    nodes: Vec<DependencyNodeRecord>,
    links: Vec<LinkRecord>,
    propositions: Vec<Proposition>,
    exploits: Vec<Exploit>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DependencyNodeRecord {
    Proposition { id: NodeId, id_proposition: PropositionId },
    Exploit { id: NodeId, id_exploit: ExploitId },
}

#[derive(Serialize, Deserialize)]
struct LinkRecord {
    source: NodeId,
    target: NodeId,
}

fn default_directed() -> bool {
    true
}

fn store_parts(store: &Store) -> (Vec<Proposition>, Vec<Exploit>) {
    (
        store.propositions().cloned().collect(),
        store.exploits().cloned().collect(),
    )
}

impl From<&AnyGraph> for GraphRecord {
    fn from(graph: &AnyGraph) -> Self {
        let (propositions, exploits) = store_parts(graph.store());
        match graph {
            AnyGraph::State(g) => Self::State(StateRecord {
                directed: true,
                goal_proposition: g.goal_proposition(),
                goal_nodes: g.goal_nodes().into_iter().collect(),
                nodes: g
                    .nodes()
                    .map(|n| StateNodeRecord {
                        id: n.id,
                        ids_propositions: n.true_propositions.clone(),
                    })
                    .collect(),
                links: g
                    .state_edges()
                    .map(|e| StateLinkRecord {
                        source: e.from,
                        target: e.to,
                        ids_exploits: e.exploits.clone(),
                    })
                    .collect(),
                propositions,
                exploits,
            }),
            AnyGraph::Dependency(g) => Self::Dependency(DependencyRecord {
                directed: true,
                goal_proposition: g.goal_proposition(),
                nodes: g
                    .nodes()
                    .map(|(id, node)| match node {
                        DependencyNode::Proposition(p) => DependencyNodeRecord::Proposition {
                            id,
                            id_proposition: p,
                        },
                        DependencyNode::Exploit(e) => DependencyNodeRecord::Exploit {
                            id,
                            id_exploit: e,
                        },
                    })
                    .collect(),
                links: g
                    .edges()
                    .into_iter()
                    .map(|(source, target)| LinkRecord { source, target })
                    .collect(),
                propositions,
                exploits,
            }),
        }
    }
}

impl GraphRecord {
    fn into_graph(self) -> Result<AnyGraph> {
        match self {
            Self::State(record) => {
                let store = Arc::new(Store::try_from_parts(record.propositions, record.exploits)?);
                let nodes = record
                    .nodes
                    .into_iter()
                    .map(|n| StateNode {
                        id: n.id,
                        true_propositions: n.ids_propositions,
                    })
                    .collect();
                let edges = record
                    .links
                    .into_iter()
                    .map(|l| StateEdge {
                        from: l.source,
                        to: l.target,
                        exploits: l.ids_exploits,
                    })
                    .collect();
                let graph = StateGraph::from_parts(store, record.goal_proposition, nodes, edges)?;

                let stored: BTreeSet<NodeId> = record.goal_nodes.into_iter().collect();
                if !stored.is_empty() && stored != graph.goal_nodes() {
                    tracing::warn!(
                        stored = ?stored,
                        recomputed = ?graph.goal_nodes(),
                        "Stored goal nodes disagree with goal proposition; using recomputed set"
                    );
                }
                Ok(AnyGraph::State(graph))
            }
            Self::Dependency(record) => {
                let store = Arc::new(Store::try_from_parts(record.propositions, record.exploits)?);
                let nodes = record
                    .nodes
                    .into_iter()
                    .map(|n| match n {
                        DependencyNodeRecord::Proposition { id, id_proposition } => {
                            (id, DependencyNode::Proposition(id_proposition))
                        }
                        DependencyNodeRecord::Exploit { id, id_exploit } => {
                            (id, DependencyNode::Exploit(id_exploit))
                        }
                    })
                    .collect();
                let edges = record
                    .links
                    .into_iter()
                    .map(|l| (l.source, l.target))
                    .collect();
                let graph =
                    DependencyGraph::from_parts(store, record.goal_proposition, nodes, edges)?;
                Ok(AnyGraph::Dependency(graph))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;

    fn build_test_store() -> Arc<Store> {
        let mut store = Store::new();
        let p0 = store.add_proposition("execCode(web, root)", true);
        let p1 = store.add_proposition("netAccess(db, tcp, 5432)", false);
        let p2 = store.add_proposition("execCode(db, postgres)", false);
        store
            .add_exploit(BTreeSet::from([p0]), p1, 5.0, "hacl(web, db)")
            .unwrap();
        store
            .add_exploit(BTreeSet::from([p1]), p2, 9.8, "remote exploit on db")
            .unwrap();
        Arc::new(store)
    }

    #[test]
    fn state_graph_survives_reload() {
        let graph = StateGraph::build(build_test_store(), PropositionId(2)).unwrap();
        let json = AnyGraph::from(graph.clone()).to_json().unwrap();

        let AnyGraph::State(loaded) = AnyGraph::from_json(&json).unwrap() else {
            panic!("expected a state graph");
        };
        assert_eq!(
            loaded.nodes().collect::<Vec<_>>(),
            graph.nodes().collect::<Vec<_>>()
        );
        assert_eq!(
            loaded.state_edges().collect::<Vec<_>>(),
            graph.state_edges().collect::<Vec<_>>()
        );
        assert_eq!(loaded.goal_nodes(), graph.goal_nodes());
        assert_eq!(loaded.store().exploit_count(), 2);
    }

    #[test]
    fn node_link_layout() {
        let graph = StateGraph::build(build_test_store(), PropositionId(2)).unwrap();
        let json = AnyGraph::from(graph).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "state");
        assert_eq!(value["directed"], true);
        assert_eq!(value["goal_proposition"], 2);
        assert_eq!(value["goal_nodes"], serde_json::json!([2]));
        assert_eq!(value["nodes"][1]["ids_propositions"], serde_json::json!([0, 1]));
        assert_eq!(value["links"][0]["ids_exploits"], serde_json::json!([0]));
    }

    #[test]
    fn dependency_graph_survives_reload() {
        let graph = DependencyGraph::build(build_test_store(), PropositionId(2)).unwrap();
        let json = AnyGraph::from(graph.clone()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "dependency");
        assert_eq!(value["nodes"][3]["id_exploit"], 0);

        let loaded = AnyGraph::from_json(&json).unwrap();
        assert_eq!(loaded.kind(), GraphKind::Dependency);
        assert_eq!(loaded.edges(), graph.edges());
        assert_eq!(loaded.goal_nodes(), BTreeSet::from([2]));
    }

    #[test]
    fn rejects_link_without_exploits() {
        let graph = StateGraph::build(build_test_store(), PropositionId(2)).unwrap();
        let json = AnyGraph::from(graph).to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["links"][0]["ids_exploits"] = serde_json::json!([]);

        let err = AnyGraph::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, GraphError::EmptyEdge { from: 0, to: 1 }));
    }

    #[test]
    fn rejects_link_to_missing_node() {
        let graph = StateGraph::build(build_test_store(), PropositionId(2)).unwrap();
        let json = AnyGraph::from(graph).to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["links"][0]["target"] = serde_json::json!(42);

        let err = AnyGraph::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(42)));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = AnyGraph::from_json(r#"{"type": "bayesian"}"#).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let graph = AnyGraph::from(StateGraph::build(build_test_store(), PropositionId(2)).unwrap());

        graph.save(&path).unwrap();
        let loaded = AnyGraph::load(&path).unwrap();
        assert_eq!(loaded.kind(), GraphKind::State);
        assert_eq!(loaded.number_of_nodes(), 3);
        assert_eq!(loaded.exploit_ids(), graph.exploit_ids());
    }

    #[test]
    fn pruning_dispatches_per_variant() {
        let graph = AnyGraph::from(DependencyGraph::build(build_test_store(), PropositionId(2)).unwrap());
        let pruned = graph.get_pruned_graph(&BTreeSet::from([ExploitId(0)]));
        assert_eq!(pruned.kind(), GraphKind::Dependency);
        assert!(!pruned.reaches_goal());
    }
}
