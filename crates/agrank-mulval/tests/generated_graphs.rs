//! Generated inputs must yield consistent state and dependency graphs.

use std::collections::BTreeSet;

use agrank_graph::{AnyGraph, GraphView, PrunableGraph};
use agrank_mulval::{Generator, GeneratorConfig};

#[test]
fn generated_graphs_agree_on_critical_exploits() {
    for seed in [1, 2, 3] {
        let config = GeneratorConfig {
            n_exploits: 7,
            seed: Some(seed),
            ..GeneratorConfig::default()
        };
        let input = Generator::new(config).unwrap().generate().unwrap();
        let state = input.state_graph(Some(50_000)).unwrap();
        let dependency = input.dependency_graph().unwrap();

        for exploit in dependency.exploit_ids() {
            let keep: BTreeSet<_> = dependency
                .exploit_ids()
                .into_iter()
                .filter(|&e| e != exploit)
                .collect();
            assert_eq!(
                state.get_pruned_graph(&keep).reaches_goal(),
                dependency.get_pruned_graph(&keep).reaches_goal(),
                "seed {seed}, exploit {exploit}"
            );
        }
    }
}

#[test]
fn generated_graph_persists() {
    let config = GeneratorConfig {
        n_exploits: 10,
        seed: Some(99),
        ..GeneratorConfig::default()
    };
    let input = Generator::new(config).unwrap().generate().unwrap();
    let graph = AnyGraph::from(input.dependency_graph().unwrap());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dependency.json");
    graph.save(&path).unwrap();

    let loaded = AnyGraph::load(&path).unwrap();
    assert_eq!(loaded.goal_proposition(), input.goal_proposition);
    assert_eq!(loaded.edges(), graph.edges());
}
