//! End-to-end: MulVAL XML or generated input, both graph variants, every
//! applicable method.

use std::collections::BTreeSet;

use agrank_core::ExploitId;
use agrank_graph::{AnyGraph, GraphView};
use agrank_mulval::{ingest::ingest, mulval_xml::parse_mulval_xml, Generator, GeneratorConfig};
use agrank_mulval::{AttackInput, IngestOptions};
use agrank_rank::{Method, RankingConfig, RankingEngine};

/// Web server then database. Vertex 9 (ssh brute force) is an alternative
/// route onto the web server; vertex 5 (db exploit) is the only way in.
///
/// ```text
/// 1 execCode(db,root)      <- 5 RULE db exploit   <- 6 netAccess(db), 7 vulExists(db)
/// 6 netAccess(db)          <- 8 RULE pivot        <- 2 execCode(web,user)
/// 2 execCode(web,user)     <- 3 RULE web exploit  <- 4 vulExists(web)
/// 2 execCode(web,user)     <- 9 RULE brute force  <- 10 weakPassword(web)
/// ```
const WEB_DB_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<attack_graph>
  <arcs>
    <arc><src>1</src><dst>5</dst></arc>
    <arc><src>5</src><dst>6</dst></arc>
    <arc><src>5</src><dst>7</dst></arc>
    <arc><src>6</src><dst>8</dst></arc>
    <arc><src>8</src><dst>2</dst></arc>
    <arc><src>2</src><dst>3</dst></arc>
    <arc><src>3</src><dst>4</dst></arc>
    <arc><src>2</src><dst>9</dst></arc>
    <arc><src>9</src><dst>10</dst></arc>
  </arcs>
  <vertices>
    <vertex><id>1</id><fact>execCode(db,root)</fact><metric>0</metric><type>OR</type></vertex>
    <vertex><id>2</id><fact>execCode(web,user)</fact><metric>0</metric><type>OR</type></vertex>
    <vertex><id>3</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>9.0</metric><type>AND</type></vertex>
    <vertex><id>4</id><fact>vulExists(web,'CVE-2021-41773',httpd,remoteExploit,privEscalation)</fact><metric>0</metric><type>LEAF</type></vertex>
    <vertex><id>5</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>8.0</metric><type>AND</type></vertex>
    <vertex><id>6</id><fact>netAccess(db,tcp,5432)</fact><metric>0</metric><type>OR</type></vertex>
    <vertex><id>7</id><fact>vulExists(db,'CVE-2019-9193',postgresql,remoteExploit,privEscalation)</fact><metric>0</metric><type>LEAF</type></vertex>
    <vertex><id>8</id><fact>RULE 6 (multi-hop access)</fact><metric>10.0</metric><type>AND</type></vertex>
    <vertex><id>9</id><fact>RULE 7 (password guessing)</fact><metric>3.0</metric><type>AND</type></vertex>
    <vertex><id>10</id><fact>weakPassword(web,admin)</fact><metric>0</metric><type>LEAF</type></vertex>
  </vertices>
</attack_graph>"#;

fn web_db() -> AttackInput {
    let graph = parse_mulval_xml(WEB_DB_XML.as_bytes()).unwrap();
    ingest(&graph, &IngestOptions::default()).unwrap()
}

fn serial_engine() -> RankingEngine {
    RankingEngine::new().with_config(RankingConfig {
        parallel: false,
        ..RankingConfig::default()
    })
}

#[test]
fn every_method_marks_the_same_critical_exploits() {
    let input = web_db();
    let state = AnyGraph::from(input.state_graph(None).unwrap());
    let dependency = AnyGraph::from(input.dependency_graph().unwrap());
    let engine = serial_engine();

    // Exploit ids are MulVAL ids minus one: db exploit 4, pivot 7.
    let critical = vec![ExploitId(4), ExploitId(7)];
    for method in Method::ALL {
        for graph in [&state, &dependency] {
            if !method.supports(graph.kind()) {
                continue;
            }
            let report = engine.rank(method, graph).unwrap();
            assert_eq!(report.ranking.entries.len(), 5, "{method}");
            assert_eq!(report.ranking.critical_exploits(), critical, "{method}");
        }
    }
}

#[test]
fn losing_the_likely_entry_hurts_more() {
    // Web exploit (id 2, p = 0.9) against brute force (id 8, p = 0.3).
    let input = web_db();
    let state = AnyGraph::from(input.state_graph(None).unwrap());
    let report = serial_engine().rank(Method::ValueIteration, &state).unwrap();

    let web = report.ranking.rank_of(ExploitId(2)).unwrap();
    let brute_force = report.ranking.rank_of(ExploitId(8)).unwrap();
    assert!(web < brute_force);
}

#[test]
fn persisted_graph_ranks_identically() {
    let input = web_db();
    let graph = AnyGraph::from(input.dependency_graph().unwrap());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dependency.json");
    graph.save(&path).unwrap();
    let loaded = AnyGraph::load(&path).unwrap();

    let engine = serial_engine();
    let before = engine.rank(Method::RiskQuantifier, &graph).unwrap();
    let after = engine.rank(Method::RiskQuantifier, &loaded).unwrap();
    assert_eq!(before.ranking, after.ranking);
}

#[test]
fn report_serializes_unreachable_scores_as_null() {
    let input = web_db();
    let graph = AnyGraph::from(input.state_graph(None).unwrap());
    let report = serial_engine().rank(Method::PageRank, &graph).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["method"], "page_rank");
    assert_eq!(json["graph_stats"]["kind"], "state");
    let nulls = json["ranking"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["score"].is_null())
        .count();
    assert_eq!(nulls, 2);
}

#[test]
fn generated_graphs_rank_with_all_methods() {
    let config = GeneratorConfig {
        n_exploits: 8,
        seed: Some(5),
        ..GeneratorConfig::default()
    };
    let input = Generator::new(config).unwrap().generate().unwrap();
    let state = AnyGraph::from(input.state_graph(Some(50_000)).unwrap());
    let dependency = AnyGraph::from(input.dependency_graph().unwrap());

    let report = RankingEngine::new()
        .compare(&Method::ALL, &[state, dependency])
        .unwrap();
    assert_eq!(report.methods.len(), Method::ALL.len());
    for row in &report.ppce_matrix {
        assert_eq!(row.len(), Method::ALL.len());
        assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    // One entry per exploit plus the baseline.
    let graph = AnyGraph::from(input.dependency_graph().unwrap());
    let ranking = RankingEngine::new().rank(Method::RiskQuantifier, &graph).unwrap().ranking;
    let ranked: BTreeSet<ExploitId> = ranking.entries.iter().filter_map(|e| e.exploit).collect();
    assert_eq!(ranked, input.store.exploit_ids());
    assert_eq!(ranking.entries.len(), ranked.len() + 1);
    assert!(ranking.baseline().is_some());
}
