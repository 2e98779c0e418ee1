//! CLI entry point for agrank.
//!
//! Builds attack graphs from MulVAL output or the random generator, prunes
//! them, and ranks nodes and exploits. Results are written as JSON to stdout
//! (or `--output`); logs go to stderr.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use agrank_core::config::{load_section, DEFAULT_ENV_PREFIX};
use agrank_core::ExploitId;
use agrank_graph::{AnyGraph, PrunableGraph};
use agrank_mulval::{load_mulval, AttackInput, Generator, GeneratorConfig, IngestOptions};
use agrank_rank::{Method, RankingConfig, RankingEngine};

#[derive(Parser)]
#[command(name = "agrank")]
#[command(about = "Attack graph construction and exploit ranking")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: agrank).
    #[arg(short, long, default_value = "agrank", global = true)]
    config: String,

    /// Write the JSON result to this file instead of stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    State,
    Dependency,
}

#[derive(Subcommand)]
enum Command {
    /// Build an attack graph from a MulVAL AttackGraph.xml.
    Build {
        /// MulVAL XML file.
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "state")]
        kind: Kind,
        /// MulVAL id of the goal vertex.
        #[arg(long)]
        goal_vertex: Option<usize>,
        /// Abort once the state graph exceeds this many states.
        #[arg(long)]
        max_states: Option<usize>,
    },
    /// Generate a random attack graph.
    Generate {
        #[arg(long, value_enum, default_value = "state")]
        kind: Kind,
        /// Number of exploits (overrides the config file).
        #[arg(long)]
        n_exploits: Option<usize>,
        /// Random seed (overrides the config file).
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        max_states: Option<usize>,
    },
    /// Keep only some exploits of a graph and drop what became dangling.
    Prune {
        /// Persisted graph file.
        #[arg(long)]
        graph: PathBuf,
        /// Exploit ids to keep.
        #[arg(long, value_delimiter = ',', conflicts_with = "remove")]
        keep: Option<Vec<usize>>,
        /// Exploit ids to remove.
        #[arg(long, value_delimiter = ',')]
        remove: Option<Vec<usize>>,
    },
    /// Score every node of a graph.
    Scores {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        method: Method,
    },
    /// Rank exploits by how much removing each one hurts the attacker.
    Rank {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        method: Method,
    },
    /// Compare the exploit rankings of several methods (PPCE).
    Compare {
        /// Graph files built from the same store; each method uses the
        /// first one it applies to.
        #[arg(long, required = true, num_args = 1..)]
        graph: Vec<PathBuf>,
        #[arg(long, value_delimiter = ',', required = true)]
        methods: Vec<Method>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let output = cli.output.as_deref();
    match cli.command {
        Command::Build {
            ref input,
            kind,
            goal_vertex,
            max_states,
        } => {
            let mut options: IngestOptions = load_section(&cli.config, DEFAULT_ENV_PREFIX, "ingest")?;
            if goal_vertex.is_some() {
                options.goal_vertex = goal_vertex;
            }
            let attack = load_mulval(input, &options)?;
            emit_graph(&to_graph(&attack, kind, max_states)?, output)?;
        }
        Command::Generate {
            kind,
            n_exploits,
            seed,
            max_states,
        } => {
            let mut config: GeneratorConfig =
                load_section(&cli.config, DEFAULT_ENV_PREFIX, "generator")?;
            if let Some(n) = n_exploits {
                config.n_exploits = n;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            let attack = Generator::new(config)?.generate()?;
            emit_graph(&to_graph(&attack, kind, max_states)?, output)?;
        }
        Command::Prune {
            ref graph,
            ref keep,
            ref remove,
        } => {
            let graph = AnyGraph::load(graph)?;
            let keep: BTreeSet<ExploitId> = match (keep, remove) {
                (Some(keep), _) => keep.iter().map(|&e| ExploitId(e)).collect(),
                (None, Some(remove)) => graph
                    .exploit_ids()
                    .into_iter()
                    .filter(|e| !remove.contains(&e.0))
                    .collect(),
                (None, None) => anyhow::bail!("one of --keep or --remove is required"),
            };
            emit_graph(&graph.get_pruned_graph(&keep), output)?;
        }
        Command::Scores { ref graph, method } => {
            let engine = engine(&cli.config)?;
            let report = engine.node_scores(method, &AnyGraph::load(graph)?)?;
            emit(&report, output)?;
        }
        Command::Rank { ref graph, method } => {
            let engine = engine(&cli.config)?;
            let report = engine.rank(method, &AnyGraph::load(graph)?)?;
            emit(&report, output)?;
        }
        Command::Compare {
            ref graph,
            ref methods,
        } => {
            let engine = engine(&cli.config)?;
            let graphs = graph
                .iter()
                .map(|path| AnyGraph::load(path))
                .collect::<Result<Vec<_>, _>>()?;
            let report = engine.compare(methods, &graphs)?;
            emit(&report, output)?;
        }
    }

    Ok(())
}

fn engine(config_prefix: &str) -> anyhow::Result<RankingEngine> {
    let config = RankingConfig::load(config_prefix)?;
    Ok(RankingEngine::new().with_config(config))
}

fn to_graph(attack: &AttackInput, kind: Kind, max_states: Option<usize>) -> anyhow::Result<AnyGraph> {
    Ok(match kind {
        Kind::State => AnyGraph::from(attack.state_graph(max_states)?),
        Kind::Dependency => AnyGraph::from(attack.dependency_graph()?),
    })
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string(value)?;
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn emit_graph(graph: &AnyGraph, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => graph.save(path)?,
        None => println!("{}", graph.to_json()?),
    }
    Ok(())
}
