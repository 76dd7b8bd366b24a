use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use orgchart_ledger::config::{DEFAULT_GOVERNMENT, DEFAULT_ID_NAMESPACE};
use orgchart_ledger::{load_events, seed_from_dir, EngineConfig, Finish, SqliteGraph, TransactionEngine};

#[derive(Parser, Debug)]
#[command(name = "orgchart", version, about = "Apply dated org-chart changes to a temporal graph")]
struct Cli {
    /// SQLite database holding the graph
    #[arg(long, env = "ORGCHART_DB", default_value = "orgchart.db")]
    db: PathBuf,

    /// Root government every minister reports to
    #[arg(long, env = "ORGCHART_GOVERNMENT", default_value = DEFAULT_GOVERNMENT)]
    government: String,

    /// Leading segment of generated ids
    #[arg(long, env = "ORGCHART_ID_NAMESPACE", default_value = DEFAULT_ID_NAMESPACE)]
    id_namespace: String,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import an initial snapshot (government.csv, minister.csv, ...)
    Seed { dir: PathBuf },
    /// Apply the event files (ADD.csv, RENAME.csv, ...) in one transaction
    Apply {
        dir: PathBuf,
        /// Run every event, then roll back
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut graph = SqliteGraph::open(&cli.db)
        .with_context(|| format!("opening graph store {}", cli.db.display()))?;

    match &cli.command {
        Command::Seed { dir } => run_seed(&cli, &mut graph, dir),
        Command::Apply { dir, dry_run } => run_apply(&cli, &mut graph, dir, *dry_run),
    }
}

fn run_seed(cli: &Cli, graph: &mut SqliteGraph, dir: &Path) -> Result<()> {
    println!("🌱 Seeding org chart from {}", dir.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let report = seed_from_dir(graph, dir).with_context(|| format!("seeding from {}", dir.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("✓ {} entities", report.entities);
        println!("✓ {} open relationships", report.relationships_open);
        println!("✓ {} closed relationships", report.relationships_closed);
    }
    Ok(())
}

fn run_apply(cli: &Cli, graph: &mut SqliteGraph, dir: &Path, dry_run: bool) -> Result<()> {
    println!("🏛️  Applying org chart changes from {}", dir.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let events = load_events(dir).with_context(|| format!("loading events from {}", dir.display()))?;
    println!("📂 Loaded {} events", events.len());

    let config = EngineConfig::default()
        .with_government(cli.government.clone())
        .with_id_namespace(cli.id_namespace.clone());
    let engine = TransactionEngine::new(config);

    let mut allocator = engine.seed_allocator(graph).context("seeding id counters")?;
    let finish = if dry_run { Finish::Rollback } else { Finish::Commit };

    let report = match engine.run_with(graph, &mut allocator, &events, finish) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("❌ Batch rolled back, nothing was applied");
            if let Some(id) = err.failed_transaction() {
                eprintln!("   Failing transaction: {}", id);
            }
            return Err(err.into());
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (kind, count) in &report.by_kind {
        println!("✓ {:<10} {}", kind.to_string(), count);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.committed {
        println!("✅ {}", report.summary());
    } else {
        println!("🔍 {}", report.summary());
    }
    if !report.totals.allocated.is_empty() {
        println!("🆔 New ids: {}", report.totals.allocated.join(", "));
    }
    Ok(())
}
