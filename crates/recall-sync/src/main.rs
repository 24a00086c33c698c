//! CLI entry point for the recall-sync triple ingestion pipeline.

use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use recall_audit::{AuditStore, FileAuditLog, MemoryAuditLog};
use recall_core::{CandidateTriple, TurnId};
use recall_graph::{GraphStore, MemoryStore, Neo4jConfig, Neo4jStore};

use recall_sync::config::SyncConfig;
use recall_sync::pipeline::TurnProcessor;

#[derive(Parser)]
#[command(name = "recall-sync")]
#[command(about = "Apply extracted conversation triples to the Recall knowledge graph")]
struct Cli {
    /// Identifier of the conversation turn the triples came from.
    #[arg(short, long)]
    turn_id: String,

    /// Path to a JSON array of candidate triples ("-" for stdin).
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Use an in-process store and audit log instead of Neo4j.
    #[arg(long)]
    memory: bool,

    /// Print graph statistics after the turn is applied.
    #[arg(long)]
    stats: bool,

    /// Config file prefix (default: recall).
    #[arg(short, long, default_value = "recall")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let sync_config = load_sync_config(&cli.config)?;
    let candidates = read_candidates(&cli.input)?;
    tracing::info!(
        turn_id = cli.turn_id,
        candidates = candidates.len(),
        "Loaded candidate triples"
    );

    let (store, audit): (Arc<dyn GraphStore>, Arc<dyn AuditStore>) = if cli.memory {
        (
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryAuditLog::new()),
        )
    } else {
        let graph_config = load_graph_config(&cli.config)?;
        let store = Neo4jStore::connect(&graph_config).await?;
        tracing::info!(uri = graph_config.uri, "Connected to Neo4j");
        let audit = FileAuditLog::open(&sync_config.audit_dir)?;
        (Arc::new(store), Arc::new(audit))
    };

    let processor = TurnProcessor::new(store.clone(), audit, sync_config);
    let result = processor
        .process_turn(TurnId::new(cli.turn_id), &candidates)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_clean() {
        anyhow::bail!("turn applied partially: {} error(s)", result.errors.len());
    }

    if cli.stats {
        let stats = store.stats().await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

fn read_candidates(input: &str) -> anyhow::Result<Vec<CandidateTriple>> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input)?
    };
    Ok(serde_json::from_str(&raw)?)
}

fn load_sync_config(file_prefix: &str) -> anyhow::Result<SyncConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("RECALL_SYNC")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // A missing section means defaults; a malformed one is an error the
    // operator needs to see.
    match cfg.get::<SyncConfig>("sync") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(SyncConfig::default()),
        Err(e) => Err(e.into()),
    }
}

fn load_graph_config(file_prefix: &str) -> anyhow::Result<Neo4jConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("RECALL")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(Neo4jConfig {
        uri: string_or(&cfg, "neo4j.uri", "bolt://localhost:7687")?,
        user: string_or(&cfg, "neo4j.user", "neo4j")?,
        password: string_or(&cfg, "neo4j.password", "recall-dev")?,
        ..Default::default()
    })
}

fn string_or(cfg: &config::Config, key: &str, default: &str) -> anyhow::Result<String> {
    match cfg.get_string(key) {
        Ok(v) => Ok(v),
        Err(config::ConfigError::NotFound(_)) => Ok(default.to_string()),
        Err(e) => Err(e.into()),
    }
}
