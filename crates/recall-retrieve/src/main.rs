//! CLI entry point for recall-retrieve.
//!
//! Designed for subprocess invocation from an agent runtime: results go
//! to stdout as JSON, logs to stderr.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use recall_core::{NodeId, NodeType};
use recall_graph::{GraphStore, Neo4jConfig, Neo4jStore};
use recall_retrieve::{ContextRetriever, RetrieveOptions};
use recall_sync::resolve::{EntityResolver, Resolution, ResolverConfig};

#[derive(Parser)]
#[command(name = "recall-retrieve")]
#[command(about = "Retrieve a relevant subgraph from the Recall knowledge graph")]
struct Cli {
    /// Seed entity as "Type:Name" (e.g. "Person:Alex"); repeatable.
    #[arg(short, long)]
    entity: Vec<String>,

    /// Free-text query to derive seeds from.
    #[arg(short, long)]
    query: Option<String>,

    /// Maximum hops from the seeds.
    #[arg(long, default_value_t = 2)]
    hops: u32,

    /// Target node count for the result.
    #[arg(long, default_value_t = 25)]
    limit: usize,

    /// Emit the visualization view instead of the raw subgraph.
    #[arg(long)]
    view: bool,

    /// Config file prefix (default: recall).
    #[arg(short, long, default_value = "recall")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.entity.is_empty() && cli.query.is_none() {
        anyhow::bail!("Specify at least one --entity or a --query");
    }

    let graph_config = load_graph_config(&cli.config)?;
    let store: Arc<dyn GraphStore> = Arc::new(Neo4jStore::connect(&graph_config).await?);

    let retriever = ContextRetriever::new(store.clone()).with_options(RetrieveOptions {
        hops: cli.hops,
        limit: cli.limit,
        ..Default::default()
    });

    let subgraph = if let Some(query) = &cli.query {
        retriever.retrieve_for_query(query).await?
    } else {
        let mut seeds = Vec::new();
        for entity_ref in &cli.entity {
            if let Some(id) = resolve_entity_ref(store.as_ref(), entity_ref).await? {
                seeds.push(id);
            } else {
                tracing::warn!(entity = entity_ref, "Entity not found, skipping seed");
            }
        }
        retriever.retrieve(&seeds).await?
    };

    let output = if cli.view {
        subgraph.to_view()
    } else {
        serde_json::to_value(&subgraph)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Parse a "Type:Name" reference and resolve it against the graph.
///
/// Resolution is read-only: a mention that would be a new entity is a
/// miss here, never a creation.
async fn resolve_entity_ref(
    store: &dyn GraphStore,
    entity_ref: &str,
) -> anyhow::Result<Option<NodeId>> {
    let (type_part, name_part) = entity_ref
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid entity reference {entity_ref:?}, want Type:Name"))?;
    let node_type = NodeType::parse(type_part)
        .ok_or_else(|| anyhow::anyhow!("Unknown node type: {type_part}"))?;

    let resolver = EntityResolver::new(ResolverConfig::default());
    match resolver.resolve(store, node_type, name_part).await? {
        Resolution::Matched { node, .. } => Ok(Some(node.id)),
        Resolution::New { .. } => Ok(None),
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

// A missing key means the default; a malformed one is an error the
// operator needs to see.
fn string_or(cfg: &config::Config, key: &str, default: &str) -> anyhow::Result<String> {
    match cfg.get_string(key) {
        Ok(v) => Ok(v),
        Err(config::ConfigError::NotFound(_)) => Ok(default.to_string()),
        Err(e) => Err(e.into()),
    }
}
