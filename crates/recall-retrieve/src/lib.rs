//! recall-retrieve: Contextual subgraph retrieval for the Recall
//! knowledge graph.
//!
//! Expands outward from seed entities (or a free-text query), scores
//! every reached node by proximity, confidence, and recency, and returns
//! a bounded subgraph suitable for prompt assembly or visualization.

pub mod error;
pub mod query;
pub mod score;
pub mod subgraph;
pub mod traverse;

pub use error::RetrieveError;
pub use score::{RetrieveOptions, ScoringWeights};
pub use subgraph::{ScoredNode, Subgraph};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use recall_core::NodeId;
use recall_graph::GraphStore;

use crate::error::Result;

/// The retrieval engine.
pub struct ContextRetriever {
    store: Arc<dyn GraphStore>,
    options: RetrieveOptions,
}

impl ContextRetriever {
    /// Create a retriever with default options.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            options: RetrieveOptions::default(),
        }
    }

    /// Override the retrieval options.
    pub fn with_options(mut self, options: RetrieveOptions) -> Self {
        self.options = options;
        self
    }

    /// Retrieve the scored neighborhood of the given seed nodes.
    ///
    /// Unknown or inactive seeds contribute nothing; with no usable
    /// seeds the result is an empty subgraph.
    pub async fn retrieve(&self, seeds: &[NodeId]) -> Result<Subgraph> {
        let traversal = traverse::expand(self.store.as_ref(), seeds, self.options.hops).await?;
        let reference_time = self.options.reference_time.unwrap_or_else(Utc::now);

        let mut scored: Vec<ScoredNode> = traversal
            .nodes
            .into_values()
            .map(|(node, depth)| {
                let score = score::score_node(&node, depth, &self.options.weights, reference_time);
                ScoredNode { node, depth, score }
            })
            .collect();
        // Best first; ties break on id so equal-score output is stable.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node.id.cmp(&b.node.id))
        });

        let nodes = truncate(scored, self.options.limit);
        let retained: HashSet<NodeId> = nodes.iter().map(|s| s.node.id).collect();
        let edges = traversal
            .edges
            .into_values()
            .filter(|edge| retained.contains(&edge.from) && retained.contains(&edge.to))
            .collect();

        let subgraph = Subgraph {
            seeds: seeds.to_vec(),
            nodes,
            edges,
        };
        tracing::info!(
            seeds = subgraph.seeds.len(),
            nodes = subgraph.nodes.len(),
            edges = subgraph.edges.len(),
            "Retrieved subgraph"
        );
        Ok(subgraph)
    }

    /// Retrieve for a free-text query by resolving keywords to seeds.
    pub async fn retrieve_for_query(&self, text: &str) -> Result<Subgraph> {
        let seeds = query::seeds_for_query(self.store.as_ref(), text).await?;
        self.retrieve(&seeds).await
    }
}

/// Cut a sorted node list down to the limit, but never drop a seed or a
/// direct neighbor: an over-full depth 0-1 set is returned whole.
fn truncate(scored: Vec<ScoredNode>, limit: usize) -> Vec<ScoredNode> {
    if scored.len() <= limit {
        return scored;
    }
    let mut kept = Vec::with_capacity(limit);
    // The protected set counts against the budget first.
    let protected = scored.iter().filter(|s| s.depth <= 1).count();
    let mut budget = limit.saturating_sub(protected);
    for node in scored {
        if node.depth <= 1 {
            kept.push(node);
        } else if budget > 0 {
            kept.push(node);
            budget -= 1;
        }
    }
    kept.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    kept
}
