//! Relevance scoring for retrieved nodes.
//!
//! Formula: `score = w_d·1/(1+depth) + w_c·confidence + w_r·2^(-age/half_life)`
//! where depth is BFS hops from the nearest seed and age is hours since
//! the node was last updated. All three terms lie in [0, 1], so the
//! weights bound the score.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use recall_core::Node;

/// Relevance weight parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringWeights {
    /// Weight of graph proximity to a seed (default 0.5).
    #[serde(default = "default_w_distance")]
    pub w_distance: f64,
    /// Weight of the node's stored confidence (default 0.3).
    #[serde(default = "default_w_confidence")]
    pub w_confidence: f64,
    /// Weight of update recency (default 0.2).
    #[serde(default = "default_w_recency")]
    pub w_recency: f64,
    /// Hours for the recency term to halve (default one week).
    #[serde(default = "default_half_life")]
    pub recency_half_life_hours: f64,
}

fn default_w_distance() -> f64 {
    0.5
}

fn default_w_confidence() -> f64 {
    0.3
}

fn default_w_recency() -> f64 {
    0.2
}

fn default_half_life() -> f64 {
    168.0
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            w_distance: default_w_distance(),
            w_confidence: default_w_confidence(),
            w_recency: default_w_recency(),
            recency_half_life_hours: default_half_life(),
        }
    }
}

/// Retrieval bounds and scoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveOptions {
    /// Maximum BFS depth from the seeds (default 2).
    #[serde(default = "default_hops")]
    pub hops: u32,

    /// Target size of the returned node set. Nodes at depth 0 or 1 are
    /// always retained, even past this limit.
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub weights: ScoringWeights,

    /// Fixed reference time for the recency term; `None` means now.
    /// Pinning this makes retrieval fully deterministic.
    #[serde(skip)]
    pub reference_time: Option<DateTime<Utc>>,
}

fn default_hops() -> u32 {
    2
}

fn default_limit() -> usize {
    25
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            hops: default_hops(),
            limit: default_limit(),
            weights: ScoringWeights::default(),
            reference_time: None,
        }
    }
}

/// Score one node at a given BFS depth.
pub fn score_node(
    node: &Node,
    depth: u32,
    weights: &ScoringWeights,
    reference_time: DateTime<Utc>,
) -> f64 {
    let proximity = 1.0 / (1.0 + f64::from(depth));

    let age_hours = (reference_time - node.updated_at)
        .num_minutes()
        .max(0) as f64
        / 60.0;
    let recency = 0.5f64.powf(age_hours / weights.recency_half_life_hours);

    weights.w_distance * proximity
        + weights.w_confidence * node.confidence
        + weights.w_recency * recency
}
