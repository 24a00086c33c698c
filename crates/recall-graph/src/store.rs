//! The `GraphStore` trait: create/read/update primitives with uniqueness
//! enforcement, consumed by the sync and retrieve pipelines.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use recall_core::{Attributes, Edge, EdgeId, EdgeType, Node, NodeId, NodeType, TurnId};
use serde::{Deserialize, Serialize};

/// Errors from graph storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An active node already exists for `(node_type, canonical_name)`.
    /// Carries the winner so the caller can read-repair without re-reading.
    #[error("duplicate active node for ({}, {})", existing.node_type, existing.canonical_name)]
    DuplicateNode { existing: Box<Node> },

    /// An active edge already exists for `(edge_type, from, to)`.
    #[error("duplicate active edge {} {} -> {}", existing.edge_type, existing.from, existing.to)]
    DuplicateEdge { existing: Box<Edge> },

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// Edge endpoint missing or inactive.
    #[error("edge endpoint not active: {0}")]
    EndpointNotActive(NodeId),

    /// Transient backend failure; the executor retries these with backoff.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// Non-transient backend failure; the plan is abandoned and reported.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Incremental update to a node; merges never change identity or
/// `canonical_name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePatch {
    pub add_aliases: BTreeSet<String>,
    pub merge_attributes: Attributes,
    pub add_source_refs: Vec<TurnId>,
    /// Confidence is monotone under merge: the stored value only rises.
    pub confidence: Option<f64>,
}

impl NodePatch {
    /// Merge into a node record and bump `updated_at`.
    pub fn apply(self, node: &mut Node) {
        node.aliases.extend(self.add_aliases);
        node.attributes.extend(self.merge_attributes);
        for turn in self.add_source_refs {
            if !node.source_refs.contains(&turn) {
                node.source_refs.push(turn);
            }
        }
        if let Some(c) = self.confidence {
            node.confidence = node.confidence.max(c);
        }
        node.updated_at = chrono::Utc::now();
    }
}

/// Incremental update to an edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgePatch {
    pub merge_attributes: Attributes,
    pub add_source_refs: Vec<TurnId>,
    pub confidence: Option<f64>,
}

impl EdgePatch {
    /// Merge into an edge record and bump `updated_at`.
    pub fn apply(self, edge: &mut Edge) {
        edge.attributes.extend(self.merge_attributes);
        for turn in self.add_source_refs {
            if !edge.source_refs.contains(&turn) {
                edge.source_refs.push(turn);
            }
        }
        if let Some(c) = self.confidence {
            edge.confidence = edge.confidence.max(c);
        }
        edge.updated_at = chrono::Utc::now();
    }
}

/// Graph-wide counts, by type, active records only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub active_nodes: usize,
    pub active_edges: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
}

/// Storage collaborator contract.
///
/// Point operations only: each call is atomic at the backend, and no
/// plan-wide lock is ever held. Uniqueness checks serialize conflicting
/// writers at this boundary (see crate docs).
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ── Reads ────────────────────────────────────────────────────

    async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, StoreError>;

    async fn get_edge(&self, id: &EdgeId) -> Result<Option<Edge>, StoreError>;

    /// All active nodes of one type (resolver candidate set).
    async fn active_nodes_of_type(&self, node_type: NodeType) -> Result<Vec<Node>, StoreError>;

    /// Index lookup by exact canonical name, active nodes only.
    async fn find_active_node(
        &self,
        node_type: NodeType,
        canonical_name: &str,
    ) -> Result<Option<Node>, StoreError>;

    /// The single active edge for an ordered pair, if any.
    async fn active_edge_between(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
        to: &NodeId,
    ) -> Result<Option<Edge>, StoreError>;

    /// All active edges of one type leaving a node (exclusivity checks).
    async fn active_edges_from(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
    ) -> Result<Vec<Edge>, StoreError>;

    /// Active neighbors in both directions with their connecting edges.
    async fn neighbors(&self, id: &NodeId) -> Result<Vec<(Edge, Node)>, StoreError>;

    async fn stats(&self) -> Result<GraphStats, StoreError>;

    // ── Writes ───────────────────────────────────────────────────

    /// Insert a new active node. Fails with [`StoreError::DuplicateNode`]
    /// if an active node with the same `(node_type, canonical_name)`
    /// already exists.
    async fn insert_node(&self, node: Node) -> Result<Node, StoreError>;

    /// Merge a patch into an existing node. Returns the updated record.
    async fn merge_node(&self, id: &NodeId, patch: NodePatch) -> Result<Node, StoreError>;

    /// Insert a new active edge. Both endpoints must be active nodes.
    /// Fails with [`StoreError::DuplicateEdge`] if an active edge with the
    /// same `(edge_type, from, to)` already exists.
    async fn insert_edge(&self, edge: Edge) -> Result<Edge, StoreError>;

    /// Merge a patch into an existing edge. Returns the updated record.
    async fn merge_edge(&self, id: &EdgeId, patch: EdgePatch) -> Result<Edge, StoreError>;

    /// Mark an edge inactive, preserving it for audit. Idempotent: an
    /// already-inactive edge is returned unchanged. Returns
    /// `(record_after, changed)`.
    async fn deactivate_edge(&self, id: &EdgeId) -> Result<(Edge, bool), StoreError>;
}
