//! In-memory graph store.
//!
//! The reference implementation of [`GraphStore`]: a single `RwLock` over
//! the node/edge maps plus the two uniqueness indexes. Every trait call
//! takes the lock once, so constraint checks and the write they guard are
//! atomic without any plan-wide locking. Used as the demo-mode backend and
//! as the test double for the whole engine.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use recall_core::{Edge, EdgeId, EdgeType, Node, NodeId, NodeType};

use crate::store::{EdgePatch, GraphStats, GraphStore, NodePatch, StoreError};

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    /// Active-node uniqueness index: `(node_type, canonical_name)` -> id.
    name_index: HashMap<(NodeType, String), NodeId>,
    /// Active-edge uniqueness index: `(edge_type, from, to)` -> id.
    pair_index: HashMap<(EdgeType, NodeId, NodeId), EdgeId>,
}

/// In-memory [`GraphStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

/// Point-in-time view of the active graph, used by the audit
/// replay-equivalence check.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub active_nodes: BTreeMap<NodeId, Node>,
    pub active_edges: BTreeMap<EdgeId, Edge>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the active node/edge sets.
    pub fn snapshot(&self) -> GraphSnapshot {
        let inner = self.inner.read();
        GraphSnapshot {
            active_nodes: inner
                .nodes
                .values()
                .filter(|n| n.active)
                .map(|n| (n.id, n.clone()))
                .collect(),
            active_edges: inner
                .edges
                .values()
                .filter(|e| e.active)
                .map(|e| (e.id, e.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, StoreError> {
        Ok(self.inner.read().nodes.get(id).cloned())
    }

    async fn get_edge(&self, id: &EdgeId) -> Result<Option<Edge>, StoreError> {
        Ok(self.inner.read().edges.get(id).cloned())
    }

    async fn active_nodes_of_type(&self, node_type: NodeType) -> Result<Vec<Node>, StoreError> {
        let inner = self.inner.read();
        let mut nodes: Vec<Node> = inner
            .nodes
            .values()
            .filter(|n| n.active && n.node_type == node_type)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn find_active_node(
        &self,
        node_type: NodeType,
        canonical_name: &str,
    ) -> Result<Option<Node>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .name_index
            .get(&(node_type, canonical_name.to_string()))
            .and_then(|id| inner.nodes.get(id))
            .cloned())
    }

    async fn active_edge_between(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
        to: &NodeId,
    ) -> Result<Option<Edge>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .pair_index
            .get(&(edge_type, *from, *to))
            .and_then(|id| inner.edges.get(id))
            .cloned())
    }

    async fn active_edges_from(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
    ) -> Result<Vec<Edge>, StoreError> {
        let inner = self.inner.read();
        let mut edges: Vec<Edge> = inner
            .edges
            .values()
            .filter(|e| e.active && e.edge_type == edge_type && e.from == *from)
            .cloned()
            .collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(edges)
    }

    async fn neighbors(&self, id: &NodeId) -> Result<Vec<(Edge, Node)>, StoreError> {
        let inner = self.inner.read();
        let mut result = Vec::new();
        for edge in inner.edges.values().filter(|e| e.active) {
            let other = if edge.from == *id {
                edge.to
            } else if edge.to == *id {
                edge.from
            } else {
                continue;
            };
            if let Some(node) = inner.nodes.get(&other) {
                if node.active {
                    result.push((edge.clone(), node.clone()));
                }
            }
        }
        result.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        Ok(result)
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        let inner = self.inner.read();
        let mut stats = GraphStats {
            total_nodes: inner.nodes.len(),
            total_edges: inner.edges.len(),
            ..GraphStats::default()
        };
        for node in inner.nodes.values().filter(|n| n.active) {
            stats.active_nodes += 1;
            *stats
                .nodes_by_type
                .entry(node.node_type.to_string())
                .or_insert(0) += 1;
        }
        for edge in inner.edges.values().filter(|e| e.active) {
            stats.active_edges += 1;
            *stats
                .edges_by_type
                .entry(edge.edge_type.to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn insert_node(&self, node: Node) -> Result<Node, StoreError> {
        let mut inner = self.inner.write();
        let key = (node.node_type, node.canonical_name.clone());
        if let Some(existing_id) = inner.name_index.get(&key) {
            if let Some(existing) = inner.nodes.get(existing_id) {
                return Err(StoreError::DuplicateNode {
                    existing: Box::new(existing.clone()),
                });
            }
        }
        inner.name_index.insert(key, node.id);
        inner.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn merge_node(&self, id: &NodeId, patch: NodePatch) -> Result<Node, StoreError> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or(StoreError::NodeNotFound(*id))?;
        patch.apply(node);
        Ok(node.clone())
    }

    async fn insert_edge(&self, edge: Edge) -> Result<Edge, StoreError> {
        let mut inner = self.inner.write();
        for endpoint in [edge.from, edge.to] {
            match inner.nodes.get(&endpoint) {
                Some(n) if n.active => {}
                _ => return Err(StoreError::EndpointNotActive(endpoint)),
            }
        }
        let key = (edge.edge_type, edge.from, edge.to);
        if let Some(existing_id) = inner.pair_index.get(&key) {
            if let Some(existing) = inner.edges.get(existing_id) {
                return Err(StoreError::DuplicateEdge {
                    existing: Box::new(existing.clone()),
                });
            }
        }
        inner.pair_index.insert(key, edge.id);
        inner.edges.insert(edge.id, edge.clone());
        Ok(edge)
    }

    async fn merge_edge(&self, id: &EdgeId, patch: EdgePatch) -> Result<Edge, StoreError> {
        let mut inner = self.inner.write();
        let edge = inner
            .edges
            .get_mut(id)
            .ok_or(StoreError::EdgeNotFound(*id))?;
        patch.apply(edge);
        Ok(edge.clone())
    }

    async fn deactivate_edge(&self, id: &EdgeId) -> Result<(Edge, bool), StoreError> {
        let mut inner = self.inner.write();
        let edge = inner
            .edges
            .get_mut(id)
            .ok_or(StoreError::EdgeNotFound(*id))?;
        if !edge.active {
            let snapshot = edge.clone();
            return Ok((snapshot, false));
        }
        edge.active = false;
        edge.updated_at = Utc::now();
        let snapshot = edge.clone();
        let key = (snapshot.edge_type, snapshot.from, snapshot.to);
        inner.pair_index.remove(&key);
        Ok((snapshot, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::TurnId;

    fn person(name: &str) -> Node {
        let mut n = Node::new(NodeType::Person, name, 0.9, TurnId::new("t-1"));
        n.aliases.insert(name.to_string());
        n
    }

    #[tokio::test]
    async fn insert_enforces_active_name_uniqueness() {
        let store = MemoryStore::new();
        let first = store.insert_node(person("alex")).await.unwrap();

        let err = store.insert_node(person("alex")).await.unwrap_err();
        match err {
            StoreError::DuplicateNode { existing } => assert_eq!(existing.id, first.id),
            other => panic!("expected DuplicateNode, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn edge_requires_active_endpoints_and_unique_pair() {
        let store = MemoryStore::new();
        let alex = store.insert_node(person("alex")).await.unwrap();
        let acme = store
            .insert_node(Node::new(
                NodeType::Organization,
                "acme",
                0.9,
                TurnId::new("t-1"),
            ))
            .await
            .unwrap();

        let edge = Edge::new(EdgeType::WorksAt, alex.id, acme.id, 0.9, TurnId::new("t-1"));
        let inserted = store.insert_edge(edge).await.unwrap();

        // Same ordered pair again: duplicate.
        let dup = Edge::new(EdgeType::WorksAt, alex.id, acme.id, 0.9, TurnId::new("t-2"));
        match store.insert_edge(dup).await.unwrap_err() {
            StoreError::DuplicateEdge { existing } => assert_eq!(existing.id, inserted.id),
            other => panic!("expected DuplicateEdge, got {other:?}"),
        }

        // Missing endpoint.
        let dangling = Edge::new(
            EdgeType::WorksAt,
            alex.id,
            NodeId::new(),
            0.9,
            TurnId::new("t-3"),
        );
        assert!(matches!(
            store.insert_edge(dangling).await.unwrap_err(),
            StoreError::EndpointNotActive(_)
        ));
    }

    #[tokio::test]
    async fn deactivate_frees_the_pair_and_preserves_history() {
        let store = MemoryStore::new();
        let alex = store.insert_node(person("alex")).await.unwrap();
        let jazz = store
            .insert_node(Node::new(
                NodeType::Concept,
                "jazz",
                0.9,
                TurnId::new("t-1"),
            ))
            .await
            .unwrap();

        let edge = store
            .insert_edge(Edge::new(
                EdgeType::Likes,
                alex.id,
                jazz.id,
                0.9,
                TurnId::new("t-1"),
            ))
            .await
            .unwrap();

        let (after, changed) = store.deactivate_edge(&edge.id).await.unwrap();
        assert!(changed);
        assert!(!after.active);

        // Idempotent.
        let (_, changed) = store.deactivate_edge(&edge.id).await.unwrap();
        assert!(!changed);

        // The inactive record is retrievable with its attributes unchanged.
        let fetched = store.get_edge(&edge.id).await.unwrap().unwrap();
        assert!(!fetched.active);
        assert_eq!(fetched.attributes, edge.attributes);

        // The pair is free again.
        let replacement = Edge::new(EdgeType::Likes, alex.id, jazz.id, 0.8, TurnId::new("t-2"));
        store.insert_edge(replacement).await.unwrap();
    }

    #[tokio::test]
    async fn merge_appends_without_duplicating_source_refs() {
        let store = MemoryStore::new();
        let node = store.insert_node(person("alex")).await.unwrap();

        let mut patch = NodePatch::default();
        patch.add_source_refs.push(TurnId::new("t-1"));
        patch.add_source_refs.push(TurnId::new("t-2"));
        patch.add_aliases.insert("Alexander".to_string());
        patch.confidence = Some(0.5);

        let merged = store.merge_node(&node.id, patch).await.unwrap();
        assert_eq!(merged.source_refs.len(), 2); // "t-1" deduplicated
        assert!(merged.aliases.contains("Alexander"));
        // Confidence is monotone.
        assert_eq!(merged.confidence, 0.9);
        assert!(merged.updated_at >= merged.created_at);
    }

    #[tokio::test]
    async fn stats_count_active_records_by_type() {
        let store = MemoryStore::new();
        let alex = store.insert_node(person("alex")).await.unwrap();
        let sam = store.insert_node(person("sam")).await.unwrap();
        store
            .insert_edge(Edge::new(
                EdgeType::Knows,
                alex.id,
                sam.id,
                0.9,
                TurnId::new("t-1"),
            ))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.active_nodes, 2);
        assert_eq!(stats.active_edges, 1);
        assert_eq!(stats.nodes_by_type.get("Person"), Some(&2));
        assert_eq!(stats.edges_by_type.get("KNOWS"), Some(&1));
    }
}
