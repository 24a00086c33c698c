//! Neo4j connection management and the Neo4j-backed [`GraphStore`].

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use recall_core::{Edge, EdgeId, EdgeType, Node, NodeId, NodeType};

use crate::store::{EdgePatch, GraphStats, GraphStore, NodePatch, StoreError};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "recall-dev".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

/// Neo4j-backed graph store with connection pooling. Clone is cheap
/// (inner Arc).
///
/// Nodes carry their type as the label; edges carry theirs as the
/// relationship type. Structured fields (aliases, attributes, source_refs)
/// are stored as JSON string properties and decoded on read.
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect to Neo4j and create the per-type id indexes and
    /// canonical-name uniqueness constraints.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, StoreError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;

        let store = Self { graph };
        store.ensure_indexes().await?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for node_type in NodeType::all() {
            let label = node_type.as_str();
            self.run(neo4rs::query(&format!(
                "CREATE INDEX {}_id IF NOT EXISTS FOR (n:{label}) ON (n.id)",
                label.to_lowercase()
            )))
            .await?;
            // Nodes are merged in place and never deactivated, so the
            // canonical name is unique per label outright. The
            // constraint is what makes concurrent MERGEs race-safe; a
            // loser surfaces a constraint violation, retries, and its
            // MERGE then matches the winner.
            self.run(neo4rs::query(&format!(
                "CREATE CONSTRAINT {}_name IF NOT EXISTS \
                 FOR (n:{label}) REQUIRE n.canonical_name IS UNIQUE",
                label.to_lowercase()
            )))
            .await?;
        }
        Ok(())
    }

    /// Execute a write-only query (CREATE, MERGE, SET).
    pub(crate) async fn run(&self, query: Query) -> Result<(), StoreError> {
        self.graph.run(query).await.map_err(map_neo4j_err)
    }

    /// Execute a read query and collect all rows.
    pub(crate) async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, StoreError> {
        let mut stream = self.graph.execute(query).await.map_err(map_neo4j_err)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(map_neo4j_err)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub(crate) async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, StoreError> {
        let mut stream = self.graph.execute(query).await.map_err(map_neo4j_err)?;
        stream.next().await.map_err(map_neo4j_err)
    }
}

/// Connection-level failures and lost unique-constraint races retry;
/// everything else is fatal to the plan.
pub(crate) fn map_neo4j_err(e: neo4rs::Error) -> StoreError {
    let msg = e.to_string();
    if is_transient_message(&msg) {
        StoreError::Transient(msg)
    } else {
        StoreError::Backend(msg)
    }
}

fn is_transient_message(msg: &str) -> bool {
    let lowered = msg.to_lowercase();
    lowered.contains("connection")
        || lowered.contains("io error")
        || lowered.contains("timed out")
        // A canonical_name constraint violation means another writer won
        // the create race; the retried MERGE matches the winner.
        || lowered.contains("constraintvalidation")
        || lowered.contains("already exists with label")
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, StoreError> {
        self.fetch_node(id).await
    }

    async fn get_edge(&self, id: &EdgeId) -> Result<Option<Edge>, StoreError> {
        self.fetch_edge(id).await
    }

    async fn active_nodes_of_type(&self, node_type: NodeType) -> Result<Vec<Node>, StoreError> {
        self.fetch_active_nodes_of_type(node_type).await
    }

    async fn find_active_node(
        &self,
        node_type: NodeType,
        canonical_name: &str,
    ) -> Result<Option<Node>, StoreError> {
        self.fetch_active_by_name(node_type, canonical_name).await
    }

    async fn active_edge_between(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
        to: &NodeId,
    ) -> Result<Option<Edge>, StoreError> {
        self.fetch_active_edge_between(edge_type, from, to).await
    }

    async fn active_edges_from(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
    ) -> Result<Vec<Edge>, StoreError> {
        self.fetch_active_edges_from(edge_type, from).await
    }

    async fn neighbors(&self, id: &NodeId) -> Result<Vec<(Edge, Node)>, StoreError> {
        self.fetch_neighbors(id).await
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        self.fetch_stats().await
    }

    async fn insert_node(&self, node: Node) -> Result<Node, StoreError> {
        self.create_node(node).await
    }

    async fn merge_node(&self, id: &NodeId, patch: NodePatch) -> Result<Node, StoreError> {
        self.patch_node(id, patch).await
    }

    async fn insert_edge(&self, edge: Edge) -> Result<Edge, StoreError> {
        self.create_edge(edge).await
    }

    async fn merge_edge(&self, id: &EdgeId, patch: EdgePatch) -> Result<Edge, StoreError> {
        self.patch_edge(id, patch).await
    }

    async fn deactivate_edge(&self, id: &EdgeId) -> Result<(Edge, bool), StoreError> {
        self.mark_edge_inactive(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_constraint_race_classifies_as_transient() {
        assert!(is_transient_message(
            "Node(42) already exists with label `Person` and property `canonical_name` = 'sam'"
        ));
        assert!(is_transient_message(
            "Neo.ClientError.Schema.ConstraintValidationFailed"
        ));
        assert!(is_transient_message("connection reset by peer"));
        assert!(!is_transient_message("syntax error near MERGE"));
    }
}
