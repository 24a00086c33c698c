//! Write operations for the Neo4j store.
//!
//! Creates use MERGE keyed on the uniqueness constraint
//! (`canonical_name`/pair + `active: true`), so a racing writer is
//! observed as a matched existing record and surfaced as a duplicate for
//! the executor to read-repair.

use chrono::Utc;
use neo4rs::query;
use recall_core::{Edge, EdgeId, Node, NodeId};

use crate::client::Neo4jStore;
use crate::store::{EdgePatch, NodePatch, StoreError};

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("graph record serialization should not fail")
}

impl Neo4jStore {
    pub(crate) async fn create_node(&self, node: Node) -> Result<Node, StoreError> {
        let label = node.node_type.as_str();
        let cypher = format!(
            "MERGE (n:{label} {{canonical_name: $canonical_name, active: true}})
             ON CREATE SET
               n.id = $id, n.node_type = $node_type, n.aliases = $aliases,
               n.attributes = $attributes, n.confidence = $confidence,
               n.created_at = $created_at, n.updated_at = $updated_at,
               n.source_refs = $source_refs
             RETURN n"
        );

        let q = query(&cypher)
            .param("canonical_name", node.canonical_name.clone())
            .param("id", node.id.to_string())
            .param("node_type", label.to_string())
            .param("aliases", to_json(&node.aliases))
            .param("attributes", to_json(&node.attributes))
            .param("confidence", node.confidence)
            .param("created_at", node.created_at.to_rfc3339())
            .param("updated_at", node.updated_at.to_rfc3339())
            .param("source_refs", to_json(&node.source_refs));

        let row = self
            .query_one(q)
            .await?
            .ok_or_else(|| StoreError::Backend("MERGE returned no row".to_string()))?;
        let stored = crate::queries::decode_node_row(&row, "n")?;

        if stored.id != node.id {
            // The MERGE matched a pre-existing active node: lost the race.
            return Err(StoreError::DuplicateNode {
                existing: Box::new(stored),
            });
        }
        Ok(node)
    }

    pub(crate) async fn patch_node(
        &self,
        id: &NodeId,
        patch: NodePatch,
    ) -> Result<Node, StoreError> {
        let mut node = self
            .fetch_node(id)
            .await?
            .ok_or(StoreError::NodeNotFound(*id))?;
        patch.apply(&mut node);

        let q = query(
            "MATCH (n {id: $id})
             SET n.aliases = $aliases, n.attributes = $attributes,
                 n.confidence = $confidence, n.updated_at = $updated_at,
                 n.source_refs = $source_refs",
        )
        .param("id", node.id.to_string())
        .param("aliases", to_json(&node.aliases))
        .param("attributes", to_json(&node.attributes))
        .param("confidence", node.confidence)
        .param("updated_at", node.updated_at.to_rfc3339())
        .param("source_refs", to_json(&node.source_refs));

        self.run(q).await?;
        Ok(node)
    }

    pub(crate) async fn create_edge(&self, edge: Edge) -> Result<Edge, StoreError> {
        // Precise endpoint errors before the MERGE touches anything.
        for endpoint in [edge.from, edge.to] {
            match self.fetch_node(&endpoint).await? {
                Some(n) if n.active => {}
                _ => return Err(StoreError::EndpointNotActive(endpoint)),
            }
        }

        let rel = edge.edge_type.as_str();
        let cypher = format!(
            "MATCH (a {{id: $from}}), (b {{id: $to}})
             MERGE (a)-[r:{rel} {{active: true}}]->(b)
             ON CREATE SET
               r.id = $id, r.attributes = $attributes, r.confidence = $confidence,
               r.created_at = $created_at, r.updated_at = $updated_at,
               r.source_refs = $source_refs, r.from_id = $from, r.to_id = $to
             RETURN r"
        );

        let q = query(&cypher)
            .param("from", edge.from.to_string())
            .param("to", edge.to.to_string())
            .param("id", edge.id.to_string())
            .param("attributes", to_json(&edge.attributes))
            .param("confidence", edge.confidence)
            .param("created_at", edge.created_at.to_rfc3339())
            .param("updated_at", edge.updated_at.to_rfc3339())
            .param("source_refs", to_json(&edge.source_refs));

        let row = self
            .query_one(q)
            .await?
            .ok_or_else(|| StoreError::Backend("MERGE returned no row".to_string()))?;
        let stored = crate::queries::decode_edge_row(&row, "r", edge.edge_type)?;

        if stored.id != edge.id {
            return Err(StoreError::DuplicateEdge {
                existing: Box::new(stored),
            });
        }
        Ok(edge)
    }

    pub(crate) async fn patch_edge(
        &self,
        id: &EdgeId,
        patch: EdgePatch,
    ) -> Result<Edge, StoreError> {
        let mut edge = self
            .fetch_edge(id)
            .await?
            .ok_or(StoreError::EdgeNotFound(*id))?;
        patch.apply(&mut edge);

        let q = query(
            "MATCH ()-[r {id: $id}]->()
             SET r.attributes = $attributes, r.confidence = $confidence,
                 r.updated_at = $updated_at, r.source_refs = $source_refs",
        )
        .param("id", edge.id.to_string())
        .param("attributes", to_json(&edge.attributes))
        .param("confidence", edge.confidence)
        .param("updated_at", edge.updated_at.to_rfc3339())
        .param("source_refs", to_json(&edge.source_refs));

        self.run(q).await?;
        Ok(edge)
    }

    pub(crate) async fn mark_edge_inactive(
        &self,
        id: &EdgeId,
    ) -> Result<(Edge, bool), StoreError> {
        let mut edge = self
            .fetch_edge(id)
            .await?
            .ok_or(StoreError::EdgeNotFound(*id))?;
        if !edge.active {
            return Ok((edge, false));
        }

        edge.active = false;
        edge.updated_at = Utc::now();

        let q = query(
            "MATCH ()-[r {id: $id}]->()
             SET r.active = false, r.updated_at = $updated_at",
        )
        .param("id", edge.id.to_string())
        .param("updated_at", edge.updated_at.to_rfc3339());

        self.run(q).await?;
        Ok((edge, true))
    }
}
