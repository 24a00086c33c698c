//! Read operations and row decoding for the Neo4j store.

use chrono::{DateTime, Utc};
use neo4rs::query;
use recall_core::{Edge, EdgeId, EdgeType, Node, NodeId, NodeType};
use uuid::Uuid;

use crate::client::Neo4jStore;
use crate::store::{GraphStats, StoreError};

impl Neo4jStore {
    pub(crate) async fn fetch_node(&self, id: &NodeId) -> Result<Option<Node>, StoreError> {
        let q = query("MATCH (n {id: $id}) RETURN n LIMIT 1").param("id", id.to_string());
        match self.query_one(q).await? {
            Some(row) => Ok(Some(decode_node_row(&row, "n")?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn fetch_edge(&self, id: &EdgeId) -> Result<Option<Edge>, StoreError> {
        let q = query("MATCH ()-[r {id: $id}]->() RETURN r, type(r) AS rel_type LIMIT 1")
            .param("id", id.to_string());
        match self.query_one(q).await? {
            Some(row) => {
                let edge_type = decode_rel_type(&row)?;
                Ok(Some(decode_edge_row(&row, "r", edge_type)?))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn fetch_active_nodes_of_type(
        &self,
        node_type: NodeType,
    ) -> Result<Vec<Node>, StoreError> {
        let cypher = format!(
            "MATCH (n:{label}) WHERE n.active = true RETURN n ORDER BY n.id",
            label = node_type.as_str()
        );
        let rows = self.query_rows(query(&cypher)).await?;
        rows.iter().map(|row| decode_node_row(row, "n")).collect()
    }

    pub(crate) async fn fetch_active_by_name(
        &self,
        node_type: NodeType,
        canonical_name: &str,
    ) -> Result<Option<Node>, StoreError> {
        let cypher = format!(
            "MATCH (n:{label} {{canonical_name: $name, active: true}}) RETURN n LIMIT 1",
            label = node_type.as_str()
        );
        let q = query(&cypher).param("name", canonical_name.to_string());
        match self.query_one(q).await? {
            Some(row) => Ok(Some(decode_node_row(&row, "n")?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn fetch_active_edge_between(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
        to: &NodeId,
    ) -> Result<Option<Edge>, StoreError> {
        let cypher = format!(
            "MATCH (a {{id: $from}})-[r:{rel}]->(b {{id: $to}})
             WHERE r.active = true
             RETURN r LIMIT 1",
            rel = edge_type.as_str()
        );
        let q = query(&cypher)
            .param("from", from.to_string())
            .param("to", to.to_string());
        match self.query_one(q).await? {
            Some(row) => Ok(Some(decode_edge_row(&row, "r", edge_type)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn fetch_active_edges_from(
        &self,
        edge_type: EdgeType,
        from: &NodeId,
    ) -> Result<Vec<Edge>, StoreError> {
        let cypher = format!(
            "MATCH (a {{id: $from}})-[r:{rel}]->()
             WHERE r.active = true
             RETURN r ORDER BY r.id",
            rel = edge_type.as_str()
        );
        let q = query(&cypher).param("from", from.to_string());
        let rows = self.query_rows(q).await?;
        rows.iter()
            .map(|row| decode_edge_row(row, "r", edge_type))
            .collect()
    }

    pub(crate) async fn fetch_neighbors(
        &self,
        id: &NodeId,
    ) -> Result<Vec<(Edge, Node)>, StoreError> {
        let q = query(
            "MATCH (a {id: $id})-[r]-(b)
             WHERE a.active = true AND r.active = true AND b.active = true
             RETURN r, type(r) AS rel_type, b
             ORDER BY r.id",
        )
        .param("id", id.to_string());

        let rows = self.query_rows(q).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let edge_type = decode_rel_type(row)?;
            let edge = decode_edge_row(row, "r", edge_type)?;
            let node = decode_node_row(row, "b")?;
            result.push((edge, node));
        }
        Ok(result)
    }

    pub(crate) async fn fetch_stats(&self) -> Result<GraphStats, StoreError> {
        let mut stats = GraphStats::default();

        if let Some(row) = self
            .query_one(query("MATCH (n) RETURN count(n) AS cnt"))
            .await?
        {
            stats.total_nodes = row.get::<i64>("cnt").unwrap_or(0) as usize;
        }
        if let Some(row) = self
            .query_one(query("MATCH ()-[r]->() RETURN count(r) AS cnt"))
            .await?
        {
            stats.total_edges = row.get::<i64>("cnt").unwrap_or(0) as usize;
        }

        let rows = self
            .query_rows(query(
                "MATCH (n) WHERE n.active = true
                 RETURN n.node_type AS t, count(n) AS cnt",
            ))
            .await?;
        for row in rows {
            let t: String = row.get("t").unwrap_or_default();
            let cnt = row.get::<i64>("cnt").unwrap_or(0) as usize;
            stats.active_nodes += cnt;
            stats.nodes_by_type.insert(t, cnt);
        }

        let rows = self
            .query_rows(query(
                "MATCH ()-[r]->() WHERE r.active = true
                 RETURN type(r) AS t, count(r) AS cnt",
            ))
            .await?;
        for row in rows {
            let t: String = row.get("t").unwrap_or_default();
            let cnt = row.get::<i64>("cnt").unwrap_or(0) as usize;
            stats.active_edges += cnt;
            stats.edges_by_type.insert(t, cnt);
        }

        Ok(stats)
    }
}

// ── Row Decoding ──────────────────────────────────────────────────

fn decode_err(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("failed to decode {what}: {detail}"))
}

pub(crate) fn decode_rel_type(row: &neo4rs::Row) -> Result<EdgeType, StoreError> {
    let raw: String = row
        .get("rel_type")
        .map_err(|e| decode_err("relationship type", e))?;
    EdgeType::parse(&raw).ok_or_else(|| decode_err("relationship type", &raw))
}

pub(crate) fn decode_node_row(row: &neo4rs::Row, column: &str) -> Result<Node, StoreError> {
    let neo_node: neo4rs::Node = row.get(column).map_err(|e| decode_err("node", e))?;

    let node_type_raw: String = neo_node
        .get("node_type")
        .map_err(|e| decode_err("node_type", e))?;
    let node_type =
        NodeType::parse(&node_type_raw).ok_or_else(|| decode_err("node_type", &node_type_raw))?;

    Ok(Node {
        id: NodeId(parse_uuid(&get_string(&neo_node, "id")?)?),
        node_type,
        canonical_name: get_string(&neo_node, "canonical_name")?,
        aliases: parse_json(&get_string(&neo_node, "aliases")?)?,
        attributes: parse_json(&get_string(&neo_node, "attributes")?)?,
        confidence: neo_node.get::<f64>("confidence").unwrap_or(0.0),
        created_at: parse_time(&get_string(&neo_node, "created_at")?)?,
        updated_at: parse_time(&get_string(&neo_node, "updated_at")?)?,
        source_refs: parse_json(&get_string(&neo_node, "source_refs")?)?,
        active: neo_node.get::<bool>("active").unwrap_or(false),
    })
}

pub(crate) fn decode_edge_row(
    row: &neo4rs::Row,
    column: &str,
    edge_type: EdgeType,
) -> Result<Edge, StoreError> {
    let rel: neo4rs::Relation = row.get(column).map_err(|e| decode_err("edge", e))?;

    Ok(Edge {
        id: EdgeId(parse_uuid(&get_rel_string(&rel, "id")?)?),
        edge_type,
        from: NodeId(parse_uuid(&get_rel_string(&rel, "from_id")?)?),
        to: NodeId(parse_uuid(&get_rel_string(&rel, "to_id")?)?),
        attributes: parse_json(&get_rel_string(&rel, "attributes")?)?,
        confidence: rel.get::<f64>("confidence").unwrap_or(0.0),
        created_at: parse_time(&get_rel_string(&rel, "created_at")?)?,
        updated_at: parse_time(&get_rel_string(&rel, "updated_at")?)?,
        source_refs: parse_json(&get_rel_string(&rel, "source_refs")?)?,
        active: rel.get::<bool>("active").unwrap_or(false),
    })
}

fn get_string(node: &neo4rs::Node, key: &str) -> Result<String, StoreError> {
    node.get::<String>(key)
        .map_err(|e| decode_err(&format!("node property {key}"), e))
}

fn get_rel_string(rel: &neo4rs::Relation, key: &str) -> Result<String, StoreError> {
    rel.get::<String>(key)
        .map_err(|e| decode_err(&format!("edge property {key}"), e))
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| decode_err("uuid", e))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| decode_err("timestamp", e))
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| decode_err("json property", e))
}
