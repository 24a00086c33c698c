//! The retrieved subgraph and its visualization export.

use serde::Serialize;
use serde_json::json;

use recall_core::{Edge, Node, NodeId, NodeType};

/// A node with its retrieval provenance.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode {
    pub node: Node,
    /// BFS hops from the nearest seed.
    pub depth: u32,
    pub score: f64,
}

/// The bounded, scored neighborhood returned by retrieval.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Subgraph {
    /// Seed ids the expansion started from.
    pub seeds: Vec<NodeId>,
    /// Retained nodes, best score first.
    pub nodes: Vec<ScoredNode>,
    /// Active edges whose endpoints were both retained.
    pub edges: Vec<Edge>,
}

impl Subgraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Export in the node/edge shape graph visualization frontends
    /// expect, with a color per node type.
    pub fn to_view(&self) -> serde_json::Value {
        let nodes: Vec<serde_json::Value> = self
            .nodes
            .iter()
            .map(|scored| {
                json!({
                    "id": scored.node.id,
                    "label": scored.node.canonical_name,
                    "type": scored.node.node_type.as_str(),
                    "color": color_for(scored.node.node_type),
                    "score": scored.score,
                    "properties": scored.node.attributes,
                })
            })
            .collect();
        let edges: Vec<serde_json::Value> = self
            .edges
            .iter()
            .map(|edge| {
                json!({
                    "source": edge.from,
                    "target": edge.to,
                    "type": edge.edge_type.as_str(),
                    "properties": edge.attributes,
                })
            })
            .collect();
        json!({
            "nodes": nodes,
            "edges": edges,
            "total_nodes": self.nodes.len(),
            "total_edges": self.edges.len(),
        })
    }
}

/// Display color per node type.
pub fn color_for(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Person => "#FF6B6B",
        NodeType::Concept => "#4ECDC4",
        NodeType::Event => "#45B7D1",
        NodeType::Preference => "#96CEB4",
        NodeType::Location => "#FFEAA7",
        NodeType::Organization => "#DDA0DD",
        NodeType::Skill => "#98D8C8",
        NodeType::Goal => "#F7DC6F",
        NodeType::Memory => "#BB8FCE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::TurnId;

    #[test]
    fn view_export_carries_labels_and_colors() {
        let node = Node::new(NodeType::Person, "alex", 0.9, TurnId::new("t-1"));
        let subgraph = Subgraph {
            seeds: vec![node.id],
            nodes: vec![ScoredNode {
                node,
                depth: 0,
                score: 1.0,
            }],
            edges: Vec::new(),
        };

        let view = subgraph.to_view();
        assert_eq!(view["total_nodes"], 1);
        assert_eq!(view["nodes"][0]["label"], "alex");
        assert_eq!(view["nodes"][0]["color"], "#FF6B6B");
    }
}
