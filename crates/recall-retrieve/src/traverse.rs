//! Bounded breadth-first expansion from seed nodes.
//!
//! Only active nodes and edges are visited. Expansion order is by node
//! id within each depth level, so traversal over the same graph state is
//! deterministic.

use std::collections::{BTreeMap, HashSet};

use recall_core::{Edge, EdgeId, Node, NodeId};
use recall_graph::{GraphStore, StoreError};

/// Everything reachable from the seeds within the hop bound.
#[derive(Debug, Default)]
pub struct Traversal {
    /// Visited nodes with their BFS depth, keyed by id.
    pub nodes: BTreeMap<NodeId, (Node, u32)>,
    /// Every active edge seen between visited nodes.
    pub edges: BTreeMap<EdgeId, Edge>,
}

/// Expand outward from the seeds up to `hops` levels.
///
/// Seeds that are unknown or inactive are skipped; an empty traversal is
/// a valid result, not an error.
pub async fn expand(
    store: &dyn GraphStore,
    seeds: &[NodeId],
    hops: u32,
) -> Result<Traversal, StoreError> {
    let mut traversal = Traversal::default();
    let mut visited: HashSet<NodeId> = HashSet::new();

    let mut frontier: Vec<NodeId> = Vec::new();
    for seed in seeds {
        if visited.insert(*seed) {
            match store.get_node(seed).await? {
                Some(node) if node.active => {
                    traversal.nodes.insert(*seed, (node, 0));
                    frontier.push(*seed);
                }
                _ => {
                    tracing::debug!(node_id = %seed, "Seed missing or inactive, skipping");
                }
            }
        }
    }
    frontier.sort();

    let mut depth = 0;
    while !frontier.is_empty() && depth < hops {
        depth += 1;
        let mut next: Vec<NodeId> = Vec::new();
        for id in &frontier {
            for (edge, neighbor) in store.neighbors(id).await? {
                traversal.edges.entry(edge.id).or_insert(edge);
                if visited.insert(neighbor.id) {
                    next.push(neighbor.id);
                    traversal.nodes.insert(neighbor.id, (neighbor, depth));
                }
            }
        }
        next.sort();
        frontier = next;
    }

    // Frontier edges may lead to nodes past the hop bound; keep only
    // edges with both endpoints visited.
    traversal
        .edges
        .retain(|_, edge| visited_node(&traversal.nodes, edge.from) && visited_node(&traversal.nodes, edge.to));

    Ok(traversal)
}

fn visited_node(nodes: &BTreeMap<NodeId, (Node, u32)>, id: NodeId) -> bool {
    nodes.contains_key(&id)
}
