//! Rebuild graph state from the audit log.

use std::collections::BTreeMap;

use recall_core::{Edge, EdgeId, Node, NodeId};

use crate::{AuditRecord, EntityState};

/// Active graph state reconstructed by folding audit records in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayState {
    pub active_nodes: BTreeMap<NodeId, Node>,
    pub active_edges: BTreeMap<EdgeId, Edge>,
}

/// Fold a record sequence into the state it produces.
///
/// Each record's `after` snapshot is authoritative: an active entity
/// replaces any prior version, an inactive one drops out of the active
/// set. Records must already be chain-verified by the caller.
pub fn replay(records: &[AuditRecord]) -> ReplayState {
    let mut state = ReplayState::default();
    for record in records {
        match &record.after {
            Some(EntityState::Node(node)) => {
                if node.active {
                    state.active_nodes.insert(node.id, node.clone());
                } else {
                    state.active_nodes.remove(&node.id);
                }
            }
            Some(EntityState::Edge(edge)) => {
                if edge.active {
                    state.active_edges.insert(edge.id, edge.clone());
                } else {
                    state.active_edges.remove(&edge.id);
                }
            }
            None => {}
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditEntry, AuditOp, AuditStore, MemoryAuditLog};
    use chrono::Utc;
    use recall_core::{EdgeType, NodeType, TurnId};

    #[test]
    fn replay_applies_supersession() {
        let log = MemoryAuditLog::new();
        let turn = TurnId::new("t-1");

        let alex = Node::new(NodeType::Person, "alex", 0.9, turn.clone());
        let acme = Node::new(NodeType::Organization, "acme", 0.9, turn.clone());
        let mut works = Edge::new(
            EdgeType::WorksAt,
            alex.id,
            acme.id,
            0.9,
            turn.clone(),
        );

        for node in [&alex, &acme] {
            log.append(AuditEntry {
                op: AuditOp::CreateNode,
                before: None,
                after: Some(EntityState::Node(node.clone())),
                at: Utc::now(),
                source_refs: vec![turn.clone()],
            })
            .unwrap();
        }
        log.append(AuditEntry {
            op: AuditOp::CreateEdge,
            before: None,
            after: Some(EntityState::Edge(works.clone())),
            at: Utc::now(),
            source_refs: vec![turn.clone()],
        })
        .unwrap();

        // Retract the employment edge.
        let before = works.clone();
        works.active = false;
        log.append(AuditEntry {
            op: AuditOp::SupersedeEdge,
            before: Some(EntityState::Edge(before)),
            after: Some(EntityState::Edge(works.clone())),
            at: Utc::now(),
            source_refs: vec![TurnId::new("t-2")],
        })
        .unwrap();

        let records = log.list().unwrap();
        crate::verify_chain(&records).unwrap();
        let state = replay(&records);
        assert_eq!(state.active_nodes.len(), 2);
        assert!(state.active_edges.is_empty());
    }
}
