//! recall-audit — Append-only, tamper-evident history of graph mutations.
//!
//! Every operation the executor applies appends one [`AuditRecord`] with
//! the record's before and after states. Records are BLAKE3 hash-chained
//! to their predecessor, so reordering or editing the log is detectable,
//! and the log replays back into the exact current active graph state
//! (see [`replay`]). The log is append-only and ordered by application
//! time, so downstream consumers can tail it as a change stream.

pub mod hash;
pub mod replay;
pub mod store;

use chrono::{DateTime, Utc};
use recall_core::{Edge, Node, TurnId};
use serde::{Deserialize, Serialize};

pub use replay::{replay, ReplayState};
pub use store::{AuditError, AuditStore, FileAuditLog, MemoryAuditLog};

/// The kind of mutation an audit record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOp {
    CreateNode,
    MergeNode,
    CreateEdge,
    UpdateEdge,
    SupersedeEdge,
}

/// Before/after state carried by an audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Node(Node),
    Edge(Edge),
}

/// One applied operation, not yet sequenced into the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub op: AuditOp,
    /// State before the mutation; `None` for creates.
    pub before: Option<EntityState>,
    /// State after the mutation. A supersession without replacement
    /// carries the deactivated record here.
    pub after: Option<EntityState>,
    pub at: DateTime<Utc>,
    pub source_refs: Vec<TurnId>,
}

/// A sequenced, hash-chained audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// Position in the log, starting at 0. Assigned by the store.
    pub seq: u64,
    pub op: AuditOp,
    pub before: Option<EntityState>,
    pub after: Option<EntityState>,
    pub at: DateTime<Utc>,
    pub source_refs: Vec<TurnId>,
    /// Hash of the previous record; `None` for the first.
    pub prev_hash: Option<String>,
    /// BLAKE3 over this record's content and `prev_hash` (hex).
    pub content_hash: String,
}

impl AuditRecord {
    /// Recompute this record's hash from its content.
    pub fn compute_hash(&self) -> String {
        hash::compute_record_hash(self)
    }

    /// Verify that the stored hash matches a freshly computed one.
    pub fn verify_integrity(&self) -> bool {
        self.content_hash == self.compute_hash()
    }
}

/// Verify the hash chain of an ordered slice of records.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), AuditError> {
    let mut prev: Option<&str> = None;
    for record in records {
        if record.prev_hash.as_deref() != prev {
            return Err(AuditError::ChainBroken { seq: record.seq });
        }
        if !record.verify_integrity() {
            return Err(AuditError::IntegrityViolation { seq: record.seq });
        }
        prev = Some(&record.content_hash);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::{Node, NodeType};

    fn entry(op: AuditOp, node: Node) -> AuditEntry {
        AuditEntry {
            op,
            before: None,
            after: Some(EntityState::Node(node)),
            at: Utc::now(),
            source_refs: vec![TurnId::new("t-1")],
        }
    }

    #[test]
    fn chain_verifies_and_detects_tampering() {
        let log = MemoryAuditLog::new();
        for name in ["alex", "sam"] {
            let node = Node::new(NodeType::Person, name, 0.9, TurnId::new("t-1"));
            log.append(entry(AuditOp::CreateNode, node)).unwrap();
        }

        let mut records = log.list().unwrap();
        verify_chain(&records).unwrap();

        // Tamper with the first record's payload.
        records[0].source_refs.push(TurnId::new("t-forged"));
        assert!(matches!(
            verify_chain(&records),
            Err(AuditError::IntegrityViolation { seq: 0 })
        ));
    }

    #[test]
    fn chain_detects_reordering() {
        let log = MemoryAuditLog::new();
        for name in ["alex", "sam", "kim"] {
            let node = Node::new(NodeType::Person, name, 0.9, TurnId::new("t-1"));
            log.append(entry(AuditOp::CreateNode, node)).unwrap();
        }

        let mut records = log.list().unwrap();
        records.swap(1, 2);
        assert!(matches!(
            verify_chain(&records),
            Err(AuditError::ChainBroken { .. })
        ));
    }
}
