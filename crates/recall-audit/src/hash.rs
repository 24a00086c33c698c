//! BLAKE3 content hashing for the audit chain.
//!
//! Each record's hash covers all its fields except `content_hash` itself,
//! including `prev_hash`, which links the records into a chain.

use serde::Serialize;

use crate::{AuditOp, AuditRecord, EntityState};

/// Hashable view of an AuditRecord (excludes content_hash).
#[derive(Serialize)]
struct HashableRecord<'a> {
    seq: u64,
    op: &'a AuditOp,
    before: &'a Option<EntityState>,
    after: &'a Option<EntityState>,
    at: &'a chrono::DateTime<chrono::Utc>,
    source_refs: &'a [recall_core::TurnId],
    prev_hash: &'a Option<String>,
}

/// Compute the BLAKE3 hash of a record's content, hex-encoded.
pub fn compute_record_hash(record: &AuditRecord) -> String {
    let hashable = HashableRecord {
        seq: record.seq,
        op: &record.op,
        before: &record.before,
        after: &record.after,
        at: &record.at,
        source_refs: &record.source_refs,
        prev_hash: &record.prev_hash,
    };

    let json = serde_json::to_vec(&hashable).expect("audit record serialization should not fail");
    blake3::hash(&json).to_hex().to_string()
}
