//! Audit log persistence — trait, in-memory log, JSON-lines file log.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::{hash, AuditEntry, AuditRecord};

/// Errors from audit log operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// A record's stored hash does not match its content.
    #[error("integrity check failed for audit record {seq}")]
    IntegrityViolation { seq: u64 },

    /// A record's prev_hash does not match its predecessor.
    #[error("audit chain broken at record {seq}")]
    ChainBroken { seq: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for audit log backends. Append-only; records are sequenced and
/// hash-chained by the store.
pub trait AuditStore: Send + Sync {
    /// Sequence, hash, and persist one entry. Returns the full record.
    fn append(&self, entry: AuditEntry) -> Result<AuditRecord, AuditError>;

    /// All records in application order.
    fn list(&self) -> Result<Vec<AuditRecord>, AuditError>;
}

fn seal(entry: AuditEntry, seq: u64, prev_hash: Option<String>) -> AuditRecord {
    let mut record = AuditRecord {
        seq,
        op: entry.op,
        before: entry.before,
        after: entry.after,
        at: entry.at,
        source_refs: entry.source_refs,
        prev_hash,
        content_hash: String::new(),
    };
    record.content_hash = hash::compute_record_hash(&record);
    record
}

// ── In-Memory Log ─────────────────────────────────────────────────

/// In-process audit log, used in demo mode and tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for MemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<AuditRecord, AuditError> {
        let mut records = self.records.write();
        let seq = records.len() as u64;
        let prev_hash = records.last().map(|r| r.content_hash.clone());
        let record = seal(entry, seq, prev_hash);
        records.push(record.clone());
        Ok(record)
    }

    fn list(&self) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.records.read().clone())
    }
}

// ── File-Backed Log ───────────────────────────────────────────────

struct Cursor {
    next_seq: u64,
    prev_hash: Option<String>,
}

/// JSON-lines audit log on disk.
///
/// One record per line in `{root}/audit.jsonl`. The file is scanned once
/// at open to recover the chain cursor; appends go through a mutex so
/// sequencing stays consistent across tasks in one process.
pub struct FileAuditLog {
    path: PathBuf,
    cursor: Mutex<Cursor>,
}

impl FileAuditLog {
    /// Open (or create) the log under the given directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AuditError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let path = root.join("audit.jsonl");

        let mut next_seq = 0;
        let mut prev_hash = None;
        if path.exists() {
            let reader = BufReader::new(fs::File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: AuditRecord = serde_json::from_str(&line)?;
                next_seq = record.seq + 1;
                prev_hash = Some(record.content_hash);
            }
        }

        Ok(Self {
            path,
            cursor: Mutex::new(Cursor {
                next_seq,
                prev_hash,
            }),
        })
    }
}

impl AuditStore for FileAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<AuditRecord, AuditError> {
        let mut cursor = self.cursor.lock();
        let record = seal(entry, cursor.next_seq, cursor.prev_hash.clone());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&record)?;
        writeln!(file, "{line}")?;

        cursor.next_seq = record.seq + 1;
        cursor.prev_hash = Some(record.content_hash.clone());
        Ok(record)
    }

    fn list(&self) -> Result<Vec<AuditRecord>, AuditError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord = serde_json::from_str(&line)?;
            if !record.verify_integrity() {
                return Err(AuditError::IntegrityViolation { seq: record.seq });
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditOp, EntityState};
    use chrono::Utc;
    use recall_core::{Node, NodeType, TurnId};

    fn create_entry(name: &str) -> AuditEntry {
        AuditEntry {
            op: AuditOp::CreateNode,
            before: None,
            after: Some(EntityState::Node(Node::new(
                NodeType::Person,
                name,
                0.9,
                TurnId::new("t-1"),
            ))),
            at: Utc::now(),
            source_refs: vec![TurnId::new("t-1")],
        }
    }

    #[test]
    fn file_log_round_trips_and_resumes_chain() {
        let dir = tempfile::tempdir().unwrap();

        let log = FileAuditLog::open(dir.path()).unwrap();
        log.append(create_entry("alex")).unwrap();
        log.append(create_entry("sam")).unwrap();
        drop(log);

        // Reopen and continue appending; the chain must stay intact.
        let log = FileAuditLog::open(dir.path()).unwrap();
        log.append(create_entry("kim")).unwrap();

        let records = log.list().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].seq, 2);
        crate::verify_chain(&records).unwrap();
    }

    #[test]
    fn memory_log_sequences_from_zero() {
        let log = MemoryAuditLog::new();
        let first = log.append(create_entry("alex")).unwrap();
        let second = log.append(create_entry("sam")).unwrap();
        assert_eq!(first.seq, 0);
        assert!(first.prev_hash.is_none());
        assert_eq!(second.prev_hash.as_deref(), Some(first.content_hash.as_str()));
    }
}
