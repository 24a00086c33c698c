//! Error types for the recall-sync crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] recall_graph::StoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] recall_audit::AuditError),

    #[error("Turn processing timed out after {0}ms")]
    Timeout(u64),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
