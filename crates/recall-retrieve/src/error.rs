//! Error types for the recall-retrieve crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("Store error: {0}")]
    Store(#[from] recall_graph::StoreError),

    #[error("Unknown entity reference: {0}")]
    BadEntityRef(String),
}

pub type Result<T> = std::result::Result<T, RetrieveError>;
