//! recall-sync: Triple ingestion pipeline for the Recall knowledge graph.
//!
//! Takes candidate triples extracted from conversation turns, resolves
//! mentioned entities against the graph, plans a safe batch of mutations,
//! and applies them with an audit trail for every write.

pub mod config;
pub mod error;
pub mod execute;
pub mod pipeline;
pub mod plan;
pub mod resolve;
