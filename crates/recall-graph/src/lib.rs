//! recall-graph: The storage boundary for the Recall engine.
//!
//! The core components (resolver, planner, executor, retriever) talk to a
//! [`GraphStore`] trait object, never to a concrete backend. Two
//! implementations are provided:
//! - [`MemoryStore`]: in-process reference store, also the test double
//! - [`Neo4jStore`]: Neo4j-backed store using MERGE (upsert) semantics
//!
//! Uniqueness constraints live here, at the storage boundary: active nodes
//! are unique per `(node_type, canonical_name)` and active edges per
//! `(edge_type, from, to)`. Violations surface as `DuplicateNode` /
//! `DuplicateEdge` carrying the winning record so callers can read-repair.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::{Neo4jConfig, Neo4jStore};
pub use memory::{GraphSnapshot, MemoryStore};
pub use store::{EdgePatch, GraphStats, GraphStore, NodePatch, StoreError};
