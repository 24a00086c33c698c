//! recall-core: Shared types and schema registry for the Recall knowledge graph.
//!
//! This crate provides the foundational types used across all Recall components:
//! - Node and edge records for the conversational-memory graph
//! - The candidate-triple contract consumed from the extractor
//! - The schema registry that validates candidates before they touch the graph

pub mod schema;
pub mod types;

pub use schema::{Cardinality, SchemaError, SchemaRegistry, TypedMention, ValidTriple};
pub use types::{
    Attributes, CandidateTriple, Edge, EdgeId, EdgeType, Mention, Node, NodeId, NodeType, TurnId,
};
