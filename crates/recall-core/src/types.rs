//! Core domain types for the Recall knowledge graph.
//!
//! Nodes and edges carry the full lifecycle state described in the data
//! model: provenance (`source_refs`), confidence, timestamps, and the
//! `active` flag. Superseded records stay in the store with `active = false`;
//! nothing is physically deleted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────────

/// Unique identifier for a node in the knowledge graph.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an edge in the knowledge graph.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the conversation turn a fact originated from.
///
/// Opaque to the core; assigned by whatever drives the extractor.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct TurnId(pub String);

impl TurnId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Node and Edge Type Vocabularies ───────────────────────────────

/// The closed set of node types.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum NodeType {
    Person,
    Concept,
    Event,
    Preference,
    Location,
    Organization,
    Skill,
    Goal,
    Memory,
}

impl NodeType {
    /// All node types, in a stable order.
    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::Person,
            NodeType::Concept,
            NodeType::Event,
            NodeType::Preference,
            NodeType::Location,
            NodeType::Organization,
            NodeType::Skill,
            NodeType::Goal,
            NodeType::Memory,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Person => "Person",
            NodeType::Concept => "Concept",
            NodeType::Event => "Event",
            NodeType::Preference => "Preference",
            NodeType::Location => "Location",
            NodeType::Organization => "Organization",
            NodeType::Skill => "Skill",
            NodeType::Goal => "Goal",
            NodeType::Memory => "Memory",
        }
    }

    /// Parse the extractor's string form ("Person", "Skill", ...).
    pub fn parse(raw: &str) -> Option<NodeType> {
        NodeType::all().iter().copied().find(|t| t.as_str() == raw)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of edge (relationship) types.
///
/// Serialized in the SCREAMING_SNAKE_CASE form the extractor emits
/// ("WORKS_AT", "SKILLED_IN", ...).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Knows,
    Likes,
    Dislikes,
    WorksAt,
    LivesIn,
    Attended,
    SkilledIn,
    WantsTo,
    Remembers,
    RelatedTo,
    PartOf,
    Created,
    Learned,
}

impl EdgeType {
    /// All edge types, in a stable order.
    pub fn all() -> &'static [EdgeType] {
        &[
            EdgeType::Knows,
            EdgeType::Likes,
            EdgeType::Dislikes,
            EdgeType::WorksAt,
            EdgeType::LivesIn,
            EdgeType::Attended,
            EdgeType::SkilledIn,
            EdgeType::WantsTo,
            EdgeType::Remembers,
            EdgeType::RelatedTo,
            EdgeType::PartOf,
            EdgeType::Created,
            EdgeType::Learned,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Knows => "KNOWS",
            EdgeType::Likes => "LIKES",
            EdgeType::Dislikes => "DISLIKES",
            EdgeType::WorksAt => "WORKS_AT",
            EdgeType::LivesIn => "LIVES_IN",
            EdgeType::Attended => "ATTENDED",
            EdgeType::SkilledIn => "SKILLED_IN",
            EdgeType::WantsTo => "WANTS_TO",
            EdgeType::Remembers => "REMEMBERS",
            EdgeType::RelatedTo => "RELATED_TO",
            EdgeType::PartOf => "PART_OF",
            EdgeType::Created => "CREATED",
            EdgeType::Learned => "LEARNED",
        }
    }

    /// Parse the extractor's string form ("WORKS_AT", ...).
    pub fn parse(raw: &str) -> Option<EdgeType> {
        EdgeType::all().iter().copied().find(|t| t.as_str() == raw)
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Graph Records ─────────────────────────────────────────────────

/// Attribute map for nodes and edges. BTreeMap keeps serialization and
/// hashing deterministic.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A node in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    /// Normalized label; unique per `(node_type, canonical_name)` among
    /// active nodes.
    pub canonical_name: String,
    /// Raw mention strings that resolved to this node.
    pub aliases: BTreeSet<String>,
    pub attributes: Attributes,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Conversation turns this node was asserted in. Never empty.
    pub source_refs: Vec<TurnId>,
    /// False once superseded. Inactive records are excluded from queries
    /// and uniqueness checks but retained for audit.
    pub active: bool,
}

impl Node {
    /// Create a fresh active node asserted by a single turn.
    pub fn new(
        node_type: NodeType,
        canonical_name: impl Into<String>,
        confidence: f64,
        turn: TurnId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            node_type,
            canonical_name: canonical_name.into(),
            aliases: BTreeSet::new(),
            attributes: Attributes::new(),
            confidence,
            created_at: now,
            updated_at: now,
            source_refs: vec![turn],
            active: true,
        }
    }
}

/// An edge between two active nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub edge_type: EdgeType,
    pub from: NodeId,
    pub to: NodeId,
    pub attributes: Attributes,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_refs: Vec<TurnId>,
    pub active: bool,
}

impl Edge {
    /// Create a fresh active edge asserted by a single turn.
    pub fn new(
        edge_type: EdgeType,
        from: NodeId,
        to: NodeId,
        confidence: f64,
        turn: TurnId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EdgeId::new(),
            edge_type,
            from,
            to,
            attributes: Attributes::new(),
            confidence,
            created_at: now,
            updated_at: now,
            source_refs: vec![turn],
            active: true,
        }
    }
}

// ── Extractor Contract ────────────────────────────────────

/// An entity mention as produced by the extractor.
///
/// Untrusted input: `entity_type` is a raw string until the schema registry
/// has validated it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mention {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    /// Attribute hints extracted alongside the mention.
    #[serde(default)]
    pub attributes: Attributes,
}

/// A candidate fact extracted from one conversation turn.
///
/// This is the wire contract of the upstream extractor; every candidate
/// passes through [`crate::SchemaRegistry`] before the planner sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateTriple {
    pub subject: Mention,
    /// Relationship type as emitted by the extractor, e.g. "WORKS_AT".
    pub predicate: String,
    pub object: Mention,
    /// Attributes of the relationship itself.
    #[serde(default)]
    pub attributes: Attributes,
    pub confidence: f64,
    /// Explicit retraction ("no longer", "used to") mapped upstream.
    #[serde(default)]
    pub negated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_type_round_trips_through_extractor_form() {
        for et in EdgeType::all() {
            assert_eq!(EdgeType::parse(et.as_str()), Some(*et));
            let json = serde_json::to_string(et).unwrap();
            assert_eq!(json, format!("\"{}\"", et.as_str()));
        }
        assert_eq!(EdgeType::parse("MANAGES"), None);
    }

    #[test]
    fn node_type_parse_rejects_unknown() {
        assert_eq!(NodeType::parse("Person"), Some(NodeType::Person));
        assert_eq!(NodeType::parse("Animal"), None);
    }

    #[test]
    fn candidate_triple_deserializes_with_defaults() {
        let raw = r#"{
            "subject": {"type": "Person", "name": "Alex"},
            "predicate": "WORKS_AT",
            "object": {"type": "Organization", "name": "Acme"},
            "confidence": 0.9
        }"#;
        let triple: CandidateTriple = serde_json::from_str(raw).unwrap();
        assert!(!triple.negated);
        assert!(triple.attributes.is_empty());
        assert!(triple.subject.attributes.is_empty());
    }

    #[test]
    fn new_node_satisfies_lifecycle_invariants() {
        let node = Node::new(NodeType::Person, "alex", 0.9, TurnId::new("t-1"));
        assert!(node.active);
        assert!(!node.source_refs.is_empty());
        assert!(node.updated_at >= node.created_at);
    }
}
