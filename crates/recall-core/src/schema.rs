//! Schema registry: the typed validation boundary between the extractor
//! and the graph.
//!
//! The extractor's output is untrusted; every candidate triple is checked
//! against a static type table before the planner sees it. Validation is
//! pure lookup, no I/O. A failed triple is dropped by the planner with a
//! reason, never aborting the rest of a batch.

use serde::{Deserialize, Serialize};

use crate::types::{Attributes, CandidateTriple, EdgeType, NodeType};

/// Value kind accepted for a declared attribute key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrKind {
    Text,
    Number,
    Boolean,
}

impl AttrKind {
    fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            AttrKind::Text => value.is_string(),
            AttrKind::Number => value.is_number(),
            AttrKind::Boolean => value.is_boolean(),
        }
    }
}

/// How many active edges of a type one subject may hold.
///
/// `ExclusivePerSubject` means a new object displaces the previous one via
/// supersession (a person works at one place at a time); `MultiActive`
/// facts are additive (skills, likes, memories). Either way, at most one
/// active edge exists per ordered `(type, from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    ExclusivePerSubject,
    MultiActive,
}

/// Endpoint and attribute rules for one edge type.
#[derive(Debug, Clone)]
pub struct EdgeRule {
    pub from: &'static [NodeType],
    pub to: &'static [NodeType],
    pub cardinality: Cardinality,
    pub attributes: &'static [(&'static str, AttrKind)],
}

/// Mention names too generic to become graph entities.
const GENERIC_NAMES: &[&str] = &["thing", "stuff", "something", "anything", "everything"];

/// Validation failure for a single candidate triple.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq)]
pub enum SchemaError {
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("unknown edge type: {0}")]
    UnknownEdgeType(String),

    #[error("empty mention name")]
    EmptyMention,

    #[error("mention name has no letters or digits: {0}")]
    UnresolvableName(String),

    #[error("mention name too generic: {0}")]
    GenericName(String),

    #[error("self-referential edge on {0}")]
    SelfEdge(String),

    #[error("edge {edge_type} not allowed from {from} to {to}")]
    EndpointNotAllowed {
        edge_type: String,
        from: String,
        to: String,
    },

    #[error("attribute {key} not declared for {target}")]
    UnknownAttribute { target: String, key: String },

    #[error("attribute {key} on {target} has wrong value kind (expected {expected:?})")]
    WrongValueKind {
        target: String,
        key: String,
        expected: AttrKind,
    },

    #[error("confidence {0} out of range [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("confidence {0} below floor {1}")]
    BelowConfidenceFloor(f64, f64),
}

/// A mention whose type survived validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedMention {
    pub node_type: NodeType,
    pub name: String,
    pub attributes: Attributes,
}

/// A candidate triple that passed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidTriple {
    pub subject: TypedMention,
    pub edge_type: EdgeType,
    pub object: TypedMention,
    pub attributes: Attributes,
    pub confidence: f64,
    pub negated: bool,
}

/// Static type table for the knowledge graph.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    /// Candidates below this confidence are rejected outright.
    min_confidence: f64,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
        }
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confidence_floor(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Declared attribute keys for a node type.
    pub fn node_attributes(&self, node_type: NodeType) -> &'static [(&'static str, AttrKind)] {
        match node_type {
            NodeType::Person => &[
                ("occupation", AttrKind::Text),
                ("age", AttrKind::Number),
                ("email", AttrKind::Text),
                ("notes", AttrKind::Text),
            ],
            NodeType::Concept => &[("category", AttrKind::Text), ("notes", AttrKind::Text)],
            NodeType::Event => &[
                ("date", AttrKind::Text),
                ("location", AttrKind::Text),
                ("notes", AttrKind::Text),
            ],
            NodeType::Preference => &[
                ("polarity", AttrKind::Text),
                ("strength", AttrKind::Number),
                ("notes", AttrKind::Text),
            ],
            NodeType::Location => &[
                ("country", AttrKind::Text),
                ("region", AttrKind::Text),
                ("notes", AttrKind::Text),
            ],
            NodeType::Organization => &[
                ("industry", AttrKind::Text),
                ("website", AttrKind::Text),
                ("notes", AttrKind::Text),
            ],
            NodeType::Skill => &[
                ("category", AttrKind::Text),
                ("level", AttrKind::Text),
                ("notes", AttrKind::Text),
            ],
            NodeType::Goal => &[
                ("deadline", AttrKind::Text),
                ("priority", AttrKind::Text),
                ("notes", AttrKind::Text),
            ],
            NodeType::Memory => &[("date", AttrKind::Text), ("notes", AttrKind::Text)],
        }
    }

    /// Endpoint, cardinality, and attribute rules for an edge type.
    pub fn edge_rule(&self, edge_type: EdgeType) -> EdgeRule {
        use NodeType::*;
        match edge_type {
            EdgeType::Knows => EdgeRule {
                from: &[Person],
                to: &[Person],
                cardinality: Cardinality::MultiActive,
                attributes: &[("since", AttrKind::Text), ("context", AttrKind::Text)],
            },
            EdgeType::Likes | EdgeType::Dislikes => EdgeRule {
                from: &[Person],
                to: &[Preference, Concept],
                cardinality: Cardinality::MultiActive,
                attributes: &[("strength", AttrKind::Number), ("reason", AttrKind::Text)],
            },
            EdgeType::WorksAt => EdgeRule {
                from: &[Person],
                to: &[Organization],
                cardinality: Cardinality::ExclusivePerSubject,
                attributes: &[
                    ("role", AttrKind::Text),
                    ("current", AttrKind::Boolean),
                    ("since", AttrKind::Text),
                ],
            },
            EdgeType::LivesIn => EdgeRule {
                from: &[Person],
                to: &[Location],
                cardinality: Cardinality::ExclusivePerSubject,
                attributes: &[("since", AttrKind::Text), ("current", AttrKind::Boolean)],
            },
            EdgeType::Attended => EdgeRule {
                from: &[Person],
                to: &[Event],
                cardinality: Cardinality::MultiActive,
                attributes: &[("date", AttrKind::Text), ("role", AttrKind::Text)],
            },
            EdgeType::SkilledIn => EdgeRule {
                from: &[Person],
                to: &[Skill],
                cardinality: Cardinality::MultiActive,
                attributes: &[("level", AttrKind::Text), ("years", AttrKind::Number)],
            },
            EdgeType::WantsTo => EdgeRule {
                from: &[Person],
                to: &[Goal],
                cardinality: Cardinality::MultiActive,
                attributes: &[("priority", AttrKind::Text), ("deadline", AttrKind::Text)],
            },
            EdgeType::Remembers => EdgeRule {
                from: &[Person],
                to: &[Memory, Event],
                cardinality: Cardinality::MultiActive,
                attributes: &[("vividness", AttrKind::Number), ("date", AttrKind::Text)],
            },
            EdgeType::RelatedTo => EdgeRule {
                from: NodeType::all(),
                to: NodeType::all(),
                cardinality: Cardinality::MultiActive,
                attributes: &[("context", AttrKind::Text)],
            },
            EdgeType::PartOf => EdgeRule {
                from: &[Concept, Organization, Location, Event, Skill, Goal, Memory],
                to: &[Concept, Organization, Location, Event, Skill, Goal, Memory],
                cardinality: Cardinality::MultiActive,
                attributes: &[("context", AttrKind::Text)],
            },
            EdgeType::Created => EdgeRule {
                from: &[Person, Organization],
                to: &[Concept, Event, Organization],
                cardinality: Cardinality::MultiActive,
                attributes: &[("date", AttrKind::Text), ("context", AttrKind::Text)],
            },
            EdgeType::Learned => EdgeRule {
                from: &[Person],
                to: &[Skill, Concept],
                cardinality: Cardinality::MultiActive,
                attributes: &[("date", AttrKind::Text), ("source", AttrKind::Text)],
            },
        }
    }

    /// Validate one candidate triple from the extractor.
    pub fn validate(&self, candidate: &CandidateTriple) -> Result<ValidTriple, SchemaError> {
        if !(0.0..=1.0).contains(&candidate.confidence) {
            return Err(SchemaError::ConfidenceOutOfRange(candidate.confidence));
        }
        if candidate.confidence < self.min_confidence {
            return Err(SchemaError::BelowConfidenceFloor(
                candidate.confidence,
                self.min_confidence,
            ));
        }

        let subject = self.validate_mention(&candidate.subject)?;
        let object = self.validate_mention(&candidate.object)?;

        let edge_type = EdgeType::parse(&candidate.predicate)
            .ok_or_else(|| SchemaError::UnknownEdgeType(candidate.predicate.clone()))?;

        if subject.node_type == object.node_type
            && subject.name.to_lowercase() == object.name.to_lowercase()
        {
            return Err(SchemaError::SelfEdge(subject.name));
        }

        let rule = self.edge_rule(edge_type);
        if !rule.from.contains(&subject.node_type) || !rule.to.contains(&object.node_type) {
            return Err(SchemaError::EndpointNotAllowed {
                edge_type: edge_type.to_string(),
                from: subject.node_type.to_string(),
                to: object.node_type.to_string(),
            });
        }

        check_attributes(
            &candidate.attributes,
            rule.attributes,
            &edge_type.to_string(),
        )?;

        Ok(ValidTriple {
            subject,
            edge_type,
            object,
            attributes: candidate.attributes.clone(),
            confidence: candidate.confidence,
            negated: candidate.negated,
        })
    }

    fn validate_mention(
        &self,
        mention: &crate::types::Mention,
    ) -> Result<TypedMention, SchemaError> {
        let name = mention.name.trim();
        if name.is_empty() {
            return Err(SchemaError::EmptyMention);
        }
        // A name with no word characters normalizes to nothing and can
        // never be resolved against the graph.
        if !name.chars().any(char::is_alphanumeric) {
            return Err(SchemaError::UnresolvableName(name.to_string()));
        }
        if GENERIC_NAMES.contains(&name.to_lowercase().as_str()) {
            return Err(SchemaError::GenericName(name.to_string()));
        }
        let node_type = NodeType::parse(&mention.entity_type)
            .ok_or_else(|| SchemaError::UnknownNodeType(mention.entity_type.clone()))?;

        check_attributes(
            &mention.attributes,
            self.node_attributes(node_type),
            node_type.as_str(),
        )?;

        Ok(TypedMention {
            node_type,
            name: name.to_string(),
            attributes: mention.attributes.clone(),
        })
    }
}

fn check_attributes(
    attributes: &Attributes,
    declared: &[(&str, AttrKind)],
    target: &str,
) -> Result<(), SchemaError> {
    for (key, value) in attributes {
        let kind = declared
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                target: target.to_string(),
                key: key.clone(),
            })?;
        if !kind.matches(value) {
            return Err(SchemaError::WrongValueKind {
                target: target.to_string(),
                key: key.clone(),
                expected: kind,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mention;

    fn mention(entity_type: &str, name: &str) -> Mention {
        Mention {
            entity_type: entity_type.to_string(),
            name: name.to_string(),
            attributes: Attributes::new(),
        }
    }

    fn candidate(sub: Mention, pred: &str, obj: Mention) -> CandidateTriple {
        CandidateTriple {
            subject: sub,
            predicate: pred.to_string(),
            object: obj,
            attributes: Attributes::new(),
            confidence: 0.9,
            negated: false,
        }
    }

    #[test]
    fn accepts_well_formed_triple() {
        let schema = SchemaRegistry::new();
        let c = candidate(
            mention("Person", "Alex"),
            "WORKS_AT",
            mention("Organization", "Acme"),
        );
        let valid = schema.validate(&c).unwrap();
        assert_eq!(valid.edge_type, EdgeType::WorksAt);
        assert_eq!(valid.subject.node_type, NodeType::Person);
    }

    #[test]
    fn rejects_unknown_types() {
        let schema = SchemaRegistry::new();
        let c = candidate(
            mention("Robot", "R2"),
            "WORKS_AT",
            mention("Organization", "Acme"),
        );
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::UnknownNodeType(_))
        ));

        let c = candidate(
            mention("Person", "Alex"),
            "MANAGES",
            mention("Organization", "Acme"),
        );
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::UnknownEdgeType(_))
        ));
    }

    #[test]
    fn rejects_names_without_word_characters() {
        let schema = SchemaRegistry::new();

        let c = candidate(mention("Person", "..."), "LIKES", mention("Concept", "jazz"));
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::UnresolvableName(_))
        ));

        let c = candidate(mention("Person", " ?! "), "LIKES", mention("Concept", "jazz"));
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::UnresolvableName(_))
        ));
    }

    #[test]
    fn rejects_disallowed_endpoints() {
        let schema = SchemaRegistry::new();
        // LIKES must go from a Person, not an Organization.
        let c = candidate(
            mention("Organization", "Acme"),
            "LIKES",
            mention("Concept", "Jazz"),
        );
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::EndpointNotAllowed { .. })
        ));
    }

    #[test]
    fn rejects_undeclared_or_mistyped_attributes() {
        let schema = SchemaRegistry::new();

        let mut c = candidate(
            mention("Person", "Alex"),
            "WORKS_AT",
            mention("Organization", "Acme"),
        );
        c.attributes
            .insert("favorite_color".into(), serde_json::json!("blue"));
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::UnknownAttribute { .. })
        ));

        let mut c = candidate(
            mention("Person", "Alex"),
            "WORKS_AT",
            mention("Organization", "Acme"),
        );
        c.attributes.insert("current".into(), serde_json::json!("yes"));
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::WrongValueKind { .. })
        ));
    }

    #[test]
    fn rejects_low_confidence_and_out_of_range() {
        let schema = SchemaRegistry::new();
        let mut c = candidate(
            mention("Person", "Alex"),
            "KNOWS",
            mention("Person", "Sam"),
        );
        c.confidence = 0.2;
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::BelowConfidenceFloor(_, _))
        ));
        c.confidence = 1.4;
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_generic_names_and_self_edges() {
        let schema = SchemaRegistry::new();
        let c = candidate(
            mention("Concept", "stuff"),
            "RELATED_TO",
            mention("Concept", "Jazz"),
        );
        assert!(matches!(
            schema.validate(&c),
            Err(SchemaError::GenericName(_))
        ));

        let c = candidate(
            mention("Person", "Alex"),
            "KNOWS",
            mention("Person", "alex"),
        );
        assert!(matches!(schema.validate(&c), Err(SchemaError::SelfEdge(_))));
    }

    #[test]
    fn works_at_is_exclusive_per_subject() {
        let schema = SchemaRegistry::new();
        assert_eq!(
            schema.edge_rule(EdgeType::WorksAt).cardinality,
            Cardinality::ExclusivePerSubject
        );
        assert_eq!(
            schema.edge_rule(EdgeType::SkilledIn).cardinality,
            Cardinality::MultiActive
        );
    }
}
