//! Change planning: turn a batch of validated triples into an ordered
//! list of graph mutations.
//!
//! The planner only reads the store. It coalesces repeated mentions of
//! the same entity or relationship within a batch, decides create vs
//! merge vs supersede for each assertion, and emits node operations
//! before the edge operations that depend on them. All writes happen in
//! the executor.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use recall_core::{
    Attributes, CandidateTriple, Cardinality, Edge, EdgeId, EdgeType, Node, NodeId, NodeType,
    SchemaError, SchemaRegistry, TurnId, TypedMention, ValidTriple,
};
use recall_graph::{EdgePatch, GraphStore, NodePatch, StoreError};

use crate::resolve::{normalize, EntityResolver, Resolution};

// ── Plan Types ────────────────────────────────────────────────────

/// A single planned graph mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateNode { node: Node },
    MergeNode { id: NodeId, patch: NodePatch },
    CreateEdge { edge: Edge },
    UpdateEdge { id: EdgeId, patch: EdgePatch },
    /// Mark an edge inactive. `replacement` carries the contradicting
    /// assertion that takes its place, when there is one.
    SupersedeEdge {
        id: EdgeId,
        replacement: Option<Edge>,
    },
}

/// Why a candidate triple produced no operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Rejected by the schema registry.
    Schema { error: SchemaError },
    /// A retraction whose target edge is not active.
    NothingToRetract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedTriple {
    pub triple: CandidateTriple,
    pub reason: SkipReason,
}

/// The ordered mutation batch for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPlan {
    pub turn_id: TurnId,
    pub ops: Vec<Operation>,
    pub skipped: Vec<SkippedTriple>,
}

impl OperationPlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// ── Planner ───────────────────────────────────────────────────────

pub struct ChangePlanner {
    registry: SchemaRegistry,
    resolver: EntityResolver,
}

impl ChangePlanner {
    pub fn new(registry: SchemaRegistry, resolver: EntityResolver) -> Self {
        Self { registry, resolver }
    }

    /// Plan the mutations for one turn's candidate triples.
    ///
    /// Candidates are processed in input order, so a later assertion in
    /// the same turn wins over an earlier one it excludes.
    pub async fn plan(
        &self,
        store: &dyn GraphStore,
        turn_id: TurnId,
        candidates: &[CandidateTriple],
    ) -> Result<OperationPlan, StoreError> {
        let mut builder = PlanBuilder::new(turn_id.clone());

        for candidate in candidates {
            let triple = match self.registry.validate(candidate) {
                Ok(t) => t,
                Err(error) => {
                    tracing::debug!(
                        predicate = candidate.predicate,
                        %error,
                        "Candidate rejected by schema"
                    );
                    builder.skip(candidate.clone(), SkipReason::Schema { error });
                    continue;
                }
            };

            if triple.negated {
                self.plan_retraction(store, &mut builder, candidate, &triple)
                    .await?;
            } else {
                self.plan_assertion(store, &mut builder, &triple).await?;
            }
        }

        Ok(builder.finish())
    }

    async fn plan_assertion(
        &self,
        store: &dyn GraphStore,
        builder: &mut PlanBuilder,
        triple: &ValidTriple,
    ) -> Result<(), StoreError> {
        let from = self
            .resolve_mention(store, builder, &triple.subject, triple.confidence)
            .await?;
        let to = self
            .resolve_mention(store, builder, &triple.object, triple.confidence)
            .await?;

        let key = (triple.edge_type, from, to);
        if let Some(slot) = builder.edge_index.get(&key).copied() {
            builder.coalesce_edge(slot, triple);
            return Ok(());
        }

        // An exclusive predicate admits one active object per subject,
        // so every assertion of it first displaces edges to any other
        // object, both in the store and earlier in this batch. The last
        // assertion in a batch wins.
        let rule = self.registry.edge_rule(triple.edge_type);
        if rule.cardinality == Cardinality::ExclusivePerSubject {
            for displaced in store.active_edges_from(triple.edge_type, &from).await? {
                if displaced.to != to {
                    builder.supersede(displaced.id, None);
                }
            }
            builder.drop_planned_assertions(triple.edge_type, from, to);
        }

        if let Some(existing) = store
            .active_edge_between(triple.edge_type, &from, &to)
            .await?
        {
            if contradicts(&existing.attributes, &triple.attributes) {
                let mut replacement =
                    Edge::new(triple.edge_type, from, to, triple.confidence, builder.turn());
                replacement.attributes = triple.attributes.clone();
                builder.supersede(existing.id, Some(replacement));
            } else {
                // An earlier assertion in this batch may have displaced
                // this very edge; reasserting it keeps it alive.
                builder.revive(existing.id);
                let patch = EdgePatch {
                    merge_attributes: triple.attributes.clone(),
                    add_source_refs: vec![builder.turn()],
                    confidence: Some(triple.confidence),
                };
                builder.push_edge_op(key, Operation::UpdateEdge {
                    id: existing.id,
                    patch,
                });
            }
            return Ok(());
        }

        let mut edge = Edge::new(triple.edge_type, from, to, triple.confidence, builder.turn());
        edge.attributes = triple.attributes.clone();
        builder.push_edge_op(key, Operation::CreateEdge { edge });
        Ok(())
    }

    /// Plan a retraction. Only the store is consulted: a create and a
    /// retract of the same fact within one turn is treated as extractor
    /// noise, not a sequence.
    async fn plan_retraction(
        &self,
        store: &dyn GraphStore,
        builder: &mut PlanBuilder,
        candidate: &CandidateTriple,
        triple: &ValidTriple,
    ) -> Result<(), StoreError> {
        let from = self.lookup_only(store, builder, &triple.subject).await?;
        let to = self.lookup_only(store, builder, &triple.object).await?;

        let target = match (from, to) {
            (Some(from), Some(to)) => {
                store
                    .active_edge_between(triple.edge_type, &from, &to)
                    .await?
            }
            _ => None,
        };

        match target {
            Some(edge) => builder.supersede(edge.id, None),
            None => builder.skip(candidate.clone(), SkipReason::NothingToRetract),
        }
        Ok(())
    }

    /// Resolve a mention and register the node operation it implies.
    ///
    /// Repeated mentions of the same normalized name in one batch share
    /// a slot, so each entity yields at most one node operation.
    async fn resolve_mention(
        &self,
        store: &dyn GraphStore,
        builder: &mut PlanBuilder,
        mention: &TypedMention,
        confidence: f64,
    ) -> Result<NodeId, StoreError> {
        let key = (mention.node_type, normalize(&mention.name));
        if let Some(slot) = builder.node_index.get(&key).copied() {
            return Ok(builder.coalesce_node(slot, mention, confidence));
        }

        match self
            .resolver
            .resolve(store, mention.node_type, &mention.name)
            .await?
        {
            Resolution::Matched {
                node, new_alias, ..
            } => {
                let mut patch = NodePatch {
                    merge_attributes: mention.attributes.clone(),
                    add_source_refs: vec![builder.turn()],
                    confidence: Some(confidence),
                    ..Default::default()
                };
                if let Some(alias) = new_alias {
                    patch.add_aliases.insert(alias);
                }
                let id = node.id;
                builder.push_node_op(key, NodeOp::Merge { id, patch });
                Ok(id)
            }
            Resolution::New { canonical_name } => {
                let mut node = Node::new(
                    mention.node_type,
                    canonical_name,
                    confidence,
                    builder.turn(),
                );
                node.attributes = mention.attributes.clone();
                let surface = mention.name.trim();
                if surface != node.canonical_name && !surface.is_empty() {
                    node.aliases.insert(surface.to_string());
                }
                let id = node.id;
                builder.push_node_op(key, NodeOp::Create(node));
                Ok(id)
            }
        }
    }

    /// Resolve a mention without planning any node operation. Used by
    /// retractions, which must not create entities as a side effect.
    async fn lookup_only(
        &self,
        store: &dyn GraphStore,
        builder: &PlanBuilder,
        mention: &TypedMention,
    ) -> Result<Option<NodeId>, StoreError> {
        let key = (mention.node_type, normalize(&mention.name));
        if let Some(slot) = builder.node_index.get(&key) {
            return Ok(Some(builder.node_id(*slot)));
        }
        match self
            .resolver
            .resolve(store, mention.node_type, &mention.name)
            .await?
        {
            Resolution::Matched { node, .. } => Ok(Some(node.id)),
            Resolution::New { .. } => Ok(None),
        }
    }
}

/// True when the incoming attributes disagree with the stored ones on
/// any shared key.
fn contradicts(existing: &Attributes, incoming: &Attributes) -> bool {
    incoming
        .iter()
        .any(|(key, value)| existing.get(key).is_some_and(|held| held != value))
}

// ── Plan Assembly ─────────────────────────────────────────────────

enum NodeOp {
    Create(Node),
    Merge { id: NodeId, patch: NodePatch },
}

struct PlanBuilder {
    turn_id: TurnId,
    node_ops: Vec<NodeOp>,
    node_index: HashMap<(NodeType, String), usize>,
    edge_ops: Vec<Operation>,
    edge_index: HashMap<(EdgeType, NodeId, NodeId), usize>,
    superseded: HashSet<EdgeId>,
    skipped: Vec<SkippedTriple>,
}

impl PlanBuilder {
    fn new(turn_id: TurnId) -> Self {
        Self {
            turn_id,
            node_ops: Vec::new(),
            node_index: HashMap::new(),
            edge_ops: Vec::new(),
            edge_index: HashMap::new(),
            superseded: HashSet::new(),
            skipped: Vec::new(),
        }
    }

    fn turn(&self) -> TurnId {
        self.turn_id.clone()
    }

    fn node_id(&self, slot: usize) -> NodeId {
        match &self.node_ops[slot] {
            NodeOp::Create(node) => node.id,
            NodeOp::Merge { id, .. } => *id,
        }
    }

    fn push_node_op(&mut self, key: (NodeType, String), op: NodeOp) {
        self.node_index.insert(key, self.node_ops.len());
        self.node_ops.push(op);
    }

    /// Fold a repeated mention into its existing slot.
    fn coalesce_node(&mut self, slot: usize, mention: &TypedMention, confidence: f64) -> NodeId {
        match &mut self.node_ops[slot] {
            NodeOp::Create(node) => {
                node.attributes.extend(mention.attributes.clone());
                if node.confidence < confidence {
                    node.confidence = confidence;
                }
                let surface = mention.name.trim();
                if surface != node.canonical_name && !surface.is_empty() {
                    node.aliases.insert(surface.to_string());
                }
                node.id
            }
            NodeOp::Merge { id, patch } => {
                patch.merge_attributes.extend(mention.attributes.clone());
                if patch.confidence.unwrap_or(0.0) < confidence {
                    patch.confidence = Some(confidence);
                }
                *id
            }
        }
    }

    fn push_edge_op(&mut self, key: (EdgeType, NodeId, NodeId), op: Operation) {
        self.edge_index.insert(key, self.edge_ops.len());
        self.edge_ops.push(op);
    }

    /// Fold a repeated assertion of the same pair into its planned op.
    fn coalesce_edge(&mut self, slot: usize, triple: &ValidTriple) {
        match &mut self.edge_ops[slot] {
            Operation::CreateEdge { edge }
            | Operation::SupersedeEdge {
                replacement: Some(edge),
                ..
            } => {
                edge.attributes.extend(triple.attributes.clone());
                if edge.confidence < triple.confidence {
                    edge.confidence = triple.confidence;
                }
            }
            Operation::UpdateEdge { patch, .. } => {
                patch.merge_attributes.extend(triple.attributes.clone());
                if patch.confidence.unwrap_or(0.0) < triple.confidence {
                    patch.confidence = Some(triple.confidence);
                }
            }
            _ => {}
        }
    }

    fn supersede(&mut self, id: EdgeId, replacement: Option<Edge>) {
        if !self.superseded.insert(id) {
            // Already planned. A replacement upgrades the existing op in
            // place; a bare displacement adds nothing.
            if let Some(edge) = replacement {
                if let Some(slot) = self.find_supersede(id) {
                    self.edge_index
                        .insert((edge.edge_type, edge.from, edge.to), slot);
                    if let Operation::SupersedeEdge { replacement, .. } = &mut self.edge_ops[slot]
                    {
                        *replacement = Some(edge);
                    }
                }
            }
            return;
        }
        if let Some(edge) = &replacement {
            self.edge_index
                .insert((edge.edge_type, edge.from, edge.to), self.edge_ops.len());
        }
        self.edge_ops.push(Operation::SupersedeEdge { id, replacement });
    }

    /// Cancel a planned supersession: a later assertion in the same
    /// batch reasserted the edge it would have deactivated.
    fn revive(&mut self, id: EdgeId) {
        if !self.superseded.remove(&id) {
            return;
        }
        if let Some(slot) = self.find_supersede(id) {
            self.remove_edge_op(slot);
        }
    }

    fn find_supersede(&self, target: EdgeId) -> Option<usize> {
        self.edge_ops
            .iter()
            .position(|op| matches!(op, Operation::SupersedeEdge { id, .. } if *id == target))
    }

    /// Drop earlier planned assertions of an exclusive predicate from the
    /// same subject to a different object. A planned create is removed
    /// outright; a planned replacement is stripped, keeping the
    /// supersession of the stored edge it displaced.
    fn drop_planned_assertions(&mut self, edge_type: EdgeType, from: NodeId, keep_to: NodeId) {
        let stale: Vec<(EdgeType, NodeId, NodeId)> = self
            .edge_index
            .keys()
            .filter(|(t, f, to)| *t == edge_type && *f == from && *to != keep_to)
            .copied()
            .collect();
        for key in stale {
            let slot = self.edge_index[&key];
            if matches!(self.edge_ops[slot], Operation::CreateEdge { .. }) {
                self.remove_edge_op(slot);
            } else if let Operation::SupersedeEdge { replacement, .. } = &mut self.edge_ops[slot] {
                *replacement = None;
                self.edge_index.remove(&key);
            }
        }
    }

    fn remove_edge_op(&mut self, slot: usize) {
        self.edge_ops.remove(slot);
        self.edge_index.retain(|_, index| *index != slot);
        for index in self.edge_index.values_mut() {
            if *index > slot {
                *index -= 1;
            }
        }
    }

    fn skip(&mut self, triple: CandidateTriple, reason: SkipReason) {
        self.skipped.push(SkippedTriple { triple, reason });
    }

    fn finish(self) -> OperationPlan {
        let mut ops = Vec::with_capacity(self.node_ops.len() + self.edge_ops.len());
        for op in self.node_ops {
            ops.push(match op {
                NodeOp::Create(node) => Operation::CreateNode { node },
                NodeOp::Merge { id, patch } => Operation::MergeNode { id, patch },
            });
        }
        ops.extend(self.edge_ops);
        OperationPlan {
            turn_id: self.turn_id,
            ops,
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::Mention;
    use recall_graph::MemoryStore;
    use serde_json::json;

    fn planner() -> ChangePlanner {
        ChangePlanner::new(
            SchemaRegistry::new(),
            EntityResolver::new(crate::resolve::ResolverConfig::default()),
        )
    }

    fn mention(entity_type: &str, name: &str) -> Mention {
        Mention {
            entity_type: entity_type.to_string(),
            name: name.to_string(),
            attributes: Attributes::new(),
        }
    }

    fn triple(subject: Mention, predicate: &str, object: Mention) -> CandidateTriple {
        CandidateTriple {
            subject,
            predicate: predicate.to_string(),
            object,
            attributes: Attributes::new(),
            confidence: 0.9,
            negated: false,
        }
    }

    #[tokio::test]
    async fn new_entities_yield_nodes_before_edges() {
        let store = MemoryStore::new();
        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-1"),
                &[triple(
                    mention("Person", "Alex"),
                    "WORKS_AT",
                    mention("Organization", "Acme"),
                )],
            )
            .await
            .unwrap();

        assert!(plan.skipped.is_empty());
        assert_eq!(plan.ops.len(), 3);
        assert!(matches!(plan.ops[0], Operation::CreateNode { .. }));
        assert!(matches!(plan.ops[1], Operation::CreateNode { .. }));
        assert!(matches!(plan.ops[2], Operation::CreateEdge { .. }));
    }

    #[tokio::test]
    async fn repeated_mentions_share_one_node_op() {
        let store = MemoryStore::new();
        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-1"),
                &[
                    triple(
                        mention("Person", "Alex"),
                        "LIKES",
                        mention("Concept", "chess"),
                    ),
                    triple(
                        mention("Person", "alex"),
                        "SKILLED_IN",
                        mention("Skill", "rust"),
                    ),
                ],
            )
            .await
            .unwrap();

        let creates = plan
            .ops
            .iter()
            .filter(|op| matches!(op, Operation::CreateNode { .. }))
            .count();
        assert_eq!(creates, 3); // alex, chess, rust
    }

    #[tokio::test]
    async fn invalid_triple_is_skipped_with_schema_reason() {
        let store = MemoryStore::new();
        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-1"),
                &[triple(
                    mention("Person", "Alex"),
                    "MADE_OF",
                    mention("Concept", "chess"),
                )],
            )
            .await
            .unwrap();

        assert!(plan.ops.is_empty());
        assert_eq!(plan.skipped.len(), 1);
        assert!(matches!(plan.skipped[0].reason, SkipReason::Schema { .. }));
    }

    #[tokio::test]
    async fn reassertion_merges_instead_of_creating() {
        let store = MemoryStore::new();
        let turn = TurnId::new("t-1");
        let alex = store
            .insert_node(Node::new(NodeType::Person, "alex", 0.9, turn.clone()))
            .await
            .unwrap();
        let chess = store
            .insert_node(Node::new(NodeType::Concept, "chess", 0.9, turn.clone()))
            .await
            .unwrap();
        store
            .insert_edge(Edge::new(
                EdgeType::Likes,
                alex.id,
                chess.id,
                0.8,
                turn,
            ))
            .await
            .unwrap();

        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-2"),
                &[triple(
                    mention("Person", "Alex"),
                    "LIKES",
                    mention("Concept", "chess"),
                )],
            )
            .await
            .unwrap();

        assert!(!plan
            .ops
            .iter()
            .any(|op| matches!(op, Operation::CreateNode { .. } | Operation::CreateEdge { .. })));
        assert!(plan
            .ops
            .iter()
            .any(|op| matches!(op, Operation::UpdateEdge { .. })));
    }

    #[tokio::test]
    async fn contradicting_attributes_supersede_with_replacement() {
        let store = MemoryStore::new();
        let turn = TurnId::new("t-1");
        let alex = store
            .insert_node(Node::new(NodeType::Person, "alex", 0.9, turn.clone()))
            .await
            .unwrap();
        let acme = store
            .insert_node(Node::new(
                NodeType::Organization,
                "acme",
                0.9,
                turn.clone(),
            ))
            .await
            .unwrap();
        let mut held = Edge::new(EdgeType::WorksAt, alex.id, acme.id, 0.9, turn);
        held.attributes.insert("role".into(), json!("engineer"));
        let held = store.insert_edge(held).await.unwrap();

        let mut candidate = triple(
            mention("Person", "Alex"),
            "WORKS_AT",
            mention("Organization", "Acme"),
        );
        candidate.attributes.insert("role".into(), json!("manager"));

        let plan = planner()
            .plan(&store, TurnId::new("t-2"), &[candidate])
            .await
            .unwrap();

        let supersede = plan.ops.iter().find_map(|op| match op {
            Operation::SupersedeEdge { id, replacement } => Some((id, replacement)),
            _ => None,
        });
        let (id, replacement) = supersede.expect("expected supersede op");
        assert_eq!(*id, held.id);
        let replacement = replacement.as_ref().expect("expected replacement edge");
        assert_eq!(replacement.attributes["role"], json!("manager"));
    }

    #[tokio::test]
    async fn exclusive_predicate_displaces_previous_object() {
        let store = MemoryStore::new();
        let turn = TurnId::new("t-1");
        let alex = store
            .insert_node(Node::new(NodeType::Person, "alex", 0.9, turn.clone()))
            .await
            .unwrap();
        let acme = store
            .insert_node(Node::new(
                NodeType::Organization,
                "acme",
                0.9,
                turn.clone(),
            ))
            .await
            .unwrap();
        let held = store
            .insert_edge(Edge::new(EdgeType::WorksAt, alex.id, acme.id, 0.9, turn))
            .await
            .unwrap();

        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-2"),
                &[triple(
                    mention("Person", "Alex"),
                    "WORKS_AT",
                    mention("Organization", "Globex"),
                )],
            )
            .await
            .unwrap();

        assert!(plan.ops.iter().any(|op| matches!(
            op,
            Operation::SupersedeEdge { id, replacement: None } if *id == held.id
        )));
        assert!(plan
            .ops
            .iter()
            .any(|op| matches!(op, Operation::CreateEdge { .. })));
    }

    #[tokio::test]
    async fn exclusive_predicate_in_batch_last_assertion_wins() {
        let store = MemoryStore::new();
        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-1"),
                &[
                    triple(
                        mention("Person", "Alex"),
                        "WORKS_AT",
                        mention("Organization", "Acme"),
                    ),
                    triple(
                        mention("Person", "Alex"),
                        "WORKS_AT",
                        mention("Organization", "Globex"),
                    ),
                ],
            )
            .await
            .unwrap();

        let edges: Vec<&Edge> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                Operation::CreateEdge { edge } => Some(edge),
                _ => None,
            })
            .collect();
        assert_eq!(edges.len(), 1);
    }

    #[tokio::test]
    async fn punctuation_only_name_never_mints_a_node() {
        let store = MemoryStore::new();
        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-1"),
                &[triple(
                    mention("Person", "..."),
                    "LIKES",
                    mention("Concept", "jazz"),
                )],
            )
            .await
            .unwrap();

        assert!(plan.ops.is_empty());
        assert_eq!(plan.skipped.len(), 1);
        assert!(matches!(plan.skipped[0].reason, SkipReason::Schema { .. }));
    }

    #[tokio::test]
    async fn same_pair_contradiction_still_displaces_other_objects() {
        // Stored: Alex works at Acme as engineer. One batch then asserts
        // Globex, followed by Acme with a changed role. The last
        // assertion wins and exactly one edge must survive.
        let store = MemoryStore::new();
        let turn = TurnId::new("t-1");
        let alex = store
            .insert_node(Node::new(NodeType::Person, "alex", 0.9, turn.clone()))
            .await
            .unwrap();
        let acme = store
            .insert_node(Node::new(
                NodeType::Organization,
                "acme",
                0.9,
                turn.clone(),
            ))
            .await
            .unwrap();
        let mut held = Edge::new(EdgeType::WorksAt, alex.id, acme.id, 0.9, turn);
        held.attributes.insert("role".into(), json!("engineer"));
        let held = store.insert_edge(held).await.unwrap();

        let mut restated = triple(
            mention("Person", "Alex"),
            "WORKS_AT",
            mention("Organization", "Acme"),
        );
        restated.attributes.insert("role".into(), json!("manager"));

        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-2"),
                &[
                    triple(
                        mention("Person", "Alex"),
                        "WORKS_AT",
                        mention("Organization", "Globex"),
                    ),
                    restated,
                ],
            )
            .await
            .unwrap();

        // The planned Globex create was dropped by the later assertion.
        assert!(!plan
            .ops
            .iter()
            .any(|op| matches!(op, Operation::CreateEdge { .. })));
        let supersedes: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                Operation::SupersedeEdge { id, replacement } => Some((id, replacement)),
                _ => None,
            })
            .collect();
        assert_eq!(supersedes.len(), 1);
        let (id, replacement) = supersedes[0];
        assert_eq!(*id, held.id);
        let replacement = replacement.as_ref().expect("expected replacement edge");
        assert_eq!(replacement.to, acme.id);
        assert_eq!(replacement.attributes["role"], json!("manager"));
    }

    #[tokio::test]
    async fn reassertion_cancels_an_earlier_displacement_in_batch() {
        // Stored: Alex works at Acme. The batch asserts Globex, then
        // restates Acme without contradiction; Acme must stay active.
        let store = MemoryStore::new();
        let turn = TurnId::new("t-1");
        let alex = store
            .insert_node(Node::new(NodeType::Person, "alex", 0.9, turn.clone()))
            .await
            .unwrap();
        let acme = store
            .insert_node(Node::new(
                NodeType::Organization,
                "acme",
                0.9,
                turn.clone(),
            ))
            .await
            .unwrap();
        let held = store
            .insert_edge(Edge::new(EdgeType::WorksAt, alex.id, acme.id, 0.9, turn))
            .await
            .unwrap();

        let plan = planner()
            .plan(
                &store,
                TurnId::new("t-2"),
                &[
                    triple(
                        mention("Person", "Alex"),
                        "WORKS_AT",
                        mention("Organization", "Globex"),
                    ),
                    triple(
                        mention("Person", "Alex"),
                        "WORKS_AT",
                        mention("Organization", "Acme"),
                    ),
                ],
            )
            .await
            .unwrap();

        assert!(!plan
            .ops
            .iter()
            .any(|op| matches!(op, Operation::SupersedeEdge { .. } | Operation::CreateEdge { .. })));
        assert!(plan.ops.iter().any(|op| matches!(
            op,
            Operation::UpdateEdge { id, .. } if *id == held.id
        )));
    }

    #[tokio::test]
    async fn retraction_of_active_edge_supersedes() {
        let store = MemoryStore::new();
        let turn = TurnId::new("t-1");
        let alex = store
            .insert_node(Node::new(NodeType::Person, "alex", 0.9, turn.clone()))
            .await
            .unwrap();
        let chess = store
            .insert_node(Node::new(NodeType::Concept, "chess", 0.9, turn.clone()))
            .await
            .unwrap();
        let held = store
            .insert_edge(Edge::new(EdgeType::Likes, alex.id, chess.id, 0.9, turn))
            .await
            .unwrap();

        let mut candidate = triple(
            mention("Person", "Alex"),
            "LIKES",
            mention("Concept", "chess"),
        );
        candidate.negated = true;

        let plan = planner()
            .plan(&store, TurnId::new("t-2"), &[candidate])
            .await
            .unwrap();

        assert_eq!(plan.ops.len(), 1);
        assert!(matches!(
            &plan.ops[0],
            Operation::SupersedeEdge { id, replacement: None } if *id == held.id
        ));
    }

    #[tokio::test]
    async fn retraction_without_target_is_skipped() {
        let store = MemoryStore::new();
        let mut candidate = triple(
            mention("Person", "Alex"),
            "LIKES",
            mention("Concept", "chess"),
        );
        candidate.negated = true;

        let plan = planner()
            .plan(&store, TurnId::new("t-1"), &[candidate])
            .await
            .unwrap();

        assert!(plan.ops.is_empty());
        assert!(matches!(
            plan.skipped[0].reason,
            SkipReason::NothingToRetract
        ));
    }
}
