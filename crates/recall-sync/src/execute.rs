//! Plan execution: apply an [`OperationPlan`] to the graph store with
//! retry, read-repair, and an audit record for every effective write.
//!
//! All operations are idempotent at the store level, so a transient
//! backend failure retries the whole plan rather than tracking a resume
//! point. A create that loses a race surfaces as a duplicate error
//! carrying the winning record, and is repaired into a merge onto that
//! winner; provisional node ids in the plan's edges are remapped to the
//! winner's id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use recall_audit::{AuditEntry, AuditOp, AuditStore, EntityState};
use recall_core::{Edge, EdgeId, Node, NodeId, TurnId};
use recall_graph::{EdgePatch, GraphStore, NodePatch, StoreError};

use crate::error::{Result, SyncError};
use crate::plan::{Operation, OperationPlan, SkippedTriple};

/// Retry and deadline knobs for plan execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Whole-plan attempts before a transient failure becomes final.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts; grows linearly per attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Hard deadline for one plan, all retries included.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    50
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// One operation that took effect, with its audit sequence number.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedOp {
    pub op: Operation,
    pub audit_seq: u64,
}

/// Outcome of executing one plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub turn_id: TurnId,
    /// Operations that changed the graph, in application order. A
    /// read-repaired create appears as the merge it became.
    pub applied: Vec<AppliedOp>,
    pub skipped: Vec<SkippedTriple>,
    /// Fatal errors; execution stops at the first one.
    pub errors: Vec<String>,
    pub attempts: u32,
}

impl ExecutionResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct GraphExecutor {
    store: Arc<dyn GraphStore>,
    audit: Arc<dyn AuditStore>,
    config: ExecutorConfig,
}

impl GraphExecutor {
    pub fn new(
        store: Arc<dyn GraphStore>,
        audit: Arc<dyn AuditStore>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    /// Apply a plan under the configured deadline.
    ///
    /// Writes already applied when the deadline fires remain in the
    /// store and the audit log; the caller learns about the cutoff from
    /// the timeout error.
    pub async fn execute(&self, plan: OperationPlan) -> Result<ExecutionResult> {
        let deadline = Duration::from_millis(self.config.timeout_ms);
        tokio::time::timeout(deadline, self.execute_with_retry(plan))
            .await
            .map_err(|_| SyncError::Timeout(self.config.timeout_ms))?
    }

    async fn execute_with_retry(&self, plan: OperationPlan) -> Result<ExecutionResult> {
        let mut attempt = 1;
        loop {
            match self.apply_plan(&plan, attempt).await? {
                Attempt::Done(result) => return Ok(result),
                Attempt::Retry(error) => {
                    if attempt >= self.config.max_attempts {
                        tracing::error!(
                            turn_id = %plan.turn_id,
                            attempts = attempt,
                            %error,
                            "Transient failure persisted, giving up"
                        );
                        return Err(SyncError::Store(error));
                    }
                    let backoff =
                        Duration::from_millis(self.config.backoff_ms * u64::from(attempt));
                    tracing::warn!(
                        turn_id = %plan.turn_id,
                        attempt,
                        %error,
                        "Transient failure, retrying plan"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One pass over the plan. Transient store errors abort the pass for
    /// retry; anything else is recorded and stops execution for good.
    async fn apply_plan(&self, plan: &OperationPlan, attempt: u32) -> Result<Attempt> {
        let mut result = ExecutionResult {
            turn_id: plan.turn_id.clone(),
            applied: Vec::new(),
            skipped: plan.skipped.clone(),
            errors: Vec::new(),
            attempts: attempt,
        };
        // Provisional ids of plan-created nodes that lost a create race,
        // mapped to the id of the node that won.
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();

        for op in &plan.ops {
            let outcome = match op {
                Operation::CreateNode { node } => {
                    self.create_node(&mut result, &mut remap, plan, node).await
                }
                Operation::MergeNode { id, patch } => {
                    self.merge_node(&mut result, plan, id, patch.clone()).await
                }
                Operation::CreateEdge { edge } => {
                    self.create_edge(&mut result, &remap, plan, edge).await
                }
                Operation::UpdateEdge { id, patch } => {
                    self.update_edge(&mut result, plan, id, patch.clone()).await
                }
                Operation::SupersedeEdge { id, replacement } => {
                    self.supersede_edge(&mut result, &remap, plan, id, replacement.as_ref())
                        .await
                }
            };

            match outcome {
                Ok(()) => {}
                Err(SyncError::Store(e)) if e.is_transient() => {
                    return Ok(Attempt::Retry(e));
                }
                Err(e) => {
                    tracing::error!(turn_id = %plan.turn_id, error = %e, "Plan execution failed");
                    result.errors.push(e.to_string());
                    break;
                }
            }
        }

        Ok(Attempt::Done(result))
    }

    async fn create_node(
        &self,
        result: &mut ExecutionResult,
        remap: &mut HashMap<NodeId, NodeId>,
        plan: &OperationPlan,
        node: &Node,
    ) -> Result<()> {
        match self.store.insert_node(node.clone()).await {
            Ok(created) => {
                self.record(
                    result,
                    plan,
                    AuditOp::CreateNode,
                    None,
                    EntityState::Node(created.clone()),
                    Operation::CreateNode { node: created },
                )
            }
            Err(StoreError::DuplicateNode { existing }) => {
                // Read-repair: fold the planned node into the winner.
                remap.insert(node.id, existing.id);
                let patch = NodePatch {
                    add_aliases: node.aliases.clone(),
                    merge_attributes: node.attributes.clone(),
                    add_source_refs: node.source_refs.clone(),
                    confidence: Some(node.confidence),
                };
                let merged = self.store.merge_node(&existing.id, patch.clone()).await?;
                self.record(
                    result,
                    plan,
                    AuditOp::MergeNode,
                    Some(EntityState::Node(*existing.clone())),
                    EntityState::Node(merged),
                    Operation::MergeNode {
                        id: existing.id,
                        patch,
                    },
                )
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn merge_node(
        &self,
        result: &mut ExecutionResult,
        plan: &OperationPlan,
        id: &NodeId,
        patch: NodePatch,
    ) -> Result<()> {
        let before = self
            .store
            .get_node(id)
            .await?
            .ok_or(StoreError::NodeNotFound(*id))?;
        let after = self.store.merge_node(id, patch.clone()).await?;
        self.record(
            result,
            plan,
            AuditOp::MergeNode,
            Some(EntityState::Node(before)),
            EntityState::Node(after),
            Operation::MergeNode { id: *id, patch },
        )
    }

    async fn create_edge(
        &self,
        result: &mut ExecutionResult,
        remap: &HashMap<NodeId, NodeId>,
        plan: &OperationPlan,
        edge: &Edge,
    ) -> Result<()> {
        let mut edge = edge.clone();
        if let Some(actual) = remap.get(&edge.from) {
            edge.from = *actual;
        }
        if let Some(actual) = remap.get(&edge.to) {
            edge.to = *actual;
        }

        match self.store.insert_edge(edge.clone()).await {
            Ok(created) => self.record(
                result,
                plan,
                AuditOp::CreateEdge,
                None,
                EntityState::Edge(created.clone()),
                Operation::CreateEdge { edge: created },
            ),
            Err(StoreError::DuplicateEdge { existing }) => {
                // Lost a race on the pair; merge this assertion in.
                let patch = EdgePatch {
                    merge_attributes: edge.attributes.clone(),
                    add_source_refs: edge.source_refs.clone(),
                    confidence: Some(edge.confidence),
                };
                let merged = self.store.merge_edge(&existing.id, patch.clone()).await?;
                self.record(
                    result,
                    plan,
                    AuditOp::UpdateEdge,
                    Some(EntityState::Edge(*existing.clone())),
                    EntityState::Edge(merged),
                    Operation::UpdateEdge {
                        id: existing.id,
                        patch,
                    },
                )
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_edge(
        &self,
        result: &mut ExecutionResult,
        plan: &OperationPlan,
        id: &EdgeId,
        patch: EdgePatch,
    ) -> Result<()> {
        let before = self
            .store
            .get_edge(id)
            .await?
            .ok_or(StoreError::EdgeNotFound(*id))?;
        let after = self.store.merge_edge(id, patch.clone()).await?;
        self.record(
            result,
            plan,
            AuditOp::UpdateEdge,
            Some(EntityState::Edge(before)),
            EntityState::Edge(after),
            Operation::UpdateEdge { id: *id, patch },
        )
    }

    async fn supersede_edge(
        &self,
        result: &mut ExecutionResult,
        remap: &HashMap<NodeId, NodeId>,
        plan: &OperationPlan,
        id: &EdgeId,
        replacement: Option<&Edge>,
    ) -> Result<()> {
        let before = self.store.get_edge(id).await?;
        let (after, changed) = self.store.deactivate_edge(id).await?;
        if changed {
            self.record(
                result,
                plan,
                AuditOp::SupersedeEdge,
                before.map(EntityState::Edge),
                EntityState::Edge(after),
                Operation::SupersedeEdge {
                    id: *id,
                    replacement: None,
                },
            )?;
        }
        // Already-inactive targets are a silent no-op.

        if let Some(edge) = replacement {
            self.create_edge(result, remap, plan, edge).await?;
        }
        Ok(())
    }

    fn record(
        &self,
        result: &mut ExecutionResult,
        plan: &OperationPlan,
        op: AuditOp,
        before: Option<EntityState>,
        after: EntityState,
        applied: Operation,
    ) -> Result<()> {
        let record = self.audit.append(AuditEntry {
            op,
            before,
            after: Some(after),
            at: Utc::now(),
            source_refs: vec![plan.turn_id.clone()],
        })?;
        result.applied.push(AppliedOp {
            op: applied,
            audit_seq: record.seq,
        });
        Ok(())
    }
}

enum Attempt {
    Done(ExecutionResult),
    Retry(StoreError),
}
