//! The turn pipeline: validate, plan, execute.

use std::sync::Arc;

use recall_audit::AuditStore;
use recall_core::{CandidateTriple, SchemaRegistry, TurnId};
use recall_graph::GraphStore;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::execute::{ExecutionResult, GraphExecutor};
use crate::plan::ChangePlanner;
use crate::resolve::EntityResolver;

/// Processes one conversation turn's extracted triples end to end.
pub struct TurnProcessor {
    store: Arc<dyn GraphStore>,
    planner: ChangePlanner,
    executor: GraphExecutor,
}

impl TurnProcessor {
    pub fn new(
        store: Arc<dyn GraphStore>,
        audit: Arc<dyn AuditStore>,
        config: SyncConfig,
    ) -> Self {
        let registry = SchemaRegistry::with_confidence_floor(config.min_confidence);
        let planner = ChangePlanner::new(registry, EntityResolver::new(config.resolver));
        let executor = GraphExecutor::new(store.clone(), audit, config.executor);
        Self {
            store,
            planner,
            executor,
        }
    }

    /// Validate, plan, and apply one turn's candidate triples.
    pub async fn process_turn(
        &self,
        turn_id: TurnId,
        candidates: &[CandidateTriple],
    ) -> Result<ExecutionResult> {
        let plan = self
            .planner
            .plan(self.store.as_ref(), turn_id.clone(), candidates)
            .await?;
        tracing::info!(
            turn_id = %turn_id,
            candidates = candidates.len(),
            ops = plan.ops.len(),
            skipped = plan.skipped.len(),
            "Planned turn"
        );
        self.executor.execute(plan).await
    }
}
