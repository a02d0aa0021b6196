// ==========================================
// Composite MES - Production API
// ==========================================
// Thin orchestration over the engines for REST/command handlers: payload
// parsing, proposal session bookkeeping, DTO mapping. No business rules
// live here.
// ==========================================

use crate::api::dto::{
    BatchConfirmRequest, BatchConfirmResponse, ScanPayload, StaleOrderDto, TransitionRequest,
    TransitionResponse,
};
use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::WorkflowConfigReader;
use crate::db::SharedConnection;
use crate::domain::event::ProductionEvent;
use crate::domain::order::Actor;
use crate::domain::types::{Department, EventType};
use crate::engine::batch_lifecycle::BatchLifecycle;
use crate::engine::ingestion::{OfflineIngestionQueue, ReplaySummary, ScanIntent};
use crate::engine::optimizer::BatchOptimizer;
use crate::engine::session::ProposalStore;
use crate::engine::transfer::{DepartmentTransferCoordinator, ScanEvent, TransferOutcome};
use crate::engine::workflow::{TransitionCommand, WorkflowStateMachine};
use crate::repository::event_repo::ProductionEventRepository;
use crate::repository::order_repo::OrderRepository;
use crate::repository::reference_repo::{AutoclaveRepository, CuringCycleRepository};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct ProductionApi<C>
where
    C: WorkflowConfigReader,
{
    workflow: WorkflowStateMachine<C>,
    transfers: DepartmentTransferCoordinator,
    optimizer: BatchOptimizer<C>,
    lifecycle: BatchLifecycle,
    ingestion: OfflineIngestionQueue,
    proposals: Arc<ProposalStore>,
    events: ProductionEventRepository,
}

impl<C> ProductionApi<C>
where
    C: WorkflowConfigReader,
{
    pub fn new(conn: SharedConnection, config: Arc<C>, proposals: Arc<ProposalStore>) -> Self {
        Self {
            workflow: WorkflowStateMachine::new(conn.clone(), config.clone()),
            transfers: DepartmentTransferCoordinator::new(conn.clone()),
            optimizer: BatchOptimizer::new(
                Arc::new(OrderRepository::new(conn.clone())),
                Arc::new(AutoclaveRepository::new(conn.clone())),
                Arc::new(CuringCycleRepository::new(conn.clone())),
                config,
            ),
            lifecycle: BatchLifecycle::new(conn.clone()),
            ingestion: OfflineIngestionQueue::new(conn.clone()),
            proposals,
            events: ProductionEventRepository::new(conn),
        }
    }

    // ==========================================
    // Manual transitions
    // ==========================================

    #[instrument(skip(self, request, actor), fields(order_number = %order_number))]
    pub async fn change_status(
        &self,
        order_number: &str,
        request: &TransitionRequest,
        actor: &Actor,
    ) -> ApiResult<TransitionResponse> {
        let target = request.target().ok_or_else(|| {
            ApiError::InvalidInput(format!("unknown status {}", request.new_status))
        })?;

        let mut cmd = TransitionCommand::manual(target, actor.clone(), request.reason.trim());
        cmd.force = request.force_change;
        cmd.bypass_validation = request.bypass_workflow;

        let outcome = self.workflow.transition(order_number, &cmd).await?;
        Ok(TransitionResponse {
            order_number: outcome.order_number,
            previous_status: outcome.previous_status.wire(),
            new_status: outcome.new_status.wire(),
            actor: outcome.actor_id,
            reason: outcome.reason,
        })
    }

    pub fn valid_next_statuses(&self, order_number: &str) -> ApiResult<Vec<String>> {
        let statuses = self.workflow.valid_next_statuses(order_number)?;
        Ok(statuses.iter().map(|s| s.wire()).collect())
    }

    // ==========================================
    // Scans
    // ==========================================

    /// A live scan from a connected station's reader.
    #[instrument(skip(self, payload, actor), fields(department = %department, event_type = %event_type))]
    pub fn handle_scan(
        &self,
        payload: ScanPayload,
        department: Department,
        event_type: EventType,
        actor: &Actor,
    ) -> ApiResult<TransferOutcome> {
        if !payload.is_order() {
            return Err(ApiError::InvalidInput(format!(
                "unsupported label type {}",
                payload.kind
            )));
        }
        let intent = payload.into_intent(department, event_type);
        let scan = ScanEvent {
            order_number: intent.order_number.clone(),
            department: intent.department,
            event_type: intent.event_type,
            scanned_at: intent.scanned_at,
            idempotency_key: Some(intent.idempotency_key()),
        };
        let outcome = match event_type {
            EventType::Exit => self.transfers.handle_exit(&scan, actor)?,
            EventType::Entry => self.transfers.handle_entry(&scan, actor)?,
            other => {
                return Err(ApiError::InvalidInput(format!(
                    "scan stations only emit ENTRY/EXIT, got {other}"
                )))
            }
        };
        Ok(outcome)
    }

    /// Replay a disconnected client's buffered intents.
    pub fn replay_offline(
        &self,
        client_id: &str,
        intents: &[ScanIntent],
        actor: &Actor,
    ) -> ApiResult<ReplaySummary> {
        Ok(self.ingestion.replay(client_id, intents, actor)?)
    }

    // ==========================================
    // Batch optimization
    // ==========================================

    /// Generate a proposal, park it in the session store, and return the
    /// session token alongside the proposal for display.
    #[instrument(skip(self), fields(autoclave = %autoclave_code, cycle = %cycle_code))]
    pub async fn propose_batch(
        &self,
        autoclave_code: &str,
        cycle_code: &str,
    ) -> ApiResult<(String, crate::engine::optimizer::BatchProposal)> {
        let proposal = self.optimizer.propose(autoclave_code, cycle_code).await?;
        debug!(layout = %proposal.layout_text(), "proposal generated");
        let session_id = self.proposals.insert(vec![proposal.clone()]);
        Ok((session_id, proposal))
    }

    /// Confirm proposals from a session. The session token is consumed:
    /// confirming the same token twice cannot double-create loads.
    #[instrument(skip(self, request, actor), fields(session = %request.optimization_proposal_id))]
    pub fn confirm_batches(
        &self,
        request: &BatchConfirmRequest,
        actor: &Actor,
    ) -> ApiResult<BatchConfirmResponse> {
        let session = self
            .proposals
            .take(&request.optimization_proposal_id)
            .ok_or_else(|| {
                ApiError::ProposalExpired(request.optimization_proposal_id.clone())
            })?;

        let mut batch_ids = Vec::new();
        let mut stale_orders = Vec::new();
        for proposal in &session.proposals {
            if request.rejected_batch_ids.contains(&proposal.proposal_id) {
                continue;
            }
            if !request.confirmed_batch_ids.is_empty()
                && !request.confirmed_batch_ids.contains(&proposal.proposal_id)
            {
                continue;
            }
            let outcome = self.lifecycle.confirm(proposal, actor)?;
            stale_orders.extend(outcome.stale.into_iter().map(|s| StaleOrderDto {
                order_number: s.order_number,
                status: s.status.map(|st| st.wire()),
            }));
            if let Some(load_id) = outcome.load_id {
                batch_ids.push(load_id);
            }
        }

        info!(created = batch_ids.len(), "batch confirmation finished");
        Ok(BatchConfirmResponse {
            created: batch_ids.len(),
            batch_ids,
            stale_orders,
        })
    }

    pub fn advance_batch(&self, load_id: &str, actor: &Actor) -> ApiResult<String> {
        let status = self.lifecycle.advance(load_id, actor)?;
        Ok(status.to_string())
    }

    pub fn delete_batch(&self, load_id: &str, actor: &Actor) -> ApiResult<usize> {
        Ok(self.lifecycle.delete(load_id, actor)?)
    }

    // ==========================================
    // Event log reads
    // ==========================================

    pub fn order_events(&self, order_number: &str) -> ApiResult<Vec<ProductionEvent>> {
        Ok(self.events.list_by_order(order_number)?)
    }
}
