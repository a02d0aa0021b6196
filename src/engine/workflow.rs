// ==========================================
// Composite MES - Workflow state machine
// ==========================================
// Validates and applies order status transitions. On acceptance, three
// writes happen as one atomic unit inside a single transaction:
//   1. revision-checked status update
//   2. production event append
//   3. status audit append
// On rejection the caller receives a typed error carrying the valid next
// states derived from the routing edge set.
//
// Role policy:
// - ADMIN transitions unconditionally (reason still mandatory when manual)
// - edge-set moves and ON_HOLD are open to every role
// - SUPERVISOR additionally gets non-edge moves inside the configured
//   windows: forward up to forward_jump_limit positions, backward up to
//   backward_window positions; `force` widens both
// - terminal orders are immutable to non-ADMIN actors
// ==========================================

use crate::config::config_manager::{WorkflowConfigReader, WorkflowPolicy};
use crate::db::SharedConnection;
use crate::domain::event::{ProductionEvent, StatusAuditRecord};
use crate::domain::order::{Actor, Order};
use crate::domain::types::{ActorRole, Department, EventSource, EventType, OrderStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::routing;
use crate::repository::audit_repo::StatusAuditRepository;
use crate::repository::error::RepositoryError;
use crate::repository::event_repo::ProductionEventRepository;
use crate::repository::order_repo::OrderRepository;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};

// ==========================================
// TransitionCommand
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionCommand {
    pub target: OrderStatus,
    pub actor: Actor,
    /// Mandatory for any manually triggered transition.
    pub reason: Option<String>,
    pub force: bool,
    pub bypass_validation: bool,
    pub source: EventSource,
    pub is_automatic: bool,
}

impl TransitionCommand {
    /// Dashboard-originated transition.
    pub fn manual(target: OrderStatus, actor: Actor, reason: &str) -> Self {
        Self {
            target,
            actor,
            reason: Some(reason.to_string()),
            force: false,
            bypass_validation: false,
            source: EventSource::Manual,
            is_automatic: false,
        }
    }

    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }
}

// ==========================================
// TransitionOutcome
// ==========================================
// Returned to the caller for audit display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub order_number: String,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub actor_id: String,
    pub reason: String,
}

/// Department a status is about, for event attribution.
fn status_department(status: OrderStatus) -> Option<Department> {
    match status {
        OrderStatus::AssignedTo(d)
        | OrderStatus::InDepartment(d)
        | OrderStatus::DepartmentCompleted(d) => Some(d),
        OrderStatus::Created
        | OrderStatus::OnHold
        | OrderStatus::Completed
        | OrderStatus::Cancelled => None,
    }
}

// ==========================================
// Validation (pure)
// ==========================================

/// Apply the role-gated transition rules. Pure so the rule table can be
/// tested without a database.
pub fn validate_transition(
    order: &Order,
    cmd: &TransitionCommand,
    policy: &WorkflowPolicy,
) -> EngineResult<()> {
    let current = order.status;
    let target = cmd.target;

    let reject = |detail: &str| EngineError::InvalidTransition {
        order_number: order.order_number.clone(),
        from: current,
        to: target,
        detail: detail.to_string(),
        valid_next: routing::valid_next(current),
    };

    if target == current {
        return Err(reject("order already in target status"));
    }

    // Reason discipline comes before any role shortcut: a manual change
    // without a reason is rejected even for ADMIN.
    if !cmd.is_automatic
        && cmd.reason.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Err(EngineError::MissingReason {
            order_number: order.order_number.clone(),
        });
    }

    if cmd.bypass_validation || cmd.actor.role == ActorRole::Admin {
        return Ok(());
    }

    if current.is_terminal() {
        return Err(reject("terminal status is immutable"));
    }

    // The universal pause node and plain edge moves are open to all roles.
    if target == OrderStatus::OnHold {
        return Ok(());
    }
    if routing::valid_next(current).contains(&target) {
        return Ok(());
    }

    // Non-edge moves: windowed overrides for SUPERVISOR only.
    if cmd.actor.role == ActorRole::Operator {
        return Err(reject("target not reachable from current status"));
    }

    let (from_pos, to_pos) = match (
        routing::sequence_position(current),
        routing::sequence_position(target),
    ) {
        (Some(f), Some(t)) => (f, t),
        _ => return Err(reject("target not reachable from current status")),
    };

    let delta = to_pos - from_pos;
    if delta > 0 {
        if delta > policy.forward_jump_limit && !cmd.force {
            return Err(reject(
                "forward jump too wide, traverse intermediate completions or force",
            ));
        }
        Ok(())
    } else {
        if -delta > policy.backward_window && !cmd.force {
            return Err(reject(
                "backward move outside the allowed window, requires elevated role or force",
            ));
        }
        Ok(())
    }
}

// ==========================================
// Atomic apply (shared with coordinator and batch cascades)
// ==========================================

pub(crate) struct ApplyArgs<'a> {
    pub order: &'a Order,
    pub target: OrderStatus,
    pub actor_id: &'a str,
    pub reason: &'a str,
    pub event_type: EventType,
    pub event_department: Option<Department>,
    pub source: EventSource,
    pub is_automatic: bool,
    pub idempotency_key: Option<&'a str>,
    pub forced: bool,
    pub bypassed_validation: bool,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// The three-write atomic unit, inside the caller's transaction.
pub(crate) fn apply_transition_tx(
    conn: &Connection,
    args: &ApplyArgs<'_>,
) -> EngineResult<TransitionOutcome> {
    OrderRepository::update_status_tx(
        conn,
        &args.order.order_number,
        args.order.revision,
        args.target,
    )?;

    let mut event = ProductionEvent::new(
        &args.order.order_number,
        args.event_department,
        args.event_type,
        args.actor_id,
        args.source,
        args.is_automatic,
    )
    .with_note(args.reason);
    if let Some(ts) = args.occurred_at {
        event = event.with_occurred_at(ts);
    }
    if let Some(key) = args.idempotency_key {
        event = event.with_idempotency_key(key);
    }
    ProductionEventRepository::append_tx(conn, &event)?;

    let audit = StatusAuditRecord::new(
        &args.order.order_number,
        args.order.status,
        args.target,
        args.actor_id,
        args.reason,
    )
    .with_flags(args.forced, args.bypassed_validation);
    StatusAuditRepository::append_tx(conn, &audit)?;

    Ok(TransitionOutcome {
        order_number: args.order.order_number.clone(),
        previous_status: args.order.status,
        new_status: args.target,
        actor_id: args.actor_id.to_string(),
        reason: args.reason.to_string(),
    })
}

// ==========================================
// WorkflowStateMachine
// ==========================================

pub struct WorkflowStateMachine<C>
where
    C: WorkflowConfigReader,
{
    conn: SharedConnection,
    config: Arc<C>,
}

impl<C> WorkflowStateMachine<C>
where
    C: WorkflowConfigReader,
{
    pub fn new(conn: SharedConnection, config: Arc<C>) -> Self {
        Self { conn, config }
    }

    /// Validate and apply one transition. Lost races (revision conflict)
    /// and bounded store timeouts are retried once, then surfaced.
    #[instrument(skip(self, cmd), fields(order_number = %order_number, target = %cmd.target))]
    pub async fn transition(
        &self,
        order_number: &str,
        cmd: &TransitionCommand,
    ) -> EngineResult<TransitionOutcome> {
        let policy = self.config.workflow_policy().await?;
        let mut retried = false;
        loop {
            match self.try_transition(order_number, cmd, &policy) {
                Err(e) if e.is_retryable() && !retried => {
                    warn!(error = %e, "transition conflict, retrying once");
                    retried = true;
                }
                other => return other,
            }
        }
    }

    fn try_transition(
        &self,
        order_number: &str,
        cmd: &TransitionCommand,
        policy: &WorkflowPolicy,
    ) -> EngineResult<TransitionOutcome> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::from(RepositoryError::LockError(e.to_string())))?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        let order = OrderRepository::require_tx(&tx, order_number)?;
        validate_transition(&order, cmd, policy)?;

        let reason = cmd
            .reason
            .clone()
            .unwrap_or_else(|| format!("status changed to {}", cmd.target));
        let outcome = apply_transition_tx(
            &tx,
            &ApplyArgs {
                order: &order,
                target: cmd.target,
                actor_id: &cmd.actor.id,
                reason: &reason,
                event_type: EventType::Note,
                event_department: status_department(cmd.target),
                source: cmd.source,
                is_automatic: cmd.is_automatic,
                idempotency_key: None,
                forced: cmd.force,
                bypassed_validation: cmd.bypass_validation,
                occurred_at: None,
            },
        )?;

        tx.commit().map_err(RepositoryError::from)?;
        Ok(outcome)
    }

    /// Valid next statuses for an order, straight from the edge set.
    pub fn valid_next_statuses(&self, order_number: &str) -> EngineResult<Vec<OrderStatus>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::from(RepositoryError::LockError(e.to_string())))?;
        let order = OrderRepository::require_tx(&conn, order_number)?;
        Ok(routing::valid_next(order.status))
    }
}
