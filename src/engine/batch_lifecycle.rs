// ==========================================
// Composite MES - Autoclave load lifecycle
// ==========================================
// DRAFT -> READY -> IN_CURE -> COMPLETED -> RELEASED, strictly linear.
// Confirmation claims orders (ASSIGNED_TO_AUTOCLAVE) and records each
// order's prior status on its placement; deletion while DRAFT/READY
// restores exactly that status. Every advance with cascades runs in one
// transaction: a failing member rolls back the whole batch transition.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::batch::{AutoclaveLoad, LoadPlacement};
use crate::domain::order::Actor;
use crate::domain::types::{BatchStatus, Department, EventSource, EventType, OrderStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::optimizer::BatchProposal;
use crate::engine::routing;
use crate::engine::workflow::{apply_transition_tx, ApplyArgs};
use crate::repository::batch_repo::AutoclaveLoadRepository;
use crate::repository::error::RepositoryError;
use crate::repository::order_repo::OrderRepository;
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Claimed status of every order placed in an active load.
const CLAIMED: OrderStatus = OrderStatus::AssignedTo(Department::Autoclave);

// ==========================================
// Outcomes
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleOrder {
    pub order_number: String,
    /// Status at re-validation time; None when the order no longer exists.
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmOutcome {
    /// None when every placement went stale between proposal and confirm.
    pub load_id: Option<String>,
    pub placed: Vec<String>,
    pub stale: Vec<StaleOrder>,
}

// ==========================================
// BatchLifecycle
// ==========================================

pub struct BatchLifecycle {
    conn: SharedConnection,
}

impl BatchLifecycle {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn lock_conn(
        &self,
    ) -> EngineResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::from(RepositoryError::LockError(e.to_string())))
    }

    /// Convert a confirmed proposal into a persisted DRAFT load.
    ///
    /// Eligibility and the active-load disjointness invariant are
    /// re-validated per order; time has passed since the proposal was
    /// generated. Stale orders are dropped from the load and reported,
    /// the rest are claimed. The only path that mutates order status as a
    /// result of optimization.
    #[instrument(skip(self, proposal, actor), fields(proposal_id = %proposal.proposal_id))]
    pub fn confirm(
        &self,
        proposal: &BatchProposal,
        actor: &Actor,
    ) -> EngineResult<ConfirmOutcome> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        let load = AutoclaveLoad::new_draft(
            &proposal.autoclave_code,
            &proposal.curing_cycle_code,
            proposal.utilization_pct,
            proposal.total_area_mm2,
            &actor.id,
        );

        let mut placed = Vec::new();
        let mut stale = Vec::new();
        let mut placements = Vec::new();
        let mut kept_area = 0.0;

        for (idx, p) in proposal.placements.iter().enumerate() {
            let order = match OrderRepository::find_tx(&tx, &p.order_number)? {
                Some(o) => o,
                None => {
                    stale.push(StaleOrder {
                        order_number: p.order_number.clone(),
                        status: None,
                    });
                    continue;
                }
            };
            let claimed_elsewhere =
                AutoclaveLoadRepository::active_claim_tx(&tx, &order.order_number)?.is_some();
            if !routing::curing_eligible(order.status) || claimed_elsewhere {
                stale.push(StaleOrder {
                    order_number: order.order_number.clone(),
                    status: Some(order.status),
                });
                continue;
            }

            apply_transition_tx(
                &tx,
                &ApplyArgs {
                    order: &order,
                    target: CLAIMED,
                    actor_id: &actor.id,
                    reason: &format!("claimed by autoclave load {}", load.load_id),
                    event_type: EventType::Note,
                    event_department: Some(Department::Autoclave),
                    source: EventSource::Manual,
                    is_automatic: true,
                    idempotency_key: None,
                    forced: false,
                    bypassed_validation: true,
                    occurred_at: None,
                },
            )?;

            kept_area += p.length_mm * p.width_mm;
            placements.push(LoadPlacement {
                load_id: load.load_id.clone(),
                order_number: order.order_number.clone(),
                position_index: idx as i32,
                x_mm: p.x_mm,
                y_mm: p.y_mm,
                length_mm: p.length_mm,
                width_mm: p.width_mm,
                rotated: p.rotated,
                vacuum_lines: p.vacuum_lines,
                // Tracked, never re-derived: deletion restores this exact
                // status.
                prior_status: order.status,
            });
            placed.push(order.order_number);
        }

        if placements.is_empty() {
            // Nothing survived re-validation; no load is created and the
            // transaction is discarded.
            warn!(stale = stale.len(), "confirmation found no eligible orders");
            return Ok(ConfirmOutcome {
                load_id: None,
                placed,
                stale,
            });
        }

        // Metrics follow what was actually kept.
        let mut load = load;
        if proposal.total_area_mm2 > 0.0 {
            load.utilization_pct =
                (proposal.utilization_pct * kept_area / proposal.total_area_mm2 * 100.0).round()
                    / 100.0;
        }
        load.total_area_mm2 = kept_area;

        AutoclaveLoadRepository::insert_load_tx(&tx, &load)?;
        for p in &placements {
            AutoclaveLoadRepository::insert_placement_tx(&tx, p)?;
        }

        tx.commit().map_err(RepositoryError::from)?;
        info!(
            load_id = %load.load_id,
            placed = placed.len(),
            stale = stale.len(),
            "load confirmed"
        );
        Ok(ConfirmOutcome {
            load_id: Some(load.load_id),
            placed,
            stale,
        })
    }

    /// Advance the load one step. Cascades run all-or-nothing: a conflict
    /// on any member rolls the whole call back.
    #[instrument(skip(self, actor), fields(load_id = %load_id))]
    pub fn advance(&self, load_id: &str, actor: &Actor) -> EngineResult<BatchStatus> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        let load = AutoclaveLoadRepository::require_tx(&tx, load_id)?;
        let next = load.status.next().ok_or_else(|| EngineError::BatchState {
            load_id: load_id.to_string(),
            from: load.status,
            attempted: "advance".to_string(),
        })?;
        let placements = AutoclaveLoadRepository::placements_tx(&tx, load_id)?;

        match next {
            BatchStatus::Ready => {
                // Membership re-validation only; order statuses do not
                // change until the cure starts.
                let conflicts = Self::conflicting_members(&tx, &placements, CLAIMED)?;
                if !conflicts.is_empty() {
                    return Err(EngineError::BatchMembersConflict {
                        load_id: load_id.to_string(),
                        conflicts,
                    });
                }
                AutoclaveLoadRepository::update_status_tx(
                    &tx, load_id, load.status, next, None, None,
                )?;
            }
            BatchStatus::InCure => {
                Self::cascade(
                    &tx,
                    load_id,
                    &placements,
                    CLAIMED,
                    OrderStatus::InDepartment(Department::Autoclave),
                    actor,
                    "autoclave cure started",
                )?;
                AutoclaveLoadRepository::update_status_tx(
                    &tx,
                    load_id,
                    load.status,
                    next,
                    Some(Utc::now()),
                    None,
                )?;
            }
            BatchStatus::Completed => {
                Self::cascade(
                    &tx,
                    load_id,
                    &placements,
                    OrderStatus::InDepartment(Department::Autoclave),
                    OrderStatus::DepartmentCompleted(Department::Autoclave),
                    actor,
                    "autoclave cure completed",
                )?;
                AutoclaveLoadRepository::update_status_tx(
                    &tx,
                    load_id,
                    load.status,
                    next,
                    None,
                    Some(Utc::now()),
                )?;
            }
            BatchStatus::Released => {
                // Batch-only step, no order cascade; the load stops
                // claiming its orders.
                AutoclaveLoadRepository::update_status_tx(
                    &tx, load_id, load.status, next, None, None,
                )?;
            }
            BatchStatus::Draft => unreachable!("DRAFT is never a successor"),
        }

        tx.commit().map_err(RepositoryError::from)?;
        info!(status = %next, "load advanced");
        Ok(next)
    }

    /// Delete a DRAFT/READY load, restoring every order's pre-assignment
    /// status from its placement record.
    #[instrument(skip(self, actor), fields(load_id = %load_id))]
    pub fn delete(&self, load_id: &str, actor: &Actor) -> EngineResult<usize> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        let load = AutoclaveLoadRepository::require_tx(&tx, load_id)?;
        if !matches!(load.status, BatchStatus::Draft | BatchStatus::Ready) {
            return Err(EngineError::BatchState {
                load_id: load_id.to_string(),
                from: load.status,
                attempted: "delete".to_string(),
            });
        }

        let placements = AutoclaveLoadRepository::placements_tx(&tx, load_id)?;
        let mut restored = 0;
        for p in &placements {
            let order = match OrderRepository::find_tx(&tx, &p.order_number)? {
                Some(o) => o,
                None => continue,
            };
            if order.status != CLAIMED {
                // Moved by an admin while claimed; restoring would clobber.
                warn!(
                    order_number = %order.order_number,
                    status = %order.status,
                    "order left the claimed status, skipping restore"
                );
                continue;
            }
            apply_transition_tx(
                &tx,
                &ApplyArgs {
                    order: &order,
                    target: p.prior_status,
                    actor_id: &actor.id,
                    reason: &format!("load {} deleted, status restored", load_id),
                    event_type: EventType::Note,
                    event_department: Some(Department::Autoclave),
                    source: EventSource::Manual,
                    is_automatic: true,
                    idempotency_key: None,
                    forced: false,
                    bypassed_validation: true,
                    occurred_at: None,
                },
            )?;
            restored += 1;
        }

        AutoclaveLoadRepository::delete_tx(&tx, load_id)?;
        tx.commit().map_err(RepositoryError::from)?;
        info!(restored, "load deleted");
        Ok(restored)
    }

    fn conflicting_members(
        conn: &Connection,
        placements: &[LoadPlacement],
        expected: OrderStatus,
    ) -> EngineResult<Vec<(String, OrderStatus)>> {
        let mut conflicts = Vec::new();
        for p in placements {
            let order = OrderRepository::require_tx(conn, &p.order_number)?;
            if order.status != expected {
                conflicts.push((order.order_number, order.status));
            }
        }
        Ok(conflicts)
    }

    fn cascade(
        conn: &Connection,
        load_id: &str,
        placements: &[LoadPlacement],
        expected: OrderStatus,
        target: OrderStatus,
        actor: &Actor,
        reason: &str,
    ) -> EngineResult<()> {
        for p in placements {
            let order = OrderRepository::require_tx(conn, &p.order_number)?;
            if order.status != expected {
                // All-or-nothing: the caller's transaction rolls back,
                // leaving every already-cascaded member untouched.
                return Err(EngineError::BatchMembersConflict {
                    load_id: load_id.to_string(),
                    conflicts: vec![(order.order_number, order.status)],
                });
            }
            apply_transition_tx(
                conn,
                &ApplyArgs {
                    order: &order,
                    target,
                    actor_id: &actor.id,
                    reason: &format!("{reason} (load {load_id})"),
                    event_type: EventType::Note,
                    event_department: Some(Department::Autoclave),
                    source: EventSource::Manual,
                    is_automatic: true,
                    idempotency_key: None,
                    forced: false,
                    bypassed_validation: true,
                    occurred_at: None,
                },
            )?;
        }
        Ok(())
    }
}
