// ==========================================
// Composite MES - Department transfer coordinator
// ==========================================
// Handles scan-originated EXIT/ENTRY events. An EXIT from department X
// applies IN_X -> X_COMPLETED and, when the routing table names a default
// next department, synthesizes the follow-up ENTRY and applies
// X_COMPLETED -> IN_<next> in the same transaction. The next department is
// re-derived from status alone, so a retry after a crash is safe.
//
// A scan whose department does not match the order's current department
// changes nothing but is still logged as a rejected attempt.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::event::ProductionEvent;
use crate::domain::order::Actor;
use crate::domain::types::{Department, EventSource, EventType, OrderStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::routing;
use crate::engine::workflow::{apply_transition_tx, ApplyArgs};
use crate::repository::error::RepositoryError;
use crate::repository::event_repo::ProductionEventRepository;
use crate::repository::order_repo::OrderRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

// ==========================================
// ScanEvent
// ==========================================
// A scan-originated intent after payload parsing. The idempotency key is
// client-generated (order + event type + client timestamp) and stored on
// the first applied event, which is what makes replay a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub order_number: String,
    pub department: Department,
    pub event_type: EventType,
    pub scanned_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

impl ScanEvent {
    pub fn exit(order_number: &str, department: Department, scanned_at: DateTime<Utc>) -> Self {
        Self {
            order_number: order_number.to_string(),
            department,
            event_type: EventType::Exit,
            scanned_at,
            idempotency_key: None,
        }
    }

    pub fn entry(order_number: &str, department: Department, scanned_at: DateTime<Utc>) -> Self {
        Self {
            order_number: order_number.to_string(),
            department,
            event_type: EventType::Entry,
            scanned_at,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: &str) -> Self {
        self.idempotency_key = Some(key.to_string());
        self
    }
}

// ==========================================
// TransferOutcome
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// Idempotency key already applied: accepted as a no-op success.
    Duplicate,
    Exited {
        from: Department,
        /// Default next department entered in the same transaction, when
        /// the routing table names one.
        entered: Option<Department>,
        new_status: OrderStatus,
    },
    Entered {
        department: Department,
        new_status: OrderStatus,
    },
}

// ==========================================
// DepartmentTransferCoordinator
// ==========================================

pub struct DepartmentTransferCoordinator {
    conn: SharedConnection,
}

impl DepartmentTransferCoordinator {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Scan EXIT: complete the current department and, when routed, enter
    /// the next one atomically.
    #[instrument(skip(self, scan, actor), fields(order_number = %scan.order_number, department = %scan.department))]
    pub fn handle_exit(&self, scan: &ScanEvent, actor: &Actor) -> EngineResult<TransferOutcome> {
        self.with_retry(|| self.try_exit(scan, actor))
    }

    /// Scan ENTRY: move an assigned or routed order into the scanned
    /// department.
    #[instrument(skip(self, scan, actor), fields(order_number = %scan.order_number, department = %scan.department))]
    pub fn handle_entry(&self, scan: &ScanEvent, actor: &Actor) -> EngineResult<TransferOutcome> {
        self.with_retry(|| self.try_entry(scan, actor))
    }

    fn with_retry<F>(&self, mut op: F) -> EngineResult<TransferOutcome>
    where
        F: FnMut() -> EngineResult<TransferOutcome>,
    {
        let mut retried = false;
        loop {
            match op() {
                Err(e) if e.is_retryable() && !retried => {
                    warn!(error = %e, "transfer conflict, retrying once");
                    retried = true;
                }
                other => return other,
            }
        }
    }

    fn try_exit(&self, scan: &ScanEvent, actor: &Actor) -> EngineResult<TransferOutcome> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::from(RepositoryError::LockError(e.to_string())))?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        if let Some(key) = &scan.idempotency_key {
            if ProductionEventRepository::key_exists_tx(&tx, key)? {
                return Ok(TransferOutcome::Duplicate);
            }
        }

        let order = OrderRepository::require_tx(&tx, &scan.order_number)?;
        let dept = scan.department;

        if order.status != OrderStatus::InDepartment(dept) {
            // No state change; the attempt itself is still audit material.
            let rejected = ProductionEvent::new(
                &order.order_number,
                Some(dept),
                EventType::Exit,
                &actor.id,
                EventSource::QrScan,
                true,
            )
            .with_occurred_at(scan.scanned_at)
            .rejected_attempt(&format!(
                "exit scan refused: order is {}, not IN_{}",
                order.status,
                dept.code()
            ));
            ProductionEventRepository::append_tx(&tx, &rejected)?;
            tx.commit().map_err(RepositoryError::from)?;

            return Err(EngineError::DepartmentMismatch {
                order_number: order.order_number.clone(),
                expected: order.status.current_department(),
                scanned: dept,
            });
        }

        // Step 1: IN_X -> X_COMPLETED, with the EXIT event carrying the
        // idempotency key.
        apply_transition_tx(
            &tx,
            &ApplyArgs {
                order: &order,
                target: OrderStatus::DepartmentCompleted(dept),
                actor_id: &actor.id,
                reason: &format!("scan exit from {}", dept.code()),
                event_type: EventType::Exit,
                event_department: Some(dept),
                source: EventSource::QrScan,
                is_automatic: true,
                idempotency_key: scan.idempotency_key.as_deref(),
                forced: false,
                bypassed_validation: true,
                occurred_at: Some(scan.scanned_at),
            },
        )?;

        // Step 2: derived from status alone, so retry after a crash lands
        // on the same answer.
        let next = routing::default_next(dept);
        let new_status = if let Some(next_dept) = next {
            let current = OrderRepository::require_tx(&tx, &scan.order_number)?;
            let outcome = apply_transition_tx(
                &tx,
                &ApplyArgs {
                    order: &current,
                    target: OrderStatus::InDepartment(next_dept),
                    actor_id: &actor.id,
                    reason: &format!("automatic transfer to {}", next_dept.code()),
                    event_type: EventType::Entry,
                    event_department: Some(next_dept),
                    source: EventSource::QrScan,
                    is_automatic: true,
                    idempotency_key: None,
                    forced: false,
                    bypassed_validation: true,
                    occurred_at: Some(scan.scanned_at),
                },
            )?;
            outcome.new_status
        } else {
            OrderStatus::DepartmentCompleted(dept)
        };

        tx.commit().map_err(RepositoryError::from)?;
        info!(
            entered = next.map(|d| d.code()).unwrap_or("-"),
            "exit transfer applied"
        );
        Ok(TransferOutcome::Exited {
            from: dept,
            entered: next,
            new_status,
        })
    }

    fn try_entry(&self, scan: &ScanEvent, actor: &Actor) -> EngineResult<TransferOutcome> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::from(RepositoryError::LockError(e.to_string())))?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        if let Some(key) = &scan.idempotency_key {
            if ProductionEventRepository::key_exists_tx(&tx, key)? {
                return Ok(TransferOutcome::Duplicate);
            }
        }

        let order = OrderRepository::require_tx(&tx, &scan.order_number)?;
        let dept = scan.department;

        let admissible = match order.status {
            OrderStatus::Created => true,
            OrderStatus::AssignedTo(d) => d == dept,
            OrderStatus::DepartmentCompleted(p) => routing::successors(p).contains(&dept),
            _ => false,
        };
        if !admissible {
            let rejected = ProductionEvent::new(
                &order.order_number,
                Some(dept),
                EventType::Entry,
                &actor.id,
                EventSource::QrScan,
                true,
            )
            .with_occurred_at(scan.scanned_at)
            .rejected_attempt(&format!(
                "entry scan refused: order is {}, cannot enter {}",
                order.status,
                dept.code()
            ));
            ProductionEventRepository::append_tx(&tx, &rejected)?;
            tx.commit().map_err(RepositoryError::from)?;

            return Err(EngineError::DepartmentMismatch {
                order_number: order.order_number.clone(),
                expected: order.status.assigned_department(),
                scanned: dept,
            });
        }

        let outcome = apply_transition_tx(
            &tx,
            &ApplyArgs {
                order: &order,
                target: OrderStatus::InDepartment(dept),
                actor_id: &actor.id,
                reason: &format!("scan entry into {}", dept.code()),
                event_type: EventType::Entry,
                event_department: Some(dept),
                source: EventSource::QrScan,
                is_automatic: true,
                idempotency_key: scan.idempotency_key.as_deref(),
                forced: false,
                bypassed_validation: true,
                occurred_at: Some(scan.scanned_at),
            },
        )?;

        tx.commit().map_err(RepositoryError::from)?;
        Ok(TransferOutcome::Entered {
            department: dept,
            new_status: outcome.new_status,
        })
    }
}
