// ==========================================
// Composite MES - Engine layer error types
// ==========================================
// Validation failures are values, not panics: every rejection path is a
// typed variant the caller must handle. InvalidTransition carries the
// valid next states so the UI can propose alternatives.
// ==========================================

use crate::domain::types::{BatchStatus, Department, OrderStatus};
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== Workflow validation =====
    #[error("invalid transition for {order_number}: {from} -> {to} ({detail})")]
    InvalidTransition {
        order_number: String,
        from: OrderStatus,
        to: OrderStatus,
        detail: String,
        /// Directly derived from the routing edge set.
        valid_next: Vec<OrderStatus>,
    },

    #[error("reason is mandatory for manual transitions on {order_number}")]
    MissingReason { order_number: String },

    #[error(
        "department mismatch for {order_number}: scanned {scanned}, expected {expected:?}"
    )]
    DepartmentMismatch {
        order_number: String,
        expected: Option<Department>,
        scanned: Department,
    },

    // ===== Batch lifecycle =====
    #[error("load {load_id} in status {from} cannot {attempted}")]
    BatchState {
        load_id: String,
        from: BatchStatus,
        attempted: String,
    },

    /// One or more placed orders moved since the load was assembled; the
    /// whole batch transition fails and the conflicts are reported.
    #[error("load {load_id} has {} conflicting member orders", conflicts.len())]
    BatchMembersConflict {
        load_id: String,
        conflicts: Vec<(String, OrderStatus)>,
    },

    #[error("proposal {proposal_id} not found or expired")]
    ProposalExpired { proposal_id: String },

    // ===== Ingestion =====
    #[error("invalid scan intent for {order_number}: {detail}")]
    InvalidIntent {
        order_number: String,
        detail: String,
    },

    // ===== Infrastructure =====
    #[error("concurrent modification of {entity} {id}")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("store timeout: {0}")]
    StoreTimeout(String),

    #[error("not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Busy(msg) => EngineError::StoreTimeout(msg),
            RepositoryError::OptimisticLockFailure { entity, id, .. } => {
                EngineError::ConcurrencyConflict { entity, id }
            }
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Repository(other),
        }
    }
}

impl EngineError {
    /// Errors worth one internal retry (lost races and bounded timeouts).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConcurrencyConflict { .. } | EngineError::StoreTimeout(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
