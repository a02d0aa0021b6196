// ==========================================
// Composite MES - API layer error types
// ==========================================
// Converts engine and repository errors into wire-friendly errors with
// enough structure to render a corrective UI. InvalidTransition keeps the
// valid-next-states list as wire strings so the dashboard can offer them
// directly.
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ===== Validation =====
    #[error("invalid transition {from} -> {to} for {order_number}: {detail}")]
    InvalidTransition {
        order_number: String,
        from: String,
        to: String,
        detail: String,
        valid_next: Vec<String>,
    },

    #[error("reason is required: {0}")]
    MissingReason(String),

    #[error("department mismatch for {order_number}: scanned {scanned}, expected {expected}")]
    DepartmentMismatch {
        order_number: String,
        expected: String,
        scanned: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ===== Batch =====
    #[error("batch conflict: {0}")]
    BatchConflict(String),

    #[error("optimization proposal not found or expired: {0}")]
    ProposalExpired(String),

    // ===== Concurrency / infrastructure =====
    #[error("concurrent modification, retry the operation: {0}")]
    ConcurrencyConflict(String),

    #[error("store timeout: {0}")]
    StoreTimeout(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTransition {
                order_number,
                from,
                to,
                detail,
                valid_next,
            } => ApiError::InvalidTransition {
                order_number,
                from: from.to_string(),
                to: to.to_string(),
                detail,
                valid_next: valid_next.iter().map(|s| s.wire()).collect(),
            },
            EngineError::MissingReason { order_number } => ApiError::MissingReason(order_number),
            EngineError::DepartmentMismatch {
                order_number,
                expected,
                scanned,
            } => ApiError::DepartmentMismatch {
                order_number,
                expected: expected.map(|d| d.code().to_string()).unwrap_or_default(),
                scanned: scanned.code().to_string(),
            },
            EngineError::BatchState {
                load_id,
                from,
                attempted,
            } => ApiError::BatchConflict(format!("load {load_id} in {from} cannot {attempted}")),
            EngineError::BatchMembersConflict { load_id, conflicts } => {
                let detail = conflicts
                    .iter()
                    .map(|(o, s)| format!("{o}={s}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                ApiError::BatchConflict(format!("load {load_id} member conflicts: {detail}"))
            }
            EngineError::ProposalExpired { proposal_id } => ApiError::ProposalExpired(proposal_id),
            EngineError::InvalidIntent {
                order_number,
                detail,
            } => ApiError::InvalidInput(format!("{order_number}: {detail}")),
            EngineError::ConcurrencyConflict { entity, id } => {
                ApiError::ConcurrencyConflict(format!("{entity} {id}"))
            }
            EngineError::StoreTimeout(msg) => ApiError::StoreTimeout(msg),
            EngineError::NotFound { entity, id } => ApiError::NotFound(format!("{entity} {id}")),
            EngineError::Repository(repo) => repo.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure { entity, id, .. } => {
                ApiError::ConcurrencyConflict(format!("{entity} {id}"))
            }
            RepositoryError::Busy(msg) => ApiError::StoreTimeout(msg),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} {id}"))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Department, OrderStatus};

    #[test]
    fn test_invalid_transition_carries_wire_statuses() {
        let err = EngineError::InvalidTransition {
            order_number: "ODL-1".to_string(),
            from: OrderStatus::InDepartment(Department::Ndi),
            to: OrderStatus::InDepartment(Department::Cleanroom),
            detail: "backward move outside the allowed window".to_string(),
            valid_next: vec![OrderStatus::DepartmentCompleted(Department::Ndi)],
        };
        match ApiError::from(err) {
            ApiError::InvalidTransition { valid_next, .. } => {
                assert_eq!(valid_next, vec!["NDI_COMPLETED".to_string()]);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_repository_busy_maps_to_timeout() {
        let err = RepositoryError::Busy("database is locked".to_string());
        assert!(matches!(ApiError::from(err), ApiError::StoreTimeout(_)));
    }
}
