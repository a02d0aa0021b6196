// ==========================================
// Composite MES - Repository layer error types
// ==========================================
// thiserror enums; rusqlite errors are classified on the way out so
// callers can tell a busy/timeout from a constraint violation.
// ==========================================

use thiserror::Error;

/// Repository layer errors.
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== Concurrency control =====
    #[error("optimistic lock failure: {entity} id={id}, expected revision {expected}")]
    OptimisticLockFailure {
        entity: String,
        id: String,
        expected: i64,
    },

    #[error("database busy: {0}")]
    Busy(String),

    #[error("connection lock poisoned: {0}")]
    LockError(String),

    // ===== Database =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("database transaction failed: {0}")]
    TransactionError(String),

    #[error("database query failed: {0}")]
    QueryError(String),

    #[error("unique constraint violation: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    // ===== Data quality =====
    #[error("stored value invalid (column={column}): {message}")]
    CorruptValue { column: String, message: String },

    // ===== Generic =====
    #[error("internal repository error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let text = msg.clone().unwrap_or_else(|| code.to_string());
                if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    RepositoryError::Busy(text)
                } else if text.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(text)
                } else if text.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(text)
                } else {
                    RepositoryError::QueryError(text)
                }
            }
            _ => RepositoryError::QueryError(err.to_string()),
        }
    }
}

impl RepositoryError {
    /// True for errors a caller may retry once (busy/lock contention).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepositoryError::Busy(_) | RepositoryError::OptimisticLockFailure { .. }
        )
    }
}

/// Repository result alias.
pub type RepositoryResult<T> = Result<T, RepositoryError>;
