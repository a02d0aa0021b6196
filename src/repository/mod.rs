// ==========================================
// Composite MES - Repository layer
// ==========================================
// Data access only: repositories never apply business rules. All queries
// are parameterized. Multi-write atomicity is composed by the engines via
// the *_tx associated functions, which run inside a caller-owned
// rusqlite transaction.
// ==========================================

pub mod audit_repo;
pub mod batch_repo;
pub mod error;
pub mod event_repo;
pub mod order_repo;
pub mod reference_repo;

pub use audit_repo::StatusAuditRepository;
pub use batch_repo::AutoclaveLoadRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use event_repo::ProductionEventRepository;
pub use order_repo::OrderRepository;
pub use reference_repo::{AutoclaveRepository, CuringCycleRepository};
