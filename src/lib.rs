// ==========================================
// Composite MES - Core library
// ==========================================
// Manufacturing-execution core for an aerospace composite-parts plant:
// order workflow, department transfers, autoclave batch optimization and
// lifecycle, offline scan replay, append-only event log.
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer - entities and closed enums
pub mod domain;

// Repository layer - data access
pub mod repository;

// Engine layer - business rules
pub mod engine;

// Config layer - tunable policies
pub mod config;

// Database infrastructure (connection init / PRAGMA in one place)
pub mod db;

// Logging
pub mod logging;

// API layer - wire contracts and orchestration
pub mod api;

// ==========================================
// Core re-exports
// ==========================================

pub use domain::types::{
    ActorRole, BatchStatus, Department, EventSource, EventType, OrderStatus, Priority,
};

pub use domain::{Actor, Autoclave, AutoclaveLoad, CuringCycle, Order, ProductionEvent};

pub use engine::{
    BatchLifecycle, BatchOptimizer, DepartmentTransferCoordinator, EngineError,
    OfflineIngestionQueue, ProposalStore, WorkflowStateMachine,
};

pub use api::ProductionApi;

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Composite MES";

pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
