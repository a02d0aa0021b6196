// ==========================================
// Composite MES - Domain layer
// ==========================================
// Entities and closed type sets. No persistence, no business rules:
// those live in repository/ and engine/ respectively.
// ==========================================

pub mod batch;
pub mod event;
pub mod order;
pub mod types;

pub use batch::{Autoclave, AutoclaveLoad, CuringCycle, LoadPlacement};
pub use event::{ProductionEvent, StatusAuditRecord};
pub use order::{Actor, Order};
pub use types::{
    ActorRole, BatchStatus, Department, EventSource, EventType, OrderStatus, Priority,
};
