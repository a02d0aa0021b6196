// ==========================================
// Composite MES - Engine layer
// ==========================================
// Business rules live here; repositories do the SQL. Every rejection is a
// typed error with an explicit reason, never a silent drop.
// ==========================================

pub mod batch_lifecycle;
pub mod error;
pub mod ingestion;
pub mod optimizer;
pub mod routing;
pub mod session;
pub mod transfer;
pub mod workflow;

pub use batch_lifecycle::{BatchLifecycle, ConfirmOutcome, StaleOrder};
pub use error::{EngineError, EngineResult};
pub use ingestion::{
    IntentOutcome, OfflineIngestionQueue, ReplayResult, ReplaySummary, ScanIntent,
};
pub use optimizer::{
    BatchOptimizer, BatchProposal, PlacementRejection, ProposedPlacement, UnplacedOrder,
};
pub use session::{OptimizationSession, ProposalStore};
pub use transfer::{DepartmentTransferCoordinator, ScanEvent, TransferOutcome};
pub use workflow::{TransitionCommand, TransitionOutcome, WorkflowStateMachine};
