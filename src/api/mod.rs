// ==========================================
// Composite MES - API layer
// ==========================================
// Wire contracts and thin orchestration for whatever transport fronts the
// system (REST handlers, command bridges).
// ==========================================

pub mod dto;
pub mod error;
pub mod production_api;

pub use dto::{
    BatchConfirmRequest, BatchConfirmResponse, ScanPayload, StaleOrderDto, TransitionRequest,
    TransitionResponse,
};
pub use error::{ApiError, ApiResult};
pub use production_api::ProductionApi;
