// ==========================================
// Composite MES - Configuration layer
// ==========================================

pub mod config_manager;

pub use config_manager::{ConfigManager, OptimizerSettings, WorkflowConfigReader, WorkflowPolicy};
