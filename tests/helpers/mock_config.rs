// ==========================================
// Fixed-policy config for integration tests
// ==========================================

use async_trait::async_trait;
use composite_mes::config::{OptimizerSettings, WorkflowConfigReader, WorkflowPolicy};
use composite_mes::repository::RepositoryResult;

#[derive(Debug, Clone, Copy)]
pub struct FixedConfig {
    pub policy: WorkflowPolicy,
    pub optimizer: OptimizerSettings,
}

impl FixedConfig {
    pub fn standard() -> Self {
        Self {
            policy: WorkflowPolicy::default(),
            optimizer: OptimizerSettings::default(),
        }
    }

    pub fn with_windows(backward_window: i64, forward_jump_limit: i64) -> Self {
        Self {
            policy: WorkflowPolicy {
                backward_window,
                forward_jump_limit,
            },
            optimizer: OptimizerSettings::default(),
        }
    }
}

#[async_trait]
impl WorkflowConfigReader for FixedConfig {
    async fn workflow_policy(&self) -> RepositoryResult<WorkflowPolicy> {
        Ok(self.policy)
    }

    async fn optimizer_settings(&self) -> RepositoryResult<OptimizerSettings> {
        Ok(self.optimizer)
    }
}
