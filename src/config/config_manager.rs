// ==========================================
// Composite MES - Configuration manager
// ==========================================
// SQLite-backed key/value configuration with compiled-in defaults.
// Engines depend on the WorkflowConfigReader trait, not on ConfigManager,
// so tests can substitute a fixed-policy reader.
// ==========================================

use crate::db::SharedConnection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

// ===== Defaults =====
pub const DEFAULT_BACKWARD_WINDOW: i64 = 2;
pub const DEFAULT_FORWARD_JUMP_LIMIT: i64 = 3;
pub const DEFAULT_UTILIZATION_TARGET_PCT: f64 = 85.0;
pub const DEFAULT_PROPOSAL_TTL_SECS: u64 = 1_800;

// ==========================================
// WorkflowPolicy
// ==========================================
// Knobs of the transition validation rules enforced by the workflow engine:
// - backward_window: positions a SUPERVISOR may move an order backwards
// - forward_jump_limit: widest forward jump without force
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkflowPolicy {
    pub backward_window: i64,
    pub forward_jump_limit: i64,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            backward_window: DEFAULT_BACKWARD_WINDOW,
            forward_jump_limit: DEFAULT_FORWARD_JUMP_LIMIT,
        }
    }
}

// ==========================================
// OptimizerSettings
// ==========================================
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Utilization the operator aims for; reported, never enforced.
    pub utilization_target_pct: f64,
    /// How long an unconfirmed proposal stays retrievable.
    pub proposal_ttl_secs: u64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            utilization_target_pct: DEFAULT_UTILIZATION_TARGET_PCT,
            proposal_ttl_secs: DEFAULT_PROPOSAL_TTL_SECS,
        }
    }
}

// ==========================================
// WorkflowConfigReader trait
// ==========================================
#[async_trait]
pub trait WorkflowConfigReader: Send + Sync {
    async fn workflow_policy(&self) -> RepositoryResult<WorkflowPolicy>;
    async fn optimizer_settings(&self) -> RepositoryResult<OptimizerSettings>;
}

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: SharedConnection,
}

impl ConfigManager {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_raw(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Upsert one configuration value.
    pub fn set(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_i64(&self, key: &str, default: i64) -> RepositoryResult<i64> {
        match self.get_raw(key)? {
            Some(raw) => raw.parse().map_err(|_| RepositoryError::CorruptValue {
                column: key.to_string(),
                message: format!("expected integer, got '{raw}'"),
            }),
            None => Ok(default),
        }
    }

    fn get_f64(&self, key: &str, default: f64) -> RepositoryResult<f64> {
        match self.get_raw(key)? {
            Some(raw) => raw.parse().map_err(|_| RepositoryError::CorruptValue {
                column: key.to_string(),
                message: format!("expected number, got '{raw}'"),
            }),
            None => Ok(default),
        }
    }
}

#[async_trait]
impl WorkflowConfigReader for ConfigManager {
    async fn workflow_policy(&self) -> RepositoryResult<WorkflowPolicy> {
        Ok(WorkflowPolicy {
            backward_window: self.get_i64("workflow.backward_window", DEFAULT_BACKWARD_WINDOW)?,
            forward_jump_limit: self
                .get_i64("workflow.forward_jump_limit", DEFAULT_FORWARD_JUMP_LIMIT)?,
        })
    }

    async fn optimizer_settings(&self) -> RepositoryResult<OptimizerSettings> {
        Ok(OptimizerSettings {
            utilization_target_pct: self.get_f64(
                "optimizer.utilization_target_pct",
                DEFAULT_UTILIZATION_TARGET_PCT,
            )?,
            proposal_ttl_secs: self
                .get_i64("optimizer.proposal_ttl_secs", DEFAULT_PROPOSAL_TTL_SECS as i64)?
                as u64,
        })
    }
}
