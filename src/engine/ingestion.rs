// ==========================================
// Composite MES - Offline scan ingestion
// ==========================================
// Scan clients buffer intents while disconnected and replay them on
// reconnect, in original order. Replay is sequential per client and
// idempotent: an intent whose client-generated key was already applied is
// a no-op success, and one failing intent never aborts the rest of the
// batch. Each applied intent runs in its own transaction, so a replay can
// interleave with live scanners without double-applying anything.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::order::Actor;
use crate::domain::types::{Department, EventType};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::transfer::{DepartmentTransferCoordinator, ScanEvent, TransferOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

// ==========================================
// ScanIntent
// ==========================================
// One buffered scan as the client recorded it. The idempotency key is
// derived client-side from order + event type + client timestamp, so a
// resend after a network retry or client restart carries the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIntent {
    pub order_number: String,
    pub department: Department,
    pub event_type: EventType,
    pub scanned_at: DateTime<Utc>,
}

impl ScanIntent {
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.order_number,
            self.event_type,
            self.scanned_at.timestamp_millis()
        )
    }
}

// ==========================================
// Replay outcomes
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IntentOutcome {
    Applied(TransferOutcome),
    /// Already applied under the same key; accepted, nothing changed.
    Duplicate,
    /// Refused with the rendered engine error; replay continues.
    Rejected { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub order_number: String,
    pub event_type: EventType,
    pub outcome: IntentOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub client_id: String,
    pub applied: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub results: Vec<ReplayResult>,
}

// ==========================================
// OfflineIngestionQueue
// ==========================================

pub struct OfflineIngestionQueue {
    transfers: DepartmentTransferCoordinator,
}

impl OfflineIngestionQueue {
    pub fn new(conn: SharedConnection) -> Self {
        Self {
            transfers: DepartmentTransferCoordinator::new(conn),
        }
    }

    /// Replay a client's buffered intents in the order they were captured.
    /// Never fail-fast: every intent gets an individual outcome.
    #[instrument(skip(self, intents, actor), fields(client_id = %client_id, count = intents.len()))]
    pub fn replay(
        &self,
        client_id: &str,
        intents: &[ScanIntent],
        actor: &Actor,
    ) -> EngineResult<ReplaySummary> {
        let mut summary = ReplaySummary {
            client_id: client_id.to_string(),
            applied: 0,
            duplicates: 0,
            rejected: 0,
            results: Vec::with_capacity(intents.len()),
        };

        for intent in intents {
            let outcome = match self.apply_one(intent, actor) {
                Ok(TransferOutcome::Duplicate) => {
                    summary.duplicates += 1;
                    IntentOutcome::Duplicate
                }
                Ok(applied) => {
                    summary.applied += 1;
                    IntentOutcome::Applied(applied)
                }
                Err(e) => {
                    warn!(
                        order_number = %intent.order_number,
                        error = %e,
                        "replayed intent rejected"
                    );
                    summary.rejected += 1;
                    IntentOutcome::Rejected {
                        error: e.to_string(),
                    }
                }
            };
            summary.results.push(ReplayResult {
                order_number: intent.order_number.clone(),
                event_type: intent.event_type,
                outcome,
            });
        }

        info!(
            applied = summary.applied,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            "replay finished"
        );
        Ok(summary)
    }

    fn apply_one(&self, intent: &ScanIntent, actor: &Actor) -> EngineResult<TransferOutcome> {
        let scan = ScanEvent {
            order_number: intent.order_number.clone(),
            department: intent.department,
            event_type: intent.event_type,
            scanned_at: intent.scanned_at,
            idempotency_key: Some(intent.idempotency_key()),
        };
        match intent.event_type {
            EventType::Exit => self.transfers.handle_exit(&scan, actor),
            EventType::Entry => self.transfers.handle_entry(&scan, actor),
            other => Err(EngineError::InvalidIntent {
                order_number: intent.order_number.clone(),
                detail: format!("scan replay only accepts ENTRY/EXIT, got {other}"),
            }),
        }
    }
}
