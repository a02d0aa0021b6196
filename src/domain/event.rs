// ==========================================
// Composite MES - Production events and audit records
// ==========================================
// ProductionEvent is an immutable fact: the event log is append-only and
// the repository exposes no update or delete. Ordering is established by
// occurred_at plus the insertion sequence as tie-break.
// ==========================================

use crate::domain::types::{Department, EventSource, EventType, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// ProductionEvent
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionEvent {
    pub event_id: String,
    pub order_number: String,
    pub department: Option<Department>,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: String,
    /// Minutes spent in the department, when the client reports it.
    pub duration_minutes: Option<i64>,
    pub note: Option<String>,
    /// System-generated (coordinator/cascade) vs. human-triggered.
    pub is_automatic: bool,
    pub source: EventSource,
    /// Set for scans that were refused (e.g. department mismatch); the
    /// attempt is still kept for audit.
    pub rejected: bool,
    /// Client-generated replay-dedup key; unique among applied events.
    pub idempotency_key: Option<String>,
    /// Insertion sequence assigned by the store; 0 until persisted.
    #[serde(default)]
    pub seq: i64,
}

impl ProductionEvent {
    pub fn new(
        order_number: &str,
        department: Option<Department>,
        event_type: EventType,
        actor_id: &str,
        source: EventSource,
        is_automatic: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            order_number: order_number.to_string(),
            department,
            event_type,
            occurred_at: Utc::now(),
            actor_id: actor_id.to_string(),
            duration_minutes: None,
            note: None,
            is_automatic,
            source,
            rejected: false,
            idempotency_key: None,
            seq: 0,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn with_occurred_at(mut self, ts: DateTime<Utc>) -> Self {
        self.occurred_at = ts;
        self
    }

    pub fn with_idempotency_key(mut self, key: &str) -> Self {
        self.idempotency_key = Some(key.to_string());
        self
    }

    pub fn rejected_attempt(mut self, note: &str) -> Self {
        self.rejected = true;
        self.note = Some(note.to_string());
        self
    }
}

// ==========================================
// StatusAuditRecord
// ==========================================
// One row per accepted transition, written in the same transaction as the
// status update and the production event. Carries enough context to render
// the audit trail without replaying events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusAuditRecord {
    pub audit_id: String,
    pub order_number: String,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub actor_id: String,
    pub reason: String,
    pub forced: bool,
    pub bypassed_validation: bool,
    pub recorded_at: DateTime<Utc>,
}

impl StatusAuditRecord {
    pub fn new(
        order_number: &str,
        previous_status: OrderStatus,
        new_status: OrderStatus,
        actor_id: &str,
        reason: &str,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4().to_string(),
            order_number: order_number.to_string(),
            previous_status,
            new_status,
            actor_id: actor_id.to_string(),
            reason: reason.to_string(),
            forced: false,
            bypassed_validation: false,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_flags(mut self, forced: bool, bypassed_validation: bool) -> Self {
        self.forced = forced;
        self.bypassed_validation = bypassed_validation;
        self
    }
}
