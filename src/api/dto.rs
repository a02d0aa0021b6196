// ==========================================
// Composite MES - API wire contracts
// ==========================================
// camelCase JSON as the scan clients and dashboard send it. Parsing into
// domain types happens here; engines never see raw payloads.
// ==========================================

use crate::domain::types::{Department, EventType, OrderStatus};
use crate::engine::ingestion::ScanIntent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Scan payload
// ==========================================
// Produced by the QR client: { "type": "ODL", "id": "...",
// "partNumber": "...", "timestamp": "..." }.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub part_number: String,
    pub timestamp: DateTime<Utc>,
}

impl ScanPayload {
    /// Only order labels ("ODL") are scannable today.
    pub fn is_order(&self) -> bool {
        self.kind == "ODL"
    }

    /// Interpret the payload as an intent for the scanner's department.
    pub fn into_intent(self, department: Department, event_type: EventType) -> ScanIntent {
        ScanIntent {
            order_number: self.id,
            department,
            event_type,
            scanned_at: self.timestamp,
        }
    }
}

// ==========================================
// Manual transition contract
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub new_status: String,
    pub reason: String,
    #[serde(default)]
    pub force_change: bool,
    #[serde(default)]
    pub bypass_workflow: bool,
}

impl TransitionRequest {
    pub fn target(&self) -> Option<OrderStatus> {
        OrderStatus::parse_wire(&self.new_status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub order_number: String,
    pub previous_status: String,
    pub new_status: String,
    pub actor: String,
    pub reason: String,
}

// ==========================================
// Batch confirmation contract
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfirmRequest {
    pub optimization_proposal_id: String,
    #[serde(default)]
    pub confirmed_batch_ids: Vec<String>,
    #[serde(default)]
    pub rejected_batch_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfirmResponse {
    pub created: usize,
    pub batch_ids: Vec<String>,
    /// Orders dropped during re-validation, with their current statuses.
    pub stale_orders: Vec<StaleOrderDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleOrderDto {
    pub order_number: String,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_payload_round_trip() {
        let json = r#"{"type":"ODL","id":"ODL-0042","partNumber":"PN-7","timestamp":"2026-08-20T08:30:00Z"}"#;
        let payload: ScanPayload = serde_json::from_str(json).unwrap();
        assert!(payload.is_order());
        assert_eq!(payload.id, "ODL-0042");
        assert_eq!(payload.part_number, "PN-7");
    }

    #[test]
    fn test_transition_request_defaults() {
        let json = r#"{"newStatus":"IN_CLEANROOM","reason":"assigned"}"#;
        let req: TransitionRequest = serde_json::from_str(json).unwrap();
        assert!(!req.force_change);
        assert!(!req.bypass_workflow);
        assert_eq!(
            req.target(),
            Some(OrderStatus::InDepartment(Department::Cleanroom))
        );
    }

    #[test]
    fn test_transition_request_unknown_status() {
        let json = r#"{"newStatus":"IN_WAREHOUSE","reason":"x"}"#;
        let req: TransitionRequest = serde_json::from_str(json).unwrap();
        assert!(req.target().is_none());
    }
}
