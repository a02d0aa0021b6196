// ==========================================
// Composite MES - Autoclave load domain model
// ==========================================
// An AutoclaveLoad groups orders cured together in one autoclave cycle.
// Invariants:
// - active (non-RELEASED) loads claim pairwise-disjoint order sets
// - placed footprints stay inside the autoclave bed
// - cumulative vacuum demand stays within the autoclave's line count
// - all placed orders share a compatible curing cycle
// ==========================================

use crate::domain::types::{BatchStatus, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Autoclave - reference data
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autoclave {
    pub code: String,
    pub name: String,
    /// Usable bed, millimetres.
    pub bed_length_mm: f64,
    pub bed_width_mm: f64,
    pub vacuum_lines: i32,
    pub active: bool,
}

impl Autoclave {
    pub fn usable_area_mm2(&self) -> f64 {
        self.bed_length_mm * self.bed_width_mm
    }
}

// ==========================================
// CuringCycle - reference data
// ==========================================
// Orders may share a load only when their cycles carry the same
// compatibility key (identical thermal profile family).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuringCycle {
    pub code: String,
    pub description: Option<String>,
    pub temperature_c: f64,
    pub pressure_bar: f64,
    pub duration_minutes: i64,
    pub compatibility_key: String,
}

// ==========================================
// LoadPlacement
// ==========================================
// One order placed inside a load's bed footprint. prior_status is the
// order's status immediately before batch assignment; deletion while
// DRAFT/READY restores it verbatim (tracked, never re-derived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadPlacement {
    pub load_id: String,
    pub order_number: String,
    pub position_index: i32,
    pub x_mm: f64,
    pub y_mm: f64,
    pub length_mm: f64,
    pub width_mm: f64,
    pub rotated: bool,
    pub vacuum_lines: i32,
    pub prior_status: OrderStatus,
}

// ==========================================
// AutoclaveLoad (Batch)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoclaveLoad {
    pub load_id: String,
    pub autoclave_code: String,
    pub curing_cycle_code: String,
    pub status: BatchStatus,
    pub planned_start: Option<DateTime<Utc>>,
    pub planned_end: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub utilization_pct: f64,
    pub total_area_mm2: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AutoclaveLoad {
    pub fn new_draft(
        autoclave_code: &str,
        curing_cycle_code: &str,
        utilization_pct: f64,
        total_area_mm2: f64,
        created_by: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            load_id: Uuid::new_v4().to_string(),
            autoclave_code: autoclave_code.to_string(),
            curing_cycle_code: curing_cycle_code.to_string(),
            status: BatchStatus::Draft,
            planned_start: None,
            planned_end: None,
            actual_start: None,
            actual_end: None,
            utilization_pct,
            total_area_mm2,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
