// ==========================================
// Composite MES - Order domain model
// ==========================================
// An ODL (production work order) is the unit of work tracked through the
// plant. Status is mutated exclusively through the workflow state machine;
// orders are never deleted, only closed as COMPLETED/CANCELLED.
// ==========================================

use crate::domain::types::{ActorRole, Department, OrderStatus, Priority};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Order (ODL)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Human-readable, immutable order number (primary key).
    pub order_number: String,

    // ===== Part data =====
    pub part_number: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub priority: Priority,

    // ===== Physical dimensions (mm), needed for autoclave packing =====
    pub length_mm: Option<f64>,
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,

    // ===== Curing parameters =====
    pub curing_cycle_code: Option<String>,
    /// Vacuum lines consumed when placed in an autoclave load.
    pub vacuum_lines: i32,

    // ===== Workflow state =====
    pub status: OrderStatus,
    /// Optimistic-lock revision, bumped on every status write.
    pub revision: i64,

    // ===== Dates =====
    pub expected_completion: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Department currently holding the order (derived from status).
    pub fn current_department(&self) -> Option<Department> {
        self.status.current_department()
    }

    /// Footprint area in mm², if both planar dimensions are known.
    pub fn footprint_area_mm2(&self) -> Option<f64> {
        match (self.length_mm, self.width_mm) {
            (Some(l), Some(w)) if l > 0.0 && w > 0.0 => Some(l * w),
            _ => None,
        }
    }
}

// ==========================================
// Actor
// ==========================================
// Resolved identity of whoever issued an intent. Authentication happens
// upstream; the core receives the finished decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub role: ActorRole,
    pub department: Option<Department>,
}

impl Actor {
    pub fn new(id: &str, display_name: &str, role: ActorRole) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            role,
            department: None,
        }
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
