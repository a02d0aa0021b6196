// ==========================================
// Test data builders
// ==========================================

use chrono::Utc;
use composite_mes::db::SharedConnection;
use composite_mes::domain::order::{Actor, Order};
use composite_mes::domain::types::{ActorRole, OrderStatus, Priority};
use composite_mes::repository::OrderRepository;

// ==========================================
// Order builder
// ==========================================

pub struct OrderBuilder {
    order_number: String,
    part_number: String,
    quantity: i32,
    priority: Priority,
    length_mm: Option<f64>,
    width_mm: Option<f64>,
    curing_cycle_code: Option<String>,
    vacuum_lines: i32,
    status: OrderStatus,
}

impl OrderBuilder {
    pub fn new(order_number: &str) -> Self {
        Self {
            order_number: order_number.to_string(),
            part_number: "PN-100".to_string(),
            quantity: 1,
            priority: Priority::Normal,
            length_mm: None,
            width_mm: None,
            curing_cycle_code: None,
            vacuum_lines: 1,
            status: OrderStatus::Created,
        }
    }

    pub fn part_number(mut self, pn: &str) -> Self {
        self.part_number = pn.to_string();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn dimensions(mut self, length_mm: f64, width_mm: f64) -> Self {
        self.length_mm = Some(length_mm);
        self.width_mm = Some(width_mm);
        self
    }

    pub fn curing_cycle(mut self, code: &str) -> Self {
        self.curing_cycle_code = Some(code.to_string());
        self
    }

    pub fn vacuum_lines(mut self, lines: i32) -> Self {
        self.vacuum_lines = lines;
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Order {
        let now = Utc::now();
        Order {
            order_number: self.order_number,
            part_number: self.part_number,
            description: None,
            quantity: self.quantity,
            priority: self.priority,
            length_mm: self.length_mm,
            width_mm: self.width_mm,
            height_mm: None,
            curing_cycle_code: self.curing_cycle_code,
            vacuum_lines: self.vacuum_lines,
            status: self.status,
            revision: 0,
            expected_completion: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build and persist in one step.
    pub fn insert(self, conn: SharedConnection) -> Order {
        let order = self.build();
        OrderRepository::new(conn)
            .insert(&order)
            .expect("failed to insert test order");
        order
    }
}

// ==========================================
// Actors
// ==========================================

pub fn operator() -> Actor {
    Actor::new("op-1", "Line Operator", ActorRole::Operator)
}

pub fn supervisor() -> Actor {
    Actor::new("sup-1", "Shift Supervisor", ActorRole::Supervisor)
}

pub fn admin() -> Actor {
    Actor::new("adm-1", "Plant Admin", ActorRole::Admin)
}
