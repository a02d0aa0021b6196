// ==========================================
// Composite MES - Domain type definitions
// ==========================================
// Closed enums for the production workflow. Every status-keyed decision
// in the engines is an exhaustive match over these types, so adding a
// department or a status forces every dispatch site to be revisited.
// Wire format: SCREAMING_SNAKE_CASE (same strings stored in the database).
// ==========================================

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ==========================================
// Department
// ==========================================
// Static reference data: the physical production stages of the plant.
// The core never creates or mutates departments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    Cleanroom,
    Honeycomb,
    Autoclave,
    Cnc,
    Ndi,
    Assembly,
    Paint,
    Quality,
    Motors,
}

impl Department {
    /// All departments, in declaration order.
    pub const ALL: [Department; 9] = [
        Department::Cleanroom,
        Department::Honeycomb,
        Department::Autoclave,
        Department::Cnc,
        Department::Ndi,
        Department::Assembly,
        Department::Paint,
        Department::Quality,
        Department::Motors,
    ];

    /// Stable code used in wire statuses and database columns.
    pub fn code(&self) -> &'static str {
        match self {
            Department::Cleanroom => "CLEANROOM",
            Department::Honeycomb => "HONEYCOMB",
            Department::Autoclave => "AUTOCLAVE",
            Department::Cnc => "CNC",
            Department::Ndi => "NDI",
            Department::Assembly => "ASSEMBLY",
            Department::Paint => "PAINT",
            Department::Quality => "QUALITY",
            Department::Motors => "MOTORS",
        }
    }

    /// Parse a department code (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CLEANROOM" => Some(Department::Cleanroom),
            "HONEYCOMB" => Some(Department::Honeycomb),
            "AUTOCLAVE" => Some(Department::Autoclave),
            "CNC" => Some(Department::Cnc),
            "NDI" => Some(Department::Ndi),
            "ASSEMBLY" => Some(Department::Assembly),
            "PAINT" => Some(Department::Paint),
            "QUALITY" => Some(Department::Quality),
            "MOTORS" => Some(Department::Motors),
            _ => None,
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ==========================================
// OrderStatus
// ==========================================
// Closed status set of a production order (ODL). The wire encoding is the
// flat enum-name form consumed by scan clients and the dashboard:
//   CREATED, ASSIGNED_TO_<DEPT>, IN_<DEPT>, <DEPT>_COMPLETED,
//   ON_HOLD, COMPLETED, CANCELLED
// Invariant: the status alone determines which department, if any,
// currently holds the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Created,
    AssignedTo(Department),
    InDepartment(Department),
    DepartmentCompleted(Department),
    OnHold,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Wire / database encoding.
    pub fn wire(&self) -> String {
        match self {
            OrderStatus::Created => "CREATED".to_string(),
            OrderStatus::AssignedTo(d) => format!("ASSIGNED_TO_{}", d.code()),
            OrderStatus::InDepartment(d) => format!("IN_{}", d.code()),
            OrderStatus::DepartmentCompleted(d) => format!("{}_COMPLETED", d.code()),
            OrderStatus::OnHold => "ON_HOLD".to_string(),
            OrderStatus::Completed => "COMPLETED".to_string(),
            OrderStatus::Cancelled => "CANCELLED".to_string(),
        }
    }

    /// Parse the wire encoding back into a status.
    ///
    /// `COMPLETED` is matched before the `<DEPT>_COMPLETED` suffix rule so
    /// the terminal status never parses as a department completion.
    pub fn parse_wire(s: &str) -> Option<Self> {
        match s {
            "CREATED" => return Some(OrderStatus::Created),
            "ON_HOLD" => return Some(OrderStatus::OnHold),
            "COMPLETED" => return Some(OrderStatus::Completed),
            "CANCELLED" => return Some(OrderStatus::Cancelled),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix("ASSIGNED_TO_") {
            return Department::parse(rest).map(OrderStatus::AssignedTo);
        }
        if let Some(rest) = s.strip_prefix("IN_") {
            return Department::parse(rest).map(OrderStatus::InDepartment);
        }
        if let Some(rest) = s.strip_suffix("_COMPLETED") {
            return Department::parse(rest).map(OrderStatus::DepartmentCompleted);
        }
        None
    }

    /// Department currently holding the order, if any.
    ///
    /// Only `IN_<DEPT>` means physical custody; assigned and completed
    /// statuses leave the order between departments.
    pub fn current_department(&self) -> Option<Department> {
        match self {
            OrderStatus::InDepartment(d) => Some(*d),
            OrderStatus::Created
            | OrderStatus::AssignedTo(_)
            | OrderStatus::DepartmentCompleted(_)
            | OrderStatus::OnHold
            | OrderStatus::Completed
            | OrderStatus::Cancelled => None,
        }
    }

    /// Department the order is queued for, if any.
    pub fn assigned_department(&self) -> Option<Department> {
        match self {
            OrderStatus::AssignedTo(d) => Some(*d),
            _ => None,
        }
    }

    /// Terminal statuses never leave the state machine again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Every member of the closed status set (31 values).
    pub fn all() -> Vec<OrderStatus> {
        let mut out = vec![OrderStatus::Created];
        for d in Department::ALL {
            out.push(OrderStatus::AssignedTo(d));
            out.push(OrderStatus::InDepartment(d));
            out.push(OrderStatus::DepartmentCompleted(d));
        }
        out.push(OrderStatus::OnHold);
        out.push(OrderStatus::Completed);
        out.push(OrderStatus::Cancelled);
        out
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WireVisitor;

        impl Visitor<'_> for WireVisitor {
            type Value = OrderStatus;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an order status wire string such as IN_CLEANROOM")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<OrderStatus, E> {
                OrderStatus::parse_wire(v)
                    .ok_or_else(|| E::custom(format!("unknown order status: {v}")))
            }
        }

        deserializer.deserialize_str(WireVisitor)
    }
}

// ==========================================
// BatchStatus
// ==========================================
// Autoclave load lifecycle: strictly linear, no regression except full
// deletion while DRAFT/READY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Draft,
    Ready,
    InCure,
    Completed,
    Released,
}

impl BatchStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "DRAFT",
            BatchStatus::Ready => "READY",
            BatchStatus::InCure => "IN_CURE",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Released => "RELEASED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(BatchStatus::Draft),
            "READY" => Some(BatchStatus::Ready),
            "IN_CURE" => Some(BatchStatus::InCure),
            "COMPLETED" => Some(BatchStatus::Completed),
            "RELEASED" => Some(BatchStatus::Released),
            _ => None,
        }
    }

    /// The single legal successor in the linear lifecycle.
    pub fn next(&self) -> Option<BatchStatus> {
        match self {
            BatchStatus::Draft => Some(BatchStatus::Ready),
            BatchStatus::Ready => Some(BatchStatus::InCure),
            BatchStatus::InCure => Some(BatchStatus::Completed),
            BatchStatus::Completed => Some(BatchStatus::Released),
            BatchStatus::Released => None,
        }
    }

    /// Active loads hold a claim on their placed orders.
    pub fn is_active(&self) -> bool {
        !matches!(self, BatchStatus::Released)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// EventType
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Entry,
    Exit,
    Pause,
    Resume,
    Note,
}

impl EventType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EventType::Entry => "ENTRY",
            EventType::Exit => "EXIT",
            EventType::Pause => "PAUSE",
            EventType::Resume => "RESUME",
            EventType::Note => "NOTE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ENTRY" => Some(EventType::Entry),
            "EXIT" => Some(EventType::Exit),
            "PAUSE" => Some(EventType::Pause),
            "RESUME" => Some(EventType::Resume),
            "NOTE" => Some(EventType::Note),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// EventSource
// ==========================================
// How an event reached the system: shop-floor QR scan or dashboard action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    QrScan,
    Manual,
}

impl EventSource {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EventSource::QrScan => "QR_SCAN",
            EventSource::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QR_SCAN" => Some(EventSource::QrScan),
            "MANUAL" => Some(EventSource::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// Priority
// ==========================================
// Order of declaration matters: derived Ord is used by the optimizer
// tie-break (higher priority packs first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Some(Priority::Low),
            "NORMAL" => Some(Priority::Normal),
            "HIGH" => Some(Priority::High),
            "URGENT" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// ActorRole
// ==========================================
// Resolved upstream by the auth layer; the core only consumes the result.
// OPERATOR follows the edge set, SUPERVISOR gets the windowed overrides,
// ADMIN transitions unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Operator,
    Supervisor,
    Admin,
}

impl ActorRole {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActorRole::Operator => "OPERATOR",
            ActorRole::Supervisor => "SUPERVISOR",
            ActorRole::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "OPERATOR" => Some(ActorRole::Operator),
            "SUPERVISOR" => Some(ActorRole::Supervisor),
            "ADMIN" => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_round_trip_all() {
        let all = OrderStatus::all();
        assert_eq!(all.len(), 31);
        for status in all {
            let wire = status.wire();
            assert_eq!(OrderStatus::parse_wire(&wire), Some(status), "{wire}");
        }
    }

    #[test]
    fn test_completed_not_parsed_as_department_completion() {
        assert_eq!(
            OrderStatus::parse_wire("COMPLETED"),
            Some(OrderStatus::Completed)
        );
        assert_eq!(
            OrderStatus::parse_wire("CNC_COMPLETED"),
            Some(OrderStatus::DepartmentCompleted(Department::Cnc))
        );
    }

    #[test]
    fn test_current_department_unambiguous() {
        for status in OrderStatus::all() {
            // At most one holder, and only for IN_<DEPT>.
            match status {
                OrderStatus::InDepartment(d) => {
                    assert_eq!(status.current_department(), Some(d));
                }
                _ => assert_eq!(status.current_department(), None),
            }
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_batch_status_linear() {
        assert_eq!(BatchStatus::Draft.next(), Some(BatchStatus::Ready));
        assert_eq!(BatchStatus::Released.next(), None);
        assert!(BatchStatus::InCure.is_active());
        assert!(!BatchStatus::Released.is_active());
    }

    #[test]
    fn test_status_serde_uses_wire_form() {
        let s = serde_json::to_string(&OrderStatus::InDepartment(Department::Ndi)).unwrap();
        assert_eq!(s, "\"IN_NDI\"");
        let back: OrderStatus = serde_json::from_str("\"HONEYCOMB_COMPLETED\"").unwrap();
        assert_eq!(back, OrderStatus::DepartmentCompleted(Department::Honeycomb));
    }
}
