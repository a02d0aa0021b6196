// ==========================================
// Composite MES - Production routing table
// ==========================================
// Single source of truth for the department graph. Both the workflow
// state machine (distance checks, valid-next derivation) and the transfer
// coordinator (default-next lookup) consume this module, so the two can
// never disagree about the plant topology.
//
// The canonical sequence is the primary path:
//   Cleanroom -> Autoclave -> CNC -> NDI -> Assembly -> Paint -> Quality
// Branch departments are distance siblings of a primary stage:
//   Honeycomb ~ Cleanroom (both feed the autoclave)
//   Motors    ~ Assembly
// ==========================================

use crate::domain::types::{Department, OrderStatus};

/// Primary path through the plant, in production order.
pub const PRIMARY_SEQUENCE: [Department; 7] = [
    Department::Cleanroom,
    Department::Autoclave,
    Department::Cnc,
    Department::Ndi,
    Department::Assembly,
    Department::Paint,
    Department::Quality,
];

/// Stage index of a department on the primary path. Branch departments
/// share the index of their sibling stage.
pub fn stage_index(dept: Department) -> usize {
    match dept {
        Department::Cleanroom | Department::Honeycomb => 0,
        Department::Autoclave => 1,
        Department::Cnc => 2,
        Department::Ndi => 3,
        Department::Assembly | Department::Motors => 4,
        Department::Paint => 5,
        Department::Quality => 6,
    }
}

/// Deterministic default next department after leaving `dept`, used by the
/// transfer coordinator to synthesize the follow-up ENTRY. None means the
/// department is a last stage and a human performs the next transfer.
pub fn default_next(dept: Department) -> Option<Department> {
    match dept {
        Department::Cleanroom | Department::Honeycomb => Some(Department::Autoclave),
        Department::Autoclave => Some(Department::Cnc),
        Department::Cnc => Some(Department::Ndi),
        Department::Ndi | Department::Motors => Some(Department::Assembly),
        Department::Assembly => Some(Department::Paint),
        Department::Paint => Some(Department::Quality),
        Department::Quality => None,
    }
}

/// Departments that may legally follow `dept` after its completion. The
/// production graph is not strictly linear: cleanroom/honeycomb output can
/// feed the autoclave, CNC, or NDI depending on part routing.
pub fn successors(dept: Department) -> &'static [Department] {
    match dept {
        Department::Cleanroom | Department::Honeycomb => {
            &[Department::Autoclave, Department::Cnc, Department::Ndi]
        }
        Department::Autoclave => &[Department::Cnc, Department::Ndi],
        Department::Cnc => &[Department::Ndi],
        Department::Ndi | Department::Motors => &[Department::Assembly],
        Department::Assembly => &[Department::Paint],
        Department::Paint => &[Department::Quality],
        Department::Quality => &[],
    }
}

/// Topological position of a status in the canonical sequence, used by the
/// backward-window and forward-jump rules. Three positions per stage
/// (assigned, in, completed); CREATED sits before the first stage and
/// COMPLETED after the last. ON_HOLD and CANCELLED sit outside the
/// sequence and have no position.
pub fn sequence_position(status: OrderStatus) -> Option<i64> {
    match status {
        OrderStatus::Created => Some(0),
        OrderStatus::AssignedTo(d) => Some(1 + 3 * stage_index(d) as i64),
        OrderStatus::InDepartment(d) => Some(2 + 3 * stage_index(d) as i64),
        OrderStatus::DepartmentCompleted(d) => Some(3 + 3 * stage_index(d) as i64),
        OrderStatus::Completed => Some(1 + 3 * PRIMARY_SEQUENCE.len() as i64),
        OrderStatus::OnHold | OrderStatus::Cancelled => None,
    }
}

/// Edge set of the workflow graph: every status a given status may move to.
/// ON_HOLD is reachable from every non-terminal status and returns to any
/// assigned/in-department status. Derived fresh on each call; callers that
/// need it repeatedly cache the result.
pub fn valid_next(status: OrderStatus) -> Vec<OrderStatus> {
    let mut out = Vec::new();
    match status {
        OrderStatus::Created => {
            for d in Department::ALL {
                out.push(OrderStatus::AssignedTo(d));
                out.push(OrderStatus::InDepartment(d));
            }
        }
        OrderStatus::AssignedTo(d) => {
            out.push(OrderStatus::InDepartment(d));
        }
        OrderStatus::InDepartment(d) => {
            out.push(OrderStatus::DepartmentCompleted(d));
        }
        OrderStatus::DepartmentCompleted(d) => {
            for s in successors(d) {
                out.push(OrderStatus::AssignedTo(*s));
                out.push(OrderStatus::InDepartment(*s));
            }
            if d == Department::Quality {
                out.push(OrderStatus::Completed);
            }
        }
        OrderStatus::OnHold => {
            for d in Department::ALL {
                out.push(OrderStatus::AssignedTo(d));
                out.push(OrderStatus::InDepartment(d));
            }
        }
        OrderStatus::Completed | OrderStatus::Cancelled => return out,
    }
    if status != OrderStatus::OnHold {
        out.push(OrderStatus::OnHold);
    }
    out.push(OrderStatus::Cancelled);
    out
}

/// True when an order in this status may enter autoclave curing: a
/// completed department whose successors include the autoclave.
pub fn curing_eligible(status: OrderStatus) -> bool {
    match status {
        OrderStatus::DepartmentCompleted(d) => successors(d).contains(&Department::Autoclave),
        _ => false,
    }
}

/// The statuses curing_eligible accepts, for candidate queries.
pub fn curing_eligible_statuses() -> Vec<OrderStatus> {
    Department::ALL
        .into_iter()
        .map(OrderStatus::DepartmentCompleted)
        .filter(|s| curing_eligible(*s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_live_status_has_an_exit() {
        // Liveness: only the two terminals may have zero outgoing edges.
        for status in OrderStatus::all() {
            let next = valid_next(status);
            if status.is_terminal() {
                assert!(next.is_empty(), "{status} must be terminal");
            } else {
                assert!(!next.is_empty(), "{status} has no outgoing edge");
            }
        }
    }

    #[test]
    fn test_default_next_is_a_successor() {
        // The deterministic route must stay inside the legal fan-out.
        for d in Department::ALL {
            if let Some(next) = default_next(d) {
                assert!(
                    successors(d).contains(&next),
                    "default next of {d} not in successors"
                );
            }
        }
    }

    #[test]
    fn test_quality_is_last_stage() {
        assert_eq!(default_next(Department::Quality), None);
        assert!(valid_next(OrderStatus::DepartmentCompleted(Department::Quality))
            .contains(&OrderStatus::Completed));
    }

    #[test]
    fn test_branch_siblings_share_stage_index() {
        assert_eq!(
            stage_index(Department::Honeycomb),
            stage_index(Department::Cleanroom)
        );
        assert_eq!(
            stage_index(Department::Motors),
            stage_index(Department::Assembly)
        );
    }

    #[test]
    fn test_sequence_positions_monotone_along_primary_path() {
        let mut last = sequence_position(OrderStatus::Created).unwrap();
        for d in PRIMARY_SEQUENCE {
            for s in [
                OrderStatus::AssignedTo(d),
                OrderStatus::InDepartment(d),
                OrderStatus::DepartmentCompleted(d),
            ] {
                let pos = sequence_position(s).unwrap();
                assert!(pos > last, "{s} not after previous status");
                last = pos;
            }
        }
        assert!(sequence_position(OrderStatus::Completed).unwrap() > last);
    }

    #[test]
    fn test_on_hold_outside_sequence() {
        assert_eq!(sequence_position(OrderStatus::OnHold), None);
        assert_eq!(sequence_position(OrderStatus::Cancelled), None);
    }

    #[test]
    fn test_curing_eligibility() {
        assert!(curing_eligible(OrderStatus::DepartmentCompleted(
            Department::Cleanroom
        )));
        assert!(curing_eligible(OrderStatus::DepartmentCompleted(
            Department::Honeycomb
        )));
        assert!(!curing_eligible(OrderStatus::DepartmentCompleted(
            Department::Ndi
        )));
        assert!(!curing_eligible(OrderStatus::InDepartment(
            Department::Cleanroom
        )));
    }
}
