// ==========================================
// Department transfer coordinator - integration tests
// ==========================================

mod helpers;

use chrono::Utc;
use composite_mes::domain::types::{Department, EventType, OrderStatus};
use composite_mes::engine::transfer::{
    DepartmentTransferCoordinator, ScanEvent, TransferOutcome,
};
use composite_mes::engine::workflow::{TransitionCommand, WorkflowStateMachine};
use composite_mes::engine::EngineError;
use composite_mes::repository::{OrderRepository, ProductionEventRepository};
use helpers::mock_config::FixedConfig;
use helpers::test_data_builder::{operator, supervisor, OrderBuilder};
use helpers::test_env::create_test_env;
use std::sync::Arc;

#[tokio::test]
async fn test_forward_flow_exit_scan_enters_default_next() {
    // CREATED -> manual assign to Cleanroom -> scan EXIT -> IN_AUTOCLAVE,
    // with exactly two automatic events (EXIT Cleanroom, ENTRY Autoclave).
    let env = create_test_env();
    OrderBuilder::new("ODL-1001").insert(env.conn.clone());

    let workflow = WorkflowStateMachine::new(env.conn.clone(), Arc::new(FixedConfig::standard()));
    let assign = TransitionCommand::manual(
        OrderStatus::InDepartment(Department::Cleanroom),
        supervisor(),
        "lamination started",
    );
    workflow.transition("ODL-1001", &assign).await.unwrap();

    let coordinator = DepartmentTransferCoordinator::new(env.conn.clone());
    let scan = ScanEvent::exit("ODL-1001", Department::Cleanroom, Utc::now());
    let outcome = coordinator.handle_exit(&scan, &operator()).unwrap();

    match outcome {
        TransferOutcome::Exited {
            from,
            entered,
            new_status,
        } => {
            assert_eq!(from, Department::Cleanroom);
            assert_eq!(entered, Some(Department::Autoclave));
            assert_eq!(new_status, OrderStatus::InDepartment(Department::Autoclave));
        }
        other => panic!("expected Exited, got {other:?}"),
    }

    let order = OrderRepository::new(env.conn.clone())
        .find("ODL-1001")
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::InDepartment(Department::Autoclave));

    let events = ProductionEventRepository::new(env.conn)
        .list_by_order("ODL-1001")
        .unwrap();
    // One manual assignment note plus the scan pair.
    let scan_events: Vec<_> = events
        .iter()
        .filter(|e| e.event_type != EventType::Note)
        .collect();
    assert_eq!(scan_events.len(), 2);
    assert_eq!(scan_events[0].event_type, EventType::Exit);
    assert_eq!(scan_events[0].department, Some(Department::Cleanroom));
    assert!(scan_events[0].is_automatic);
    assert_eq!(scan_events[1].event_type, EventType::Entry);
    assert_eq!(scan_events[1].department, Some(Department::Autoclave));
    assert!(scan_events[1].is_automatic);
}

#[test]
fn test_exit_from_last_department_has_no_entry() {
    let env = create_test_env();
    OrderBuilder::new("ODL-1002")
        .status(OrderStatus::InDepartment(Department::Quality))
        .insert(env.conn.clone());

    let coordinator = DepartmentTransferCoordinator::new(env.conn.clone());
    let scan = ScanEvent::exit("ODL-1002", Department::Quality, Utc::now());
    let outcome = coordinator.handle_exit(&scan, &operator()).unwrap();

    match outcome {
        TransferOutcome::Exited {
            entered, new_status, ..
        } => {
            assert_eq!(entered, None);
            assert_eq!(
                new_status,
                OrderStatus::DepartmentCompleted(Department::Quality)
            );
        }
        other => panic!("expected Exited, got {other:?}"),
    }
}

#[test]
fn test_mismatched_exit_logged_and_rejected() {
    let env = create_test_env();
    OrderBuilder::new("ODL-1003")
        .status(OrderStatus::InDepartment(Department::Cnc))
        .insert(env.conn.clone());

    let coordinator = DepartmentTransferCoordinator::new(env.conn.clone());
    let scan = ScanEvent::exit("ODL-1003", Department::Paint, Utc::now());
    let err = coordinator.handle_exit(&scan, &operator()).unwrap_err();

    match err {
        EngineError::DepartmentMismatch {
            expected, scanned, ..
        } => {
            assert_eq!(expected, Some(Department::Cnc));
            assert_eq!(scanned, Department::Paint);
        }
        other => panic!("expected DepartmentMismatch, got {other:?}"),
    }

    // No state change, but the attempt is on the record.
    let order = OrderRepository::new(env.conn.clone())
        .find("ODL-1003")
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::InDepartment(Department::Cnc));
    assert_eq!(order.revision, 0);

    let events = ProductionEventRepository::new(env.conn)
        .list_by_order("ODL-1003")
        .unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].rejected);
}

#[test]
fn test_duplicate_idempotency_key_is_noop_success() {
    let env = create_test_env();
    OrderBuilder::new("ODL-1004")
        .status(OrderStatus::InDepartment(Department::Cleanroom))
        .insert(env.conn.clone());

    let coordinator = DepartmentTransferCoordinator::new(env.conn.clone());
    let ts = Utc::now();
    let scan = ScanEvent::exit("ODL-1004", Department::Cleanroom, ts)
        .with_idempotency_key("ODL-1004:EXIT:1724500000000");

    let first = coordinator.handle_exit(&scan, &operator()).unwrap();
    assert!(matches!(first, TransferOutcome::Exited { .. }));

    let second = coordinator.handle_exit(&scan, &operator()).unwrap();
    assert!(matches!(second, TransferOutcome::Duplicate));

    // One status change and one scan pair, not two.
    let order = OrderRepository::new(env.conn.clone())
        .find("ODL-1004")
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::InDepartment(Department::Autoclave));
    assert_eq!(order.revision, 2);
    assert_eq!(
        ProductionEventRepository::new(env.conn)
            .count_by_order("ODL-1004")
            .unwrap(),
        2
    );
}

#[test]
fn test_entry_scan_into_assigned_department() {
    let env = create_test_env();
    OrderBuilder::new("ODL-1005")
        .status(OrderStatus::AssignedTo(Department::Ndi))
        .insert(env.conn.clone());

    let coordinator = DepartmentTransferCoordinator::new(env.conn.clone());
    let scan = ScanEvent::entry("ODL-1005", Department::Ndi, Utc::now());
    let outcome = coordinator.handle_entry(&scan, &operator()).unwrap();
    assert!(matches!(
        outcome,
        TransferOutcome::Entered {
            department: Department::Ndi,
            ..
        }
    ));

    let order = OrderRepository::new(env.conn)
        .find("ODL-1005")
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::InDepartment(Department::Ndi));
}

#[test]
fn test_entry_scan_into_wrong_department_rejected() {
    let env = create_test_env();
    OrderBuilder::new("ODL-1006")
        .status(OrderStatus::AssignedTo(Department::Ndi))
        .insert(env.conn.clone());

    let coordinator = DepartmentTransferCoordinator::new(env.conn.clone());
    let scan = ScanEvent::entry("ODL-1006", Department::Paint, Utc::now());
    assert!(matches!(
        coordinator.handle_entry(&scan, &operator()),
        Err(EngineError::DepartmentMismatch { .. })
    ));
}

#[test]
fn test_honeycomb_exit_routes_to_autoclave() {
    // Honeycomb is a stage-0 sibling of Cleanroom and shares its routing.
    let env = create_test_env();
    OrderBuilder::new("ODL-1007")
        .status(OrderStatus::InDepartment(Department::Honeycomb))
        .insert(env.conn.clone());

    let coordinator = DepartmentTransferCoordinator::new(env.conn.clone());
    let scan = ScanEvent::exit("ODL-1007", Department::Honeycomb, Utc::now());
    match coordinator.handle_exit(&scan, &operator()).unwrap() {
        TransferOutcome::Exited { entered, .. } => {
            assert_eq!(entered, Some(Department::Autoclave));
        }
        other => panic!("expected Exited, got {other:?}"),
    }
}
