// ==========================================
// Production API - end-to-end tests
// ==========================================

mod helpers;

use chrono::Utc;
use composite_mes::api::dto::{BatchConfirmRequest, ScanPayload, TransitionRequest};
use composite_mes::api::error::ApiError;
use composite_mes::api::ProductionApi;
use composite_mes::domain::types::{Department, EventType, OrderStatus};
use composite_mes::engine::session::ProposalStore;
use composite_mes::engine::transfer::TransferOutcome;
use composite_mes::repository::OrderRepository;
use helpers::mock_config::FixedConfig;
use helpers::test_data_builder::{operator, supervisor, OrderBuilder};
use helpers::test_env::{create_test_env, seed_autoclave, seed_cycle};
use std::sync::Arc;
use std::time::Duration;

fn api(conn: composite_mes::db::SharedConnection) -> ProductionApi<FixedConfig> {
    ProductionApi::new(
        conn,
        Arc::new(FixedConfig::standard()),
        Arc::new(ProposalStore::new(Duration::from_secs(60))),
    )
}

fn payload(order: &str) -> ScanPayload {
    ScanPayload {
        kind: "ODL".to_string(),
        id: order.to_string(),
        part_number: "PN-100".to_string(),
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn test_change_status_round_trip() {
    let env = create_test_env();
    OrderBuilder::new("ODL-6001").insert(env.conn.clone());

    let api = api(env.conn.clone());
    let request = TransitionRequest {
        new_status: "IN_CLEANROOM".to_string(),
        reason: "lamination started".to_string(),
        force_change: false,
        bypass_workflow: false,
    };
    let response = api
        .change_status("ODL-6001", &request, &supervisor())
        .await
        .unwrap();
    assert_eq!(response.previous_status, "CREATED");
    assert_eq!(response.new_status, "IN_CLEANROOM");
    assert_eq!(response.reason, "lamination started");

    let next = api.valid_next_statuses("ODL-6001").unwrap();
    assert!(next.contains(&"CLEANROOM_COMPLETED".to_string()));
}

#[tokio::test]
async fn test_change_status_invalid_target_reports_valid_next() {
    let env = create_test_env();
    OrderBuilder::new("ODL-6002")
        .status(OrderStatus::DepartmentCompleted(Department::Ndi))
        .insert(env.conn.clone());

    let api = api(env.conn);
    let request = TransitionRequest {
        new_status: "IN_CLEANROOM".to_string(),
        reason: "rework".to_string(),
        force_change: false,
        bypass_workflow: false,
    };
    match api
        .change_status("ODL-6002", &request, &supervisor())
        .await
        .unwrap_err()
    {
        ApiError::InvalidTransition { valid_next, .. } => {
            assert!(valid_next.contains(&"IN_ASSEMBLY".to_string()));
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scan_through_api() {
    let env = create_test_env();
    OrderBuilder::new("ODL-6003")
        .status(OrderStatus::InDepartment(Department::Cleanroom))
        .insert(env.conn.clone());

    let api = api(env.conn.clone());
    // Same client timestamp both times, as a network retry would resend it.
    let scanned = payload("ODL-6003");
    let outcome = api
        .handle_scan(
            scanned.clone(),
            Department::Cleanroom,
            EventType::Exit,
            &operator(),
        )
        .unwrap();
    assert!(matches!(outcome, TransferOutcome::Exited { .. }));

    let again = api
        .handle_scan(scanned, Department::Cleanroom, EventType::Exit, &operator())
        .unwrap();
    assert!(matches!(again, TransferOutcome::Duplicate));
}

#[tokio::test]
async fn test_unsupported_label_refused() {
    let env = create_test_env();
    let api = api(env.conn);
    let mut p = payload("TOOL-1");
    p.kind = "TOOL".to_string();
    assert!(matches!(
        api.handle_scan(p, Department::Cleanroom, EventType::Entry, &operator()),
        Err(ApiError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_propose_and_confirm_consumes_session() {
    let env = create_test_env();
    seed_autoclave(env.conn.clone(), "AC1", 3000.0, 1500.0, 8);
    seed_cycle(env.conn.clone(), "C180", "EPOXY_180");
    for n in ["ODL-6101", "ODL-6102"] {
        OrderBuilder::new(n)
            .status(OrderStatus::DepartmentCompleted(Department::Cleanroom))
            .dimensions(900.0, 700.0)
            .curing_cycle("C180")
            .insert(env.conn.clone());
    }

    let api = api(env.conn.clone());
    let (session_id, proposal) = api.propose_batch("AC1", "C180").await.unwrap();
    assert_eq!(proposal.placements.len(), 2);

    let request = BatchConfirmRequest {
        optimization_proposal_id: session_id.clone(),
        confirmed_batch_ids: vec![proposal.proposal_id.clone()],
        rejected_batch_ids: vec![],
    };
    let response = api.confirm_batches(&request, &supervisor()).unwrap();
    assert_eq!(response.created, 1);
    assert_eq!(response.batch_ids.len(), 1);
    assert!(response.stale_orders.is_empty());

    let order = OrderRepository::new(env.conn)
        .find("ODL-6101")
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::AssignedTo(Department::Autoclave));

    // The session was consumed on confirmation.
    assert!(matches!(
        api.confirm_batches(&request, &supervisor()),
        Err(ApiError::ProposalExpired(_))
    ));
}

#[tokio::test]
async fn test_rejected_proposal_creates_nothing() {
    let env = create_test_env();
    seed_autoclave(env.conn.clone(), "AC1", 3000.0, 1500.0, 8);
    seed_cycle(env.conn.clone(), "C180", "EPOXY_180");
    OrderBuilder::new("ODL-6201")
        .status(OrderStatus::DepartmentCompleted(Department::Cleanroom))
        .dimensions(900.0, 700.0)
        .curing_cycle("C180")
        .insert(env.conn.clone());

    let api = api(env.conn.clone());
    let (session_id, proposal) = api.propose_batch("AC1", "C180").await.unwrap();

    let request = BatchConfirmRequest {
        optimization_proposal_id: session_id,
        confirmed_batch_ids: vec![],
        rejected_batch_ids: vec![proposal.proposal_id],
    };
    let response = api.confirm_batches(&request, &supervisor()).unwrap();
    assert_eq!(response.created, 0);

    let order = OrderRepository::new(env.conn)
        .find("ODL-6201")
        .unwrap()
        .unwrap();
    assert_eq!(
        order.status,
        OrderStatus::DepartmentCompleted(Department::Cleanroom)
    );
}
