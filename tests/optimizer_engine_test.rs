// ==========================================
// Batch optimizer - integration tests
// ==========================================

mod helpers;

use composite_mes::domain::types::{Department, OrderStatus, Priority};
use composite_mes::engine::optimizer::{BatchOptimizer, PlacementRejection};
use composite_mes::repository::{
    AutoclaveRepository, CuringCycleRepository, OrderRepository,
};
use helpers::mock_config::FixedConfig;
use helpers::test_data_builder::OrderBuilder;
use helpers::test_env::{create_test_env, seed_autoclave, seed_cycle};
use std::sync::Arc;

fn optimizer(
    conn: composite_mes::db::SharedConnection,
) -> BatchOptimizer<FixedConfig> {
    BatchOptimizer::new(
        Arc::new(OrderRepository::new(conn.clone())),
        Arc::new(AutoclaveRepository::new(conn.clone())),
        Arc::new(CuringCycleRepository::new(conn)),
        Arc::new(FixedConfig::standard()),
    )
}

fn eligible() -> OrderStatus {
    OrderStatus::DepartmentCompleted(Department::Cleanroom)
}

#[tokio::test]
async fn test_vacuum_lines_bound_packing() {
    // 4 vacuum lines, 3000x1500 bed; orders needing 2, 2 and 1 lines with
    // fitting footprints. The third would push the total to 5 > 4 and is
    // reported unplaced.
    let env = create_test_env();
    seed_autoclave(env.conn.clone(), "AC1", 3000.0, 1500.0, 4);
    seed_cycle(env.conn.clone(), "C180", "EPOXY_180");

    // Equal areas, so the area-desc sort falls back to order number.
    for (n, lines) in [("ODL-2001", 2), ("ODL-2002", 2), ("ODL-2003", 1)] {
        OrderBuilder::new(n)
            .status(eligible())
            .dimensions(1000.0, 800.0)
            .curing_cycle("C180")
            .vacuum_lines(lines)
            .insert(env.conn.clone());
    }

    let proposal = optimizer(env.conn).propose("AC1", "C180").await.unwrap();

    assert_eq!(proposal.placements.len(), 2);
    assert_eq!(proposal.placements[0].order_number, "ODL-2001");
    assert_eq!(proposal.placements[1].order_number, "ODL-2002");

    assert_eq!(proposal.unplaced.len(), 1);
    assert_eq!(proposal.unplaced[0].order_number, "ODL-2003");
    match &proposal.unplaced[0].reason {
        PlacementRejection::VacuumLinesExhausted {
            requested,
            remaining,
        } => {
            assert_eq!(*requested, 1);
            assert_eq!(*remaining, 0);
        }
        other => panic!("expected VacuumLinesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_deterministic_output() {
    let env = create_test_env();
    seed_autoclave(env.conn.clone(), "AC1", 3000.0, 1500.0, 8);
    seed_cycle(env.conn.clone(), "C180", "EPOXY_180");

    for (n, l, w, p) in [
        ("ODL-2101", 1200.0, 600.0, Priority::Normal),
        ("ODL-2102", 900.0, 800.0, Priority::Urgent),
        ("ODL-2103", 1200.0, 600.0, Priority::High),
        ("ODL-2104", 500.0, 400.0, Priority::Low),
    ] {
        OrderBuilder::new(n)
            .status(eligible())
            .dimensions(l, w)
            .curing_cycle("C180")
            .priority(p)
            .insert(env.conn.clone());
    }

    let opt = optimizer(env.conn);
    let first = opt.propose("AC1", "C180").await.unwrap();
    let second = opt.propose("AC1", "C180").await.unwrap();

    let layout = |p: &composite_mes::engine::optimizer::BatchProposal| {
        p.placements
            .iter()
            .map(|pl| {
                (
                    pl.order_number.clone(),
                    pl.x_mm as i64,
                    pl.y_mm as i64,
                    pl.rotated,
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(layout(&first), layout(&second));
    assert_eq!(first.utilization_pct, second.utilization_pct);

    // Equal-area tie between 2101 and 2103 resolves by priority.
    let pos_2103 = first
        .placements
        .iter()
        .position(|p| p.order_number == "ODL-2103")
        .unwrap();
    let pos_2101 = first
        .placements
        .iter()
        .position(|p| p.order_number == "ODL-2101")
        .unwrap();
    assert!(pos_2103 < pos_2101);
}

#[tokio::test]
async fn test_incompatible_and_dimensionless_orders_reported() {
    let env = create_test_env();
    seed_autoclave(env.conn.clone(), "AC1", 3000.0, 1500.0, 8);
    seed_cycle(env.conn.clone(), "C180", "EPOXY_180");
    seed_cycle(env.conn.clone(), "C180-LONG", "EPOXY_180");
    seed_cycle(env.conn.clone(), "C120", "EPOXY_120");

    OrderBuilder::new("ODL-2201")
        .status(eligible())
        .dimensions(1000.0, 800.0)
        .curing_cycle("C180-LONG") // same compatibility key, placeable
        .insert(env.conn.clone());
    OrderBuilder::new("ODL-2202")
        .status(eligible())
        .dimensions(1000.0, 800.0)
        .curing_cycle("C120") // different key
        .insert(env.conn.clone());
    OrderBuilder::new("ODL-2203")
        .status(eligible())
        .curing_cycle("C180") // no dimensions on record
        .insert(env.conn.clone());
    OrderBuilder::new("ODL-2204")
        .status(eligible())
        .dimensions(1000.0, 800.0)
        // no curing cycle at all
        .insert(env.conn.clone());

    let proposal = optimizer(env.conn).propose("AC1", "C180").await.unwrap();

    assert_eq!(proposal.placements.len(), 1);
    assert_eq!(proposal.placements[0].order_number, "ODL-2201");

    let reason_of = |n: &str| {
        proposal
            .unplaced
            .iter()
            .find(|u| u.order_number == n)
            .map(|u| u.reason.clone())
            .unwrap()
    };
    assert!(matches!(
        reason_of("ODL-2202"),
        PlacementRejection::IncompatibleCuringCycle { .. }
    ));
    assert!(matches!(
        reason_of("ODL-2203"),
        PlacementRejection::MissingDimensions
    ));
    assert!(matches!(
        reason_of("ODL-2204"),
        PlacementRejection::IncompatibleCuringCycle { order_cycle: None }
    ));
}

#[tokio::test]
async fn test_footprint_rejection_and_rotation() {
    let env = create_test_env();
    seed_autoclave(env.conn.clone(), "AC1", 3000.0, 1000.0, 8);
    seed_cycle(env.conn.clone(), "C180", "EPOXY_180");

    // Fits only rotated: 1200mm exceeds the 1000mm bed width.
    OrderBuilder::new("ODL-2301")
        .status(eligible())
        .dimensions(800.0, 1200.0)
        .curing_cycle("C180")
        .insert(env.conn.clone());
    // Exceeds the bed in any orientation.
    OrderBuilder::new("ODL-2302")
        .status(eligible())
        .dimensions(3500.0, 1200.0)
        .curing_cycle("C180")
        .insert(env.conn.clone());

    let proposal = optimizer(env.conn).propose("AC1", "C180").await.unwrap();

    assert_eq!(proposal.placements.len(), 1);
    assert!(proposal.placements[0].rotated);
    assert_eq!(proposal.unplaced.len(), 1);
    assert!(matches!(
        proposal.unplaced[0].reason,
        PlacementRejection::ExceedsFootprint
    ));
}

#[tokio::test]
async fn test_only_curing_eligible_statuses_considered() {
    let env = create_test_env();
    seed_autoclave(env.conn.clone(), "AC1", 3000.0, 1500.0, 8);
    seed_cycle(env.conn.clone(), "C180", "EPOXY_180");

    OrderBuilder::new("ODL-2401")
        .status(eligible())
        .dimensions(1000.0, 800.0)
        .curing_cycle("C180")
        .insert(env.conn.clone());
    // Still in the cleanroom, not a candidate.
    OrderBuilder::new("ODL-2402")
        .status(OrderStatus::InDepartment(Department::Cleanroom))
        .dimensions(1000.0, 800.0)
        .curing_cycle("C180")
        .insert(env.conn.clone());
    // Already past the autoclave.
    OrderBuilder::new("ODL-2403")
        .status(OrderStatus::DepartmentCompleted(Department::Cnc))
        .dimensions(1000.0, 800.0)
        .curing_cycle("C180")
        .insert(env.conn.clone());

    let proposal = optimizer(env.conn).propose("AC1", "C180").await.unwrap();
    assert_eq!(proposal.placements.len(), 1);
    assert_eq!(proposal.placements[0].order_number, "ODL-2401");
    assert!(proposal.unplaced.is_empty());
}
