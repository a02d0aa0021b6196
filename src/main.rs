// ==========================================
// Composite MES - Service entry point
// ==========================================
// Opens (and if needed creates) the SQLite store, seeds reference data on
// first run, and reports readiness. Transport wiring lives with whoever
// embeds ProductionApi; this binary exists for local bring-up and smoke
// checks.
// ==========================================

use anyhow::Context;
use composite_mes::config::{ConfigManager, OptimizerSettings, WorkflowConfigReader};
use composite_mes::db;
use composite_mes::domain::batch::{Autoclave, CuringCycle};
use composite_mes::engine::session::ProposalStore;
use composite_mes::logging;
use composite_mes::repository::reference_repo::{AutoclaveRepository, CuringCycleRepository};
use composite_mes::repository::{AutoclaveLoadRepository, OrderRepository};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "composite_mes.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", composite_mes::APP_NAME, composite_mes::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    tracing::info!("database: {db_path}");

    let conn = db::open_shared(&db_path)
        .with_context(|| format!("cannot open database at {db_path}"))?;

    seed_reference_data(conn.clone())?;

    let order_count = OrderRepository::new(conn.clone()).count()?;
    let active_loads = AutoclaveLoadRepository::new(conn.clone()).list_active()?;
    tracing::info!(
        "{order_count} production order(s), {} active autoclave load(s) on record",
        active_loads.len()
    );

    let config = Arc::new(ConfigManager::new(conn.clone()));
    let settings: OptimizerSettings = config.optimizer_settings().await?;
    let proposals = Arc::new(ProposalStore::new(Duration::from_secs(
        settings.proposal_ttl_secs,
    )));
    let _api = composite_mes::ProductionApi::new(conn, config, proposals);

    tracing::info!("ready");
    Ok(())
}

/// Idempotent first-run seed for the plant's fixed equipment.
fn seed_reference_data(conn: composite_mes::db::SharedConnection) -> anyhow::Result<()> {
    let autoclaves = AutoclaveRepository::new(conn.clone());
    let cycles = CuringCycleRepository::new(conn);

    if autoclaves.list()?.is_empty() {
        autoclaves.upsert(&Autoclave {
            code: "AC1".to_string(),
            name: "Autoclave 1".to_string(),
            bed_length_mm: 3000.0,
            bed_width_mm: 1500.0,
            vacuum_lines: 4,
            active: true,
        })?;
        tracing::info!("seeded default autoclave AC1");
    }

    if cycles.list()?.is_empty() {
        cycles.upsert(&CuringCycle {
            code: "C180".to_string(),
            description: Some("180C epoxy cure".to_string()),
            temperature_c: 180.0,
            pressure_bar: 7.0,
            duration_minutes: 150,
            compatibility_key: "EPOXY_180".to_string(),
        })?;
        cycles.upsert(&CuringCycle {
            code: "C180-LONG".to_string(),
            description: Some("180C extended dwell".to_string()),
            temperature_c: 180.0,
            pressure_bar: 7.0,
            duration_minutes: 240,
            compatibility_key: "EPOXY_180".to_string(),
        })?;
        tracing::info!("seeded default curing cycles");
    }

    Ok(())
}
