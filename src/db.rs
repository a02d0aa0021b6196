// ==========================================
// Composite MES - SQLite connection bootstrap
// ==========================================
// Goals:
// - one place for Connection::open PRAGMA behavior (foreign keys on
//   every connection, shared busy_timeout)
// - embedded schema so tests and the binary build databases through the
//   exact same path
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default busy_timeout (milliseconds). Bounds every store call: a writer
/// that cannot acquire the database within this window fails the intent
/// instead of blocking indefinitely.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Shared connection handle used by repositories and engines.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Embedded schema. CREATE TABLE IF NOT EXISTS throughout, so re-running
/// against an existing database is harmless.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS production_order (
    order_number        TEXT PRIMARY KEY,
    part_number         TEXT NOT NULL,
    description         TEXT,
    quantity            INTEGER NOT NULL DEFAULT 1,
    priority            TEXT NOT NULL DEFAULT 'NORMAL',
    length_mm           REAL,
    width_mm            REAL,
    height_mm           REAL,
    curing_cycle_code   TEXT,
    vacuum_lines        INTEGER NOT NULL DEFAULT 1,
    status              TEXT NOT NULL DEFAULT 'CREATED',
    revision            INTEGER NOT NULL DEFAULT 0,
    expected_completion TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_order_status ON production_order(status);

CREATE TABLE IF NOT EXISTS production_event (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id        TEXT NOT NULL UNIQUE,
    order_number    TEXT NOT NULL REFERENCES production_order(order_number),
    department      TEXT,
    event_type      TEXT NOT NULL,
    occurred_at     TEXT NOT NULL,
    actor_id        TEXT NOT NULL,
    duration_minutes INTEGER,
    note            TEXT,
    is_automatic    INTEGER NOT NULL DEFAULT 0,
    source          TEXT NOT NULL DEFAULT 'MANUAL',
    rejected        INTEGER NOT NULL DEFAULT 0,
    idempotency_key TEXT UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_event_order ON production_event(order_number, occurred_at);

CREATE TABLE IF NOT EXISTS status_audit (
    audit_id        TEXT PRIMARY KEY,
    order_number    TEXT NOT NULL REFERENCES production_order(order_number),
    previous_status TEXT NOT NULL,
    new_status      TEXT NOT NULL,
    actor_id        TEXT NOT NULL,
    reason          TEXT NOT NULL,
    forced          INTEGER NOT NULL DEFAULT 0,
    bypassed_validation INTEGER NOT NULL DEFAULT 0,
    recorded_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_order ON status_audit(order_number, recorded_at);

CREATE TABLE IF NOT EXISTS autoclave (
    code            TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    bed_length_mm   REAL NOT NULL,
    bed_width_mm    REAL NOT NULL,
    vacuum_lines    INTEGER NOT NULL,
    active          INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS curing_cycle (
    code              TEXT PRIMARY KEY,
    description       TEXT,
    temperature_c     REAL NOT NULL,
    pressure_bar      REAL NOT NULL,
    duration_minutes  INTEGER NOT NULL,
    compatibility_key TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS autoclave_load (
    load_id           TEXT PRIMARY KEY,
    autoclave_code    TEXT NOT NULL REFERENCES autoclave(code),
    curing_cycle_code TEXT NOT NULL REFERENCES curing_cycle(code),
    status            TEXT NOT NULL DEFAULT 'DRAFT',
    planned_start     TEXT,
    planned_end       TEXT,
    actual_start      TEXT,
    actual_end        TEXT,
    utilization_pct   REAL NOT NULL DEFAULT 0,
    total_area_mm2    REAL NOT NULL DEFAULT 0,
    created_by        TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_load_status ON autoclave_load(status);

CREATE TABLE IF NOT EXISTS load_placement (
    load_id        TEXT NOT NULL REFERENCES autoclave_load(load_id),
    order_number   TEXT NOT NULL REFERENCES production_order(order_number),
    position_index INTEGER NOT NULL,
    x_mm           REAL NOT NULL,
    y_mm           REAL NOT NULL,
    length_mm      REAL NOT NULL,
    width_mm       REAL NOT NULL,
    rotated        INTEGER NOT NULL DEFAULT 0,
    vacuum_lines   INTEGER NOT NULL DEFAULT 1,
    prior_status   TEXT NOT NULL,
    PRIMARY KEY (load_id, order_number)
);

CREATE INDEX IF NOT EXISTS idx_placement_order ON load_placement(order_number);

CREATE TABLE IF NOT EXISTS config (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Apply the unified per-connection PRAGMAs.
///
/// foreign_keys and busy_timeout are both per-connection settings, so every
/// open path must come through here.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the unified configuration.
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Create all tables if missing.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Open + init + wrap in the shared handle, in one call.
pub fn open_shared(db_path: &str) -> rusqlite::Result<SharedConnection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}
