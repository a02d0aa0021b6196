// ==========================================
// Test environment - temp database setup
// ==========================================

use composite_mes::db::{self, SharedConnection};
use composite_mes::domain::batch::{Autoclave, CuringCycle};
use composite_mes::repository::reference_repo::{AutoclaveRepository, CuringCycleRepository};
use tempfile::NamedTempFile;

/// Temp-file SQLite database with the full schema applied. The file is
/// deleted when the env is dropped, so keep it alive for the whole test.
pub struct TestEnv {
    _db_file: NamedTempFile,
    pub conn: SharedConnection,
}

pub fn create_test_env() -> TestEnv {
    composite_mes::logging::init_test();
    let db_file = NamedTempFile::new().expect("failed to create temp db file");
    let path = db_file
        .path()
        .to_str()
        .expect("temp path not utf-8")
        .to_string();
    let conn = db::open_shared(&path).expect("failed to open test database");
    TestEnv {
        _db_file: db_file,
        conn,
    }
}

pub fn seed_autoclave(
    conn: SharedConnection,
    code: &str,
    bed_length_mm: f64,
    bed_width_mm: f64,
    vacuum_lines: i32,
) {
    AutoclaveRepository::new(conn)
        .upsert(&Autoclave {
            code: code.to_string(),
            name: format!("Autoclave {code}"),
            bed_length_mm,
            bed_width_mm,
            vacuum_lines,
            active: true,
        })
        .expect("failed to seed autoclave");
}

pub fn seed_cycle(conn: SharedConnection, code: &str, compatibility_key: &str) {
    CuringCycleRepository::new(conn)
        .upsert(&CuringCycle {
            code: code.to_string(),
            description: None,
            temperature_c: 180.0,
            pressure_bar: 7.0,
            duration_minutes: 150,
            compatibility_key: compatibility_key.to_string(),
        })
        .expect("failed to seed curing cycle");
}
