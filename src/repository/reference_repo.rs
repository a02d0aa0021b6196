// ==========================================
// Composite MES - Reference data repositories
// ==========================================
// Autoclaves and curing cycles are static reference data: seeded at
// install time, read by the optimizer. The core never mutates them at
// runtime, so the write surface is upsert-for-seeding only.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::batch::{Autoclave, CuringCycle};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::MutexGuard;

// ==========================================
// AutoclaveRepository
// ==========================================

pub struct AutoclaveRepository {
    conn: SharedConnection,
}

impl AutoclaveRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Autoclave> {
        Ok(Autoclave {
            code: row.get("code")?,
            name: row.get("name")?,
            bed_length_mm: row.get("bed_length_mm")?,
            bed_width_mm: row.get("bed_width_mm")?,
            vacuum_lines: row.get("vacuum_lines")?,
            active: row.get("active")?,
        })
    }

    pub fn upsert(&self, autoclave: &Autoclave) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO autoclave (code, name, bed_length_mm, bed_width_mm, vacuum_lines, active)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                bed_length_mm = excluded.bed_length_mm,
                bed_width_mm = excluded.bed_width_mm,
                vacuum_lines = excluded.vacuum_lines,
                active = excluded.active
            "#,
            params![
                autoclave.code,
                autoclave.name,
                autoclave.bed_length_mm,
                autoclave.bed_width_mm,
                autoclave.vacuum_lines,
                autoclave.active,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, code: &str) -> RepositoryResult<Option<Autoclave>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, name, bed_length_mm, bed_width_mm, vacuum_lines, active \
             FROM autoclave WHERE code = ?",
        )?;
        let mut rows = stmt.query_map(params![code], Self::map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn require_active(&self, code: &str) -> RepositoryResult<Autoclave> {
        match self.find(code)? {
            Some(a) if a.active => Ok(a),
            _ => Err(RepositoryError::NotFound {
                entity: "autoclave".to_string(),
                id: code.to_string(),
            }),
        }
    }

    pub fn list(&self) -> RepositoryResult<Vec<Autoclave>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, name, bed_length_mm, bed_width_mm, vacuum_lines, active \
             FROM autoclave ORDER BY code",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

// ==========================================
// CuringCycleRepository
// ==========================================

pub struct CuringCycleRepository {
    conn: SharedConnection,
}

impl CuringCycleRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<CuringCycle> {
        Ok(CuringCycle {
            code: row.get("code")?,
            description: row.get("description")?,
            temperature_c: row.get("temperature_c")?,
            pressure_bar: row.get("pressure_bar")?,
            duration_minutes: row.get("duration_minutes")?,
            compatibility_key: row.get("compatibility_key")?,
        })
    }

    pub fn upsert(&self, cycle: &CuringCycle) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO curing_cycle (code, description, temperature_c, pressure_bar,
                                      duration_minutes, compatibility_key)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                description = excluded.description,
                temperature_c = excluded.temperature_c,
                pressure_bar = excluded.pressure_bar,
                duration_minutes = excluded.duration_minutes,
                compatibility_key = excluded.compatibility_key
            "#,
            params![
                cycle.code,
                cycle.description,
                cycle.temperature_c,
                cycle.pressure_bar,
                cycle.duration_minutes,
                cycle.compatibility_key,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, code: &str) -> RepositoryResult<Option<CuringCycle>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, description, temperature_c, pressure_bar, duration_minutes, \
             compatibility_key FROM curing_cycle WHERE code = ?",
        )?;
        let mut rows = stmt.query_map(params![code], Self::map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn require(&self, code: &str) -> RepositoryResult<CuringCycle> {
        self.find(code)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "curing_cycle".to_string(),
            id: code.to_string(),
        })
    }

    pub fn list(&self) -> RepositoryResult<Vec<CuringCycle>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, description, temperature_c, pressure_bar, duration_minutes, \
             compatibility_key FROM curing_cycle ORDER BY code",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
