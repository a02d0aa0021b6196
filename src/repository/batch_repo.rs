// ==========================================
// Composite MES - Autoclave load repository
// ==========================================
// Persistence for loads and their placements. The active-claim query
// backs the disjointness invariant: an order may be referenced by at most
// one non-RELEASED load.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::batch::{AutoclaveLoad, LoadPlacement};
use crate::domain::types::{BatchStatus, OrderStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::MutexGuard;

pub struct AutoclaveLoadRepository {
    conn: SharedConnection,
}

impl AutoclaveLoadRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_load(row: &Row<'_>) -> rusqlite::Result<AutoclaveLoad> {
        let status_raw: String = row.get("status")?;
        Ok(AutoclaveLoad {
            load_id: row.get("load_id")?,
            autoclave_code: row.get("autoclave_code")?,
            curing_cycle_code: row.get("curing_cycle_code")?,
            status: BatchStatus::parse(&status_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown batch status: {status_raw}").into(),
                )
            })?,
            planned_start: row.get("planned_start")?,
            planned_end: row.get("planned_end")?,
            actual_start: row.get("actual_start")?,
            actual_end: row.get("actual_end")?,
            utilization_pct: row.get("utilization_pct")?,
            total_area_mm2: row.get("total_area_mm2")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn map_placement(row: &Row<'_>) -> rusqlite::Result<LoadPlacement> {
        let prior_raw: String = row.get("prior_status")?;
        Ok(LoadPlacement {
            load_id: row.get("load_id")?,
            order_number: row.get("order_number")?,
            position_index: row.get("position_index")?,
            x_mm: row.get("x_mm")?,
            y_mm: row.get("y_mm")?,
            length_mm: row.get("length_mm")?,
            width_mm: row.get("width_mm")?,
            rotated: row.get("rotated")?,
            vacuum_lines: row.get("vacuum_lines")?,
            prior_status: OrderStatus::parse_wire(&prior_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown order status: {prior_raw}").into(),
                )
            })?,
        })
    }

    const LOAD_COLS: &'static str = "load_id, autoclave_code, curing_cycle_code, status, \
         planned_start, planned_end, actual_start, actual_end, utilization_pct, \
         total_area_mm2, created_by, created_at, updated_at";

    // ==========================================
    // Writes
    // ==========================================

    pub fn insert_load_tx(conn: &Connection, load: &AutoclaveLoad) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO autoclave_load (
                load_id, autoclave_code, curing_cycle_code, status,
                planned_start, planned_end, actual_start, actual_end,
                utilization_pct, total_area_mm2, created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                load.load_id,
                load.autoclave_code,
                load.curing_cycle_code,
                load.status.to_db_str(),
                load.planned_start,
                load.planned_end,
                load.actual_start,
                load.actual_end,
                load.utilization_pct,
                load.total_area_mm2,
                load.created_by,
                load.created_at,
                load.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn insert_placement_tx(conn: &Connection, p: &LoadPlacement) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO load_placement (
                load_id, order_number, position_index, x_mm, y_mm,
                length_mm, width_mm, rotated, vacuum_lines, prior_status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                p.load_id,
                p.order_number,
                p.position_index,
                p.x_mm,
                p.y_mm,
                p.length_mm,
                p.width_mm,
                p.rotated,
                p.vacuum_lines,
                p.prior_status.wire(),
            ],
        )?;
        Ok(())
    }

    /// Status advance guarded by the expected current status; 0 affected
    /// rows means a concurrent writer advanced (or deleted) the load first.
    pub fn update_status_tx(
        conn: &Connection,
        load_id: &str,
        expected: BatchStatus,
        new_status: BatchStatus,
        actual_start: Option<DateTime<Utc>>,
        actual_end: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE autoclave_load
               SET status = ?,
                   actual_start = COALESCE(?, actual_start),
                   actual_end = COALESCE(?, actual_end),
                   updated_at = ?
             WHERE load_id = ? AND status = ?
            "#,
            params![
                new_status.to_db_str(),
                actual_start,
                actual_end,
                Utc::now(),
                load_id,
                expected.to_db_str(),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::OptimisticLockFailure {
                entity: "autoclave_load".to_string(),
                id: load_id.to_string(),
                expected: 0,
            });
        }
        Ok(())
    }

    /// Remove a load and its placements. Lifecycle rules (DRAFT/READY only)
    /// are enforced by the engine, not here.
    pub fn delete_tx(conn: &Connection, load_id: &str) -> RepositoryResult<usize> {
        conn.execute(
            "DELETE FROM load_placement WHERE load_id = ?",
            params![load_id],
        )?;
        let rows = conn.execute(
            "DELETE FROM autoclave_load WHERE load_id = ?",
            params![load_id],
        )?;
        Ok(rows)
    }

    // ==========================================
    // Reads
    // ==========================================

    pub fn find(&self, load_id: &str) -> RepositoryResult<Option<AutoclaveLoad>> {
        let conn = self.get_conn()?;
        Self::find_tx(&conn, load_id)
    }

    pub fn find_tx(conn: &Connection, load_id: &str) -> RepositoryResult<Option<AutoclaveLoad>> {
        let sql = format!(
            "SELECT {} FROM autoclave_load WHERE load_id = ?",
            Self::LOAD_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![load_id], Self::map_load)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn require_tx(conn: &Connection, load_id: &str) -> RepositoryResult<AutoclaveLoad> {
        Self::find_tx(conn, load_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "autoclave_load".to_string(),
            id: load_id.to_string(),
        })
    }

    pub fn placements(&self, load_id: &str) -> RepositoryResult<Vec<LoadPlacement>> {
        let conn = self.get_conn()?;
        Self::placements_tx(&conn, load_id)
    }

    pub fn placements_tx(conn: &Connection, load_id: &str) -> RepositoryResult<Vec<LoadPlacement>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT load_id, order_number, position_index, x_mm, y_mm,
                   length_mm, width_mm, rotated, vacuum_lines, prior_status
              FROM load_placement
             WHERE load_id = ?
             ORDER BY position_index
            "#,
        )?;
        let rows = stmt.query_map(params![load_id], Self::map_placement)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Load id of the active (non-RELEASED) load claiming this order, if any.
    pub fn active_claim_tx(
        conn: &Connection,
        order_number: &str,
    ) -> RepositoryResult<Option<String>> {
        let hit: Option<String> = conn
            .query_row(
                r#"
                SELECT p.load_id
                  FROM load_placement p
                  JOIN autoclave_load l ON l.load_id = p.load_id
                 WHERE p.order_number = ? AND l.status != 'RELEASED'
                 LIMIT 1
                "#,
                params![order_number],
                |r| r.get(0),
            )
            .optional()?;
        Ok(hit)
    }

    pub fn list_active(&self) -> RepositoryResult<Vec<AutoclaveLoad>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM autoclave_load WHERE status != 'RELEASED' ORDER BY created_at",
            Self::LOAD_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_load)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
