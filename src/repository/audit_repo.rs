// ==========================================
// Composite MES - Status audit repository
// ==========================================
// One row per accepted transition. Written in the same transaction as the
// status update and the production event; read by the dashboard audit view.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::event::StatusAuditRecord;
use crate::domain::types::OrderStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::MutexGuard;

pub struct StatusAuditRepository {
    conn: SharedConnection,
}

impl StatusAuditRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<StatusAuditRecord> {
        let prev_raw: String = row.get("previous_status")?;
        let new_raw: String = row.get("new_status")?;
        let parse = |s: &str| {
            OrderStatus::parse_wire(s).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown order status: {s}").into(),
                )
            })
        };
        Ok(StatusAuditRecord {
            audit_id: row.get("audit_id")?,
            order_number: row.get("order_number")?,
            previous_status: parse(&prev_raw)?,
            new_status: parse(&new_raw)?,
            actor_id: row.get("actor_id")?,
            reason: row.get("reason")?,
            forced: row.get("forced")?,
            bypassed_validation: row.get("bypassed_validation")?,
            recorded_at: row.get("recorded_at")?,
        })
    }

    pub fn append_tx(conn: &Connection, record: &StatusAuditRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO status_audit (
                audit_id, order_number, previous_status, new_status,
                actor_id, reason, forced, bypassed_validation, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.audit_id,
                record.order_number,
                record.previous_status.wire(),
                record.new_status.wire(),
                record.actor_id,
                record.reason,
                record.forced,
                record.bypassed_validation,
                record.recorded_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_by_order(&self, order_number: &str) -> RepositoryResult<Vec<StatusAuditRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT audit_id, order_number, previous_status, new_status,
                   actor_id, reason, forced, bypassed_validation, recorded_at
              FROM status_audit
             WHERE order_number = ?
             ORDER BY recorded_at
            "#,
        )?;
        let rows = stmt.query_map(params![order_number], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
