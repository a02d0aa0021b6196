// ==========================================
// Composite MES - Production event repository (EventLog)
// ==========================================
// Append-only. There are no UPDATE or DELETE methods here on purpose:
// the event log is the audit substrate of the whole workflow.
// The idempotency_key column carries a UNIQUE constraint; replayed scan
// intents are deduplicated on it.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::event::ProductionEvent;
use crate::domain::types::{Department, EventSource, EventType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::MutexGuard;

pub struct ProductionEventRepository {
    conn: SharedConnection,
}

impl ProductionEventRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductionEvent> {
        let department: Option<String> = row.get("department")?;
        let event_type_raw: String = row.get("event_type")?;
        let source_raw: String = row.get("source")?;
        Ok(ProductionEvent {
            seq: row.get("seq")?,
            event_id: row.get("event_id")?,
            order_number: row.get("order_number")?,
            department: department.as_deref().and_then(Department::parse),
            event_type: EventType::parse(&event_type_raw).unwrap_or(EventType::Note),
            occurred_at: row.get("occurred_at")?,
            actor_id: row.get("actor_id")?,
            duration_minutes: row.get("duration_minutes")?,
            note: row.get("note")?,
            is_automatic: row.get("is_automatic")?,
            source: EventSource::parse(&source_raw).unwrap_or(EventSource::Manual),
            rejected: row.get("rejected")?,
            idempotency_key: row.get("idempotency_key")?,
        })
    }

    const SELECT_COLS: &'static str = "seq, event_id, order_number, department, event_type, \
         occurred_at, actor_id, duration_minutes, note, is_automatic, source, rejected, \
         idempotency_key";

    // ==========================================
    // Appends
    // ==========================================

    pub fn append(&self, event: &ProductionEvent) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::append_tx(&conn, event)
    }

    pub fn append_tx(conn: &Connection, event: &ProductionEvent) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO production_event (
                event_id, order_number, department, event_type, occurred_at,
                actor_id, duration_minutes, note, is_automatic, source,
                rejected, idempotency_key
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                event.event_id,
                event.order_number,
                event.department.map(|d| d.code()),
                event.event_type.to_db_str(),
                event.occurred_at,
                event.actor_id,
                event.duration_minutes,
                event.note,
                event.is_automatic,
                event.source.to_db_str(),
                event.rejected,
                event.idempotency_key,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Events for one order, in fact order (timestamp, then insertion
    /// sequence as tie-break).
    pub fn list_by_order(&self, order_number: &str) -> RepositoryResult<Vec<ProductionEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM production_event WHERE order_number = ? ORDER BY occurred_at, seq",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![order_number], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn key_exists_tx(conn: &Connection, idempotency_key: &str) -> RepositoryResult<bool> {
        let hit: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM production_event WHERE idempotency_key = ? LIMIT 1",
                params![idempotency_key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    pub fn count_by_order(&self, order_number: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM production_event WHERE order_number = ?",
            params![order_number],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}
