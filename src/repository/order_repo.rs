// ==========================================
// Composite MES - Order repository
// ==========================================
// Data mapping only, no business rules. Status writes are guarded by the
// order's revision column: 0 affected rows means a concurrent writer won
// and the caller gets an optimistic lock failure.
// ==========================================

use crate::db::SharedConnection;
use crate::domain::order::Order;
use crate::domain::types::{OrderStatus, Priority};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::sync::MutexGuard;

pub struct OrderRepository {
    conn: SharedConnection,
}

impl OrderRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Order> {
        let status_raw: String = row.get("status")?;
        let priority_raw: String = row.get("priority")?;
        Ok(Order {
            order_number: row.get("order_number")?,
            part_number: row.get("part_number")?,
            description: row.get("description")?,
            quantity: row.get("quantity")?,
            priority: Priority::parse(&priority_raw).unwrap_or(Priority::Normal),
            length_mm: row.get("length_mm")?,
            width_mm: row.get("width_mm")?,
            height_mm: row.get("height_mm")?,
            curing_cycle_code: row.get("curing_cycle_code")?,
            vacuum_lines: row.get("vacuum_lines")?,
            status: OrderStatus::parse_wire(&status_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown order status: {status_raw}").into(),
                )
            })?,
            revision: row.get("revision")?,
            expected_completion: row.get("expected_completion")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    const SELECT_COLS: &'static str = "order_number, part_number, description, quantity, \
         priority, length_mm, width_mm, height_mm, curing_cycle_code, vacuum_lines, \
         status, revision, expected_completion, created_at, updated_at";

    // ==========================================
    // Writes
    // ==========================================

    pub fn insert(&self, order: &Order) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, order)
    }

    pub fn insert_tx(conn: &Connection, order: &Order) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO production_order (
                order_number, part_number, description, quantity, priority,
                length_mm, width_mm, height_mm, curing_cycle_code, vacuum_lines,
                status, revision, expected_completion, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                order.order_number,
                order.part_number,
                order.description,
                order.quantity,
                order.priority.to_db_str(),
                order.length_mm,
                order.width_mm,
                order.height_mm,
                order.curing_cycle_code,
                order.vacuum_lines,
                order.status.wire(),
                order.revision,
                order.expected_completion,
                order.created_at,
                order.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Revision-checked status write. The revision bump is the serialization
    /// point for concurrent transitions on the same order.
    pub fn update_status_tx(
        conn: &Connection,
        order_number: &str,
        expected_revision: i64,
        new_status: OrderStatus,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE production_order
               SET status = ?, revision = revision + 1, updated_at = ?
             WHERE order_number = ? AND revision = ?
            "#,
            params![
                new_status.wire(),
                Utc::now(),
                order_number,
                expected_revision
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::OptimisticLockFailure {
                entity: "production_order".to_string(),
                id: order_number.to_string(),
                expected: expected_revision,
            });
        }
        Ok(())
    }

    // ==========================================
    // Reads
    // ==========================================

    pub fn find(&self, order_number: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        Self::find_tx(&conn, order_number)
    }

    pub fn find_tx(conn: &Connection, order_number: &str) -> RepositoryResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM production_order WHERE order_number = ?",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![order_number], Self::map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Load an order or fail with NotFound.
    pub fn require_tx(conn: &Connection, order_number: &str) -> RepositoryResult<Order> {
        Self::find_tx(conn, order_number)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "production_order".to_string(),
            id: order_number.to_string(),
        })
    }

    /// All orders in any of the given statuses, ordered by order number for
    /// deterministic downstream processing.
    pub fn list_by_statuses(&self, statuses: &[OrderStatus]) -> RepositoryResult<Vec<Order>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM production_order WHERE status IN ({}) ORDER BY order_number",
            Self::SELECT_COLS,
            placeholders
        );
        let wires: Vec<String> = statuses.iter().map(|s| s.wire()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(wires.iter()), Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM production_order", [], |r| r.get(0))?;
        Ok(n)
    }
}
