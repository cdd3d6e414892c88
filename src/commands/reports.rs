use crate::commands::orders::query_orders_with_items;
use crate::commands::sessions::find_session;
use crate::db::Database;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{OrderStatus, OrderWithItems, ProductSales, SessionSalesStats};
use chrono::{Duration, NaiveDateTime, Utc};

/// Timestamp layout SQLite uses for `CURRENT_TIMESTAMP`.
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Year,
    AllTime,
}

impl Period {
    /// Earliest creation time included in the period, or `None` for all time.
    pub fn start(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let days = match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 365,
            Period::AllTime => return None,
        };
        Some(now - Duration::days(days))
    }
}

/// Orders from every session created at or after `since` (UTC), newest first.
pub fn orders_since(db: &Database, since: NaiveDateTime) -> LedgerResult<Vec<OrderWithItems>> {
    let since = since.format(SQLITE_TIMESTAMP).to_string();
    db.read(|conn| query_orders_with_items(conn, "o.created_at >= ?1", [since.as_str()]))
}

pub fn orders_in_period(db: &Database, period: Period) -> LedgerResult<Vec<OrderWithItems>> {
    match period.start(Utc::now().naive_utc()) {
        Some(since) => orders_since(db, since),
        None => db.read(|conn| query_orders_with_items(conn, "1 = 1", rusqlite::params![])),
    }
}

/// Sales figures for one session. Revenue and boxes sold count completed orders only.
pub fn session_sales_stats(db: &Database, session_id: i64) -> LedgerResult<SessionSalesStats> {
    db.read(|conn| {
        if find_session(conn, session_id)?.is_none() {
            return Err(LedgerError::not_found("session", session_id));
        }

        let mut stats = SessionSalesStats {
            session_id,
            total_orders: 0,
            pending_orders: 0,
            processing_orders: 0,
            completed_orders: 0,
            cancelled_orders: 0,
            unique_customers: 0,
            revenue: 0.0,
            boxes_sold: 0,
            average_check: 0.0,
            products: Vec::new(),
        };

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*), COALESCE(SUM(total_amount), 0.0)
             FROM orders WHERE session_id = ?1
             GROUP BY status",
        )?;
        let by_status = stmt
            .query_map([session_id], |row| {
                Ok((
                    row.get::<_, OrderStatus>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (status, count, amount) in by_status {
            stats.total_orders += count;
            match status {
                OrderStatus::Pending => stats.pending_orders = count,
                OrderStatus::Processing => stats.processing_orders = count,
                OrderStatus::Completed => {
                    stats.completed_orders = count;
                    stats.revenue = amount;
                }
                OrderStatus::Cancelled => stats.cancelled_orders = count,
            }
        }

        // A customer is a distinct (full name, phone) pair.
        stats.unique_customers = conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT DISTINCT COALESCE(full_name, ''), COALESCE(phone, '')
                FROM orders WHERE session_id = ?1
             )",
            [session_id],
            |row| row.get(0),
        )?;

        stats.boxes_sold = conn.query_row(
            "SELECT COALESCE(SUM(oi.quantity), 0)
             FROM orders o
             JOIN order_items oi ON oi.order_id = o.id
             WHERE o.session_id = ?1 AND o.status = 'completed'",
            [session_id],
            |row| row.get(0),
        )?;

        if stats.completed_orders > 0 {
            stats.average_check = stats.revenue / stats.completed_orders as f64;
        }

        let mut product_stmt = conn.prepare(
            "SELECT p.id, p.name, p.price, p.stock,
                    COALESCE(SUM(oi.quantity), 0),
                    COALESCE(SUM(CASE WHEN o.status = 'completed' THEN oi.quantity END), 0),
                    COALESCE(SUM(CASE WHEN o.status = 'completed' THEN oi.quantity * oi.unit_price END), 0.0)
             FROM products p
             LEFT JOIN order_items oi ON oi.product_id = p.id
             LEFT JOIN orders o ON o.id = oi.order_id
             WHERE p.session_id = ?1
             GROUP BY p.id
             ORDER BY p.name, p.id",
        )?;

        stats.products = product_stmt
            .query_map([session_id], |row| {
                let remaining_stock: i64 = row.get(3)?;
                let boxes_reserved: i64 = row.get(4)?;
                Ok(ProductSales {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    remaining_stock,
                    boxes_reserved,
                    boxes_sold: row.get(5)?,
                    initial_stock: remaining_stock + boxes_reserved,
                    revenue: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    })
}
