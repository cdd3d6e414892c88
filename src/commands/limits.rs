//! Per-(user, session) count of boxes counted toward the personal limit.
//!
//! The `user_session_limits` row is the source of truth. It is moved by deltas
//! whenever an order enters or leaves `completed`, or a completed order is
//! edited; it is never rebuilt from a scan. [`live_completed_boxes`] recomputes
//! the same figure from orders and only backs the consistency audit.

use crate::db::Database;
use crate::error::LedgerResult;
use crate::models::LimitDrift;
use rusqlite::{Connection, OptionalExtension};

pub(crate) fn read_completed_boxes(
    conn: &Connection,
    user_id: i64,
    session_id: i64,
) -> LedgerResult<i64> {
    let boxes = conn
        .query_row(
            "SELECT completed_boxes FROM user_session_limits WHERE user_id = ?1 AND session_id = ?2",
            [user_id, session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(boxes.unwrap_or(0))
}

pub fn completed_boxes(db: &Database, user_id: i64, session_id: i64) -> LedgerResult<i64> {
    db.read(|conn| read_completed_boxes(conn, user_id, session_id))
}

/// Apply a signed delta to the user's counted boxes.
///
/// A session that has been deleted no longer keeps limit rows, so deltas
/// coming from its orphaned orders are dropped.
pub fn add(conn: &Connection, user_id: i64, session_id: i64, boxes: i64) -> LedgerResult<()> {
    if boxes == 0 {
        return Ok(());
    }

    let changed = conn.execute(
        "INSERT INTO user_session_limits (user_id, session_id, completed_boxes)
         SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ?2)
         ON CONFLICT(user_id, session_id)
         DO UPDATE SET completed_boxes = completed_boxes + excluded.completed_boxes",
        [user_id, session_id, boxes],
    )?;

    if changed == 0 {
        tracing::debug!(user_id, session_id, delta = boxes, "limit delta for deleted session skipped");
    } else {
        tracing::debug!(user_id, session_id, delta = boxes, "limit adjusted");
    }
    Ok(())
}

pub fn subtract(conn: &Connection, user_id: i64, session_id: i64, boxes: i64) -> LedgerResult<()> {
    add(conn, user_id, session_id, -boxes)
}

/// Boxes in the user's completed orders of the session, summed from the orders themselves.
pub fn live_completed_boxes(conn: &Connection, user_id: i64, session_id: i64) -> LedgerResult<i64> {
    let boxes = conn.query_row(
        "SELECT COALESCE(SUM(oi.quantity), 0)
         FROM orders o
         JOIN order_items oi ON oi.order_id = o.id
         WHERE o.user_id = ?1 AND o.session_id = ?2 AND o.status = 'completed'",
        [user_id, session_id],
        |row| row.get(0),
    )?;
    Ok(boxes)
}

/// Every user of the session whose cached count differs from the live sum.
pub fn audit_session_limits(db: &Database, session_id: i64) -> LedgerResult<Vec<LimitDrift>> {
    db.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id FROM user_session_limits WHERE session_id = ?1
             UNION
             SELECT user_id FROM orders WHERE session_id = ?1
             ORDER BY user_id",
        )?;
        let users = stmt
            .query_map([session_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut drifts = Vec::new();
        for user_id in users {
            let cached = read_completed_boxes(conn, user_id, session_id)?;
            let actual = live_completed_boxes(conn, user_id, session_id)?;
            if cached != actual {
                drifts.push(LimitDrift {
                    user_id,
                    session_id,
                    cached,
                    actual,
                });
            }
        }

        if !drifts.is_empty() {
            tracing::warn!(session_id, drifts = drifts.len(), "limit cache drift detected");
        }
        Ok(drifts)
    })
}
