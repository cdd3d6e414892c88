//! Order status changes and their effect on the personal limit.
//!
//! Any status may move to any other, including itself. Only crossing the
//! `completed` boundary moves the limit; stock never moves here, so a
//! cancelled order keeps its boxes reserved until it is edited or deleted.

use crate::commands::{limits, orders};
use crate::db::Database;
use crate::error::LedgerResult;
use crate::models::{Order, OrderStatus};
use rusqlite::Connection;

/// Change in counted boxes when an order holding `total_boxes` moves from `old` to `new`.
pub fn limit_delta(old: OrderStatus, new: OrderStatus, total_boxes: i64) -> i64 {
    match (old.is_completed(), new.is_completed()) {
        (false, true) => total_boxes,
        (true, false) => -total_boxes,
        _ => 0,
    }
}

/// Set the status inside an open transaction. Returns the status the order had before.
pub(crate) fn apply_transition(
    conn: &Connection,
    order: &Order,
    new_status: OrderStatus,
) -> LedgerResult<OrderStatus> {
    let boxes = orders::total_boxes(conn, order.id)?;
    let delta = limit_delta(order.status, new_status, boxes);
    limits::add(conn, order.user_id, order.session_id, delta)?;

    conn.execute(
        "UPDATE orders SET status = ?1 WHERE id = ?2",
        rusqlite::params![new_status, order.id],
    )?;

    Ok(order.status)
}

pub fn transition_status(db: &Database, order_id: i64, new_status: OrderStatus) -> LedgerResult<Order> {
    let (previous, order) = db.write(|tx| {
        let order = orders::require_order(tx, order_id)?;
        let previous = apply_transition(tx, &order, new_status)?;
        Ok((previous, orders::require_order(tx, order_id)?))
    })?;

    tracing::info!(order_id, from = %previous, to = %new_status, "order status changed");
    Ok(order)
}
