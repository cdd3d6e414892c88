//! Admin corrections to a standing order's composition.
//!
//! Each edit settles stock, the buyer's limit (when the order is completed)
//! and the order total in the same transaction as the item change.

use crate::commands::{limits, orders, products};
use crate::db::Database;
use crate::error::{ensure_positive, LedgerError, LedgerResult};
use crate::models::{OrderItem, OrderWithItems};
use rusqlite::Connection;

fn require_item(conn: &Connection, item_id: i64) -> LedgerResult<OrderItem> {
    orders::find_item(conn, item_id)?.ok_or(LedgerError::not_found("order item", item_id))
}

/// Add `qty` boxes of a product at its current price.
#[tracing::instrument(skip(db))]
pub fn add_item_to_order(
    db: &Database,
    order_id: i64,
    product_id: i64,
    qty: i32,
) -> LedgerResult<OrderWithItems> {
    ensure_positive("quantity", qty)?;

    let updated = db.write(|tx| {
        let order = orders::require_order(tx, order_id)?;
        let product = products::require_product(tx, product_id)?;

        tx.execute(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![order_id, product_id, qty, product.price],
        )?;
        products::reserve(tx, product_id, qty)?;

        if order.status.is_completed() {
            limits::add(tx, order.user_id, order.session_id, i64::from(qty))?;
        }

        orders::recompute_total(tx, order_id)?;
        orders::with_items(tx, orders::require_order(tx, order_id)?)
    })?;

    tracing::info!(order_id, product_id, qty, total = updated.order.total_amount, "item added to order");
    Ok(updated)
}

/// Remove an item. The order stays, even when this was its last item.
#[tracing::instrument(skip(db))]
pub fn delete_order_item(db: &Database, item_id: i64) -> LedgerResult<OrderWithItems> {
    let updated = db.write(|tx| {
        let item = require_item(tx, item_id)?;
        let order = orders::require_order(tx, item.order_id)?;

        if order.status.is_completed() {
            limits::subtract(tx, order.user_id, order.session_id, i64::from(item.quantity))?;
        }
        products::release_if_present(tx, item.product_id, item.quantity)?;

        tx.execute("DELETE FROM order_items WHERE id = ?1", [item_id])?;

        orders::recompute_total(tx, order.id)?;
        orders::with_items(tx, orders::require_order(tx, order.id)?)
    })?;

    tracing::info!(
        item_id,
        order_id = updated.order.id,
        total = updated.order.total_amount,
        "item removed from order"
    );
    Ok(updated)
}

/// Set an item's quantity. The unit price stays at its snapshot.
#[tracing::instrument(skip(db))]
pub fn change_item_quantity(db: &Database, item_id: i64, new_qty: i32) -> LedgerResult<OrderWithItems> {
    ensure_positive("quantity", new_qty)?;

    let updated = db.write(|tx| {
        let item = require_item(tx, item_id)?;
        let order = orders::require_order(tx, item.order_id)?;
        let diff = new_qty - item.quantity;

        if diff != 0 {
            tx.execute(
                "UPDATE order_items SET quantity = ?1 WHERE id = ?2",
                rusqlite::params![new_qty, item_id],
            )?;

            if order.status.is_completed() {
                limits::add(tx, order.user_id, order.session_id, i64::from(diff))?;
            }

            // Growing an item of a deleted product fails here and undoes the above.
            if diff > 0 {
                products::reserve(tx, item.product_id, diff)?;
            } else {
                products::release_if_present(tx, item.product_id, -diff)?;
            }

            orders::recompute_total(tx, order.id)?;
        }

        orders::with_items(tx, orders::require_order(tx, order.id)?)
    })?;

    tracing::info!(
        item_id,
        order_id = updated.order.id,
        quantity = new_qty,
        total = updated.order.total_amount,
        "item quantity changed"
    );
    Ok(updated)
}
