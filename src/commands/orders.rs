use crate::commands::{limits, numbering, products};
use crate::db::Database;
use crate::error::{ensure_positive, LedgerError, LedgerResult};
use crate::models::{CreateOrder, Order, OrderItem, OrderWithItems};
use rusqlite::{Connection, OptionalExtension, Row};

pub(crate) const ORDER_COLUMNS: &str = "o.id, o.public_code, o.session_sequence, o.user_id, o.session_id, o.phone, o.full_name, o.total_amount, o.status, o.created_at";

const ITEM_COLUMNS: &str = "oi.id, oi.order_id, oi.product_id, p.name, oi.quantity, oi.unit_price";

pub(crate) fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        public_code: row.get(1)?,
        session_sequence: row.get(2)?,
        user_id: row.get(3)?,
        session_id: row.get(4)?,
        phone: row.get(5)?,
        full_name: row.get(6)?,
        total_amount: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        id: row.get(0)?,
        order_id: row.get(1)?,
        product_id: row.get(2)?,
        product_name: row.get(3)?,
        quantity: row.get(4)?,
        unit_price: row.get(5)?,
    })
}

pub(crate) fn find_order(conn: &Connection, id: i64) -> LedgerResult<Option<Order>> {
    let order = conn
        .query_row(
            &format!("SELECT {} FROM orders o WHERE o.id = ?1", ORDER_COLUMNS),
            [id],
            order_from_row,
        )
        .optional()?;
    Ok(order)
}

pub(crate) fn require_order(conn: &Connection, id: i64) -> LedgerResult<Order> {
    find_order(conn, id)?.ok_or(LedgerError::not_found("order", id))
}

pub(crate) fn load_items(conn: &Connection, order_id: i64) -> LedgerResult<Vec<OrderItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}
         FROM order_items oi
         LEFT JOIN products p ON oi.product_id = p.id
         WHERE oi.order_id = ?1
         ORDER BY oi.id",
        ITEM_COLUMNS
    ))?;

    let items = stmt
        .query_map([order_id], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

pub(crate) fn find_item(conn: &Connection, item_id: i64) -> LedgerResult<Option<OrderItem>> {
    let item = conn
        .query_row(
            &format!(
                "SELECT {}
                 FROM order_items oi
                 LEFT JOIN products p ON oi.product_id = p.id
                 WHERE oi.id = ?1",
                ITEM_COLUMNS
            ),
            [item_id],
            item_from_row,
        )
        .optional()?;
    Ok(item)
}

pub(crate) fn with_items(conn: &Connection, order: Order) -> LedgerResult<OrderWithItems> {
    let items = load_items(conn, order.id)?;
    Ok(OrderWithItems { order, items })
}

/// Boxes across all current items of the order.
pub(crate) fn total_boxes(conn: &Connection, order_id: i64) -> LedgerResult<i64> {
    let boxes = conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0) FROM order_items WHERE order_id = ?1",
        [order_id],
        |row| row.get(0),
    )?;
    Ok(boxes)
}

/// Rewrite `total_amount` from the order's current items.
pub(crate) fn recompute_total(conn: &Connection, order_id: i64) -> LedgerResult<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(quantity * unit_price), 0.0) FROM order_items WHERE order_id = ?1",
        [order_id],
        |row| row.get(0),
    )?;

    conn.execute(
        "UPDATE orders SET total_amount = ?1 WHERE id = ?2",
        rusqlite::params![total, order_id],
    )?;

    Ok(total)
}

pub(crate) fn validate_unit_price(price: f64) -> LedgerResult<()> {
    if !(price > 0.0) {
        return Err(LedgerError::validation(format!(
            "unit price must be positive, got {}",
            price
        )));
    }
    Ok(())
}

/// Record a purchase: both order numbers, the items, and the stock they take.
///
/// The personal limit is not touched here; it moves when the order is
/// completed. The whole order commits or nothing does.
#[tracing::instrument(skip(db, order), fields(user_id = order.user_id, session_id = order.session_id))]
pub fn create_order(db: &Database, order: CreateOrder) -> LedgerResult<OrderWithItems> {
    if order.items.is_empty() {
        return Err(LedgerError::validation("order must contain at least one item"));
    }
    for item in &order.items {
        ensure_positive("quantity", item.quantity)?;
        validate_unit_price(item.unit_price)?;
    }

    let created = db.with_session_lock(order.session_id, || {
        db.write(|tx| {
            let session_sequence = numbering::next_session_sequence(tx, order.session_id)?;
            let public_code = numbering::next_public_code(tx, db.code_attempts())?;

            tx.execute(
                "INSERT INTO orders (public_code, session_sequence, user_id, session_id, phone, full_name, total_amount, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'pending')",
                rusqlite::params![
                    public_code,
                    session_sequence,
                    order.user_id,
                    order.session_id,
                    order.phone,
                    order.full_name
                ],
            )?;

            let order_id = tx.last_insert_rowid();

            for item in &order.items {
                tx.execute(
                    "INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![order_id, item.product_id, item.quantity, item.unit_price],
                )?;
                products::reserve(tx, item.product_id, item.quantity)?;
            }

            recompute_total(tx, order_id)?;

            with_items(tx, require_order(tx, order_id)?)
        })
    })?;

    tracing::info!(
        order_id = created.order.id,
        public_code = %created.order.public_code,
        session_sequence = created.order.session_sequence,
        total = created.order.total_amount,
        "order created"
    );

    Ok(created)
}

pub fn get_order(db: &Database, id: i64) -> LedgerResult<Order> {
    db.read(|conn| require_order(conn, id))
}

pub fn get_order_items(db: &Database, order_id: i64) -> LedgerResult<Vec<OrderItem>> {
    db.read(|conn| {
        require_order(conn, order_id)?;
        load_items(conn, order_id)
    })
}

pub fn get_order_with_items(db: &Database, id: i64) -> LedgerResult<OrderWithItems> {
    db.read(|conn| with_items(conn, require_order(conn, id)?))
}

pub fn find_by_public_code(db: &Database, public_code: &str) -> LedgerResult<Option<Order>> {
    db.read(|conn| {
        let order = conn
            .query_row(
                &format!("SELECT {} FROM orders o WHERE o.public_code = ?1", ORDER_COLUMNS),
                [public_code.trim()],
                order_from_row,
            )
            .optional()?;
        Ok(order)
    })
}

/// Orders of `session_id` whose sequence number is one of `sequences`, in sequence order.
/// Numbers with no order are skipped.
pub fn find_by_session_sequence(
    db: &Database,
    session_id: i64,
    sequences: &[i64],
) -> LedgerResult<Vec<Order>> {
    if sequences.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (0..sequences.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");

    db.read(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM orders o
             WHERE o.session_id = ?1 AND o.session_sequence IN ({})
             ORDER BY o.session_sequence",
            ORDER_COLUMNS, placeholders
        ))?;

        let params = std::iter::once(session_id).chain(sequences.iter().copied());
        let orders = stmt
            .query_map(rusqlite::params_from_iter(params), order_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(orders)
    })
}

/// Delete an order with its items, returning their boxes to stock and, for a
/// completed order, taking them off the buyer's limit.
#[tracing::instrument(skip(db))]
pub fn delete_order(db: &Database, id: i64) -> LedgerResult<()> {
    let deleted = db.write(|tx| {
        let order = require_order(tx, id)?;
        let items = load_items(tx, id)?;

        if order.status.is_completed() {
            let boxes: i64 = items.iter().map(|item| i64::from(item.quantity)).sum();
            limits::subtract(tx, order.user_id, order.session_id, boxes)?;
        }

        for item in &items {
            products::release_if_present(tx, item.product_id, item.quantity)?;
        }

        tx.execute("DELETE FROM order_items WHERE order_id = ?1", [id])?;
        tx.execute("DELETE FROM orders WHERE id = ?1", [id])?;

        Ok(order)
    })?;

    tracing::info!(
        order_id = id,
        public_code = %deleted.public_code,
        status = %deleted.status,
        "order deleted"
    );
    Ok(())
}

pub(crate) fn query_orders_with_items(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> LedgerResult<Vec<OrderWithItems>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM orders o WHERE {} ORDER BY o.created_at DESC, o.id DESC",
        ORDER_COLUMNS, filter
    ))?;

    let orders = stmt
        .query_map(params, order_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    orders
        .into_iter()
        .map(|order| with_items(conn, order))
        .collect()
}

/// All orders of a session, newest first.
pub fn list_session_orders(db: &Database, session_id: i64) -> LedgerResult<Vec<OrderWithItems>> {
    db.read(|conn| query_orders_with_items(conn, "o.session_id = ?1", [session_id]))
}

/// A buyer's orders in one session, newest first.
pub fn user_orders(db: &Database, user_id: i64, session_id: i64) -> LedgerResult<Vec<OrderWithItems>> {
    db.read(|conn| {
        query_orders_with_items(
            conn,
            "o.user_id = ?1 AND o.session_id = ?2",
            [user_id, session_id],
        )
    })
}
