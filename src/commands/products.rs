use crate::commands::sessions::find_session;
use crate::db::Database;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{CreateProduct, Product};
use rusqlite::{Connection, OptionalExtension, Row};

const PRODUCT_COLUMNS: &str = "id, session_id, name, price, stock, created_at, created_by";

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        session_id: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        stock: row.get(4)?,
        created_at: row.get(5)?,
        created_by: row.get(6)?,
    })
}

pub(crate) fn find_product(conn: &Connection, id: i64) -> LedgerResult<Option<Product>> {
    let product = conn
        .query_row(
            &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
            [id],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

pub(crate) fn require_product(conn: &Connection, id: i64) -> LedgerResult<Product> {
    find_product(conn, id)?.ok_or(LedgerError::not_found("product", id))
}

/// Take `qty` boxes out of stock. A negative `qty` puts boxes back.
///
/// Stock is not checked against zero here; callers bound the request with
/// `available_for_user` first.
pub fn reserve(conn: &Connection, product_id: i64, qty: i32) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE products SET stock = stock - ?1 WHERE id = ?2",
        rusqlite::params![qty, product_id],
    )?;
    if changed == 0 {
        return Err(LedgerError::not_found("product", product_id));
    }
    Ok(())
}

/// Return `qty` boxes to stock.
pub fn release(conn: &Connection, product_id: i64, qty: i32) -> LedgerResult<()> {
    reserve(conn, product_id, -qty)
}

/// Like [`release`], but a product that no longer exists is skipped.
pub(crate) fn release_if_present(conn: &Connection, product_id: i64, qty: i32) -> LedgerResult<()> {
    match release(conn, product_id, qty) {
        Err(LedgerError::NotFound { .. }) => {
            tracing::debug!(product_id, qty, "released boxes of a deleted product");
            Ok(())
        }
        other => other,
    }
}

/// Overwrite the stock count (the admin "change box volume" action).
pub fn set_stock(db: &Database, product_id: i64, stock: i64) -> LedgerResult<Product> {
    let product = db.write(|tx| {
        let changed = tx.execute(
            "UPDATE products SET stock = ?1 WHERE id = ?2",
            rusqlite::params![stock, product_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("product", product_id));
        }
        require_product(tx, product_id)
    })?;

    tracing::info!(product_id, stock, "product stock overridden");
    Ok(product)
}

pub fn create_product(db: &Database, product: CreateProduct) -> LedgerResult<Product> {
    let name = product.name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("product name must not be empty"));
    }
    if !(product.price > 0.0) {
        return Err(LedgerError::validation(format!(
            "product price must be positive, got {}",
            product.price
        )));
    }
    if product.stock < 0 {
        return Err(LedgerError::validation(format!(
            "initial stock must not be negative, got {}",
            product.stock
        )));
    }

    let created = db.write(|tx| {
        if find_session(tx, product.session_id)?.is_none() {
            return Err(LedgerError::not_found("session", product.session_id));
        }

        tx.execute(
            "INSERT INTO products (session_id, name, price, stock, created_by) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![product.session_id, name, product.price, product.stock, product.created_by],
        )?;

        require_product(tx, tx.last_insert_rowid())
    })?;

    tracing::info!(
        product_id = created.id,
        session_id = created.session_id,
        stock = created.stock,
        "product created"
    );
    Ok(created)
}

pub fn get_product(db: &Database, id: i64) -> LedgerResult<Product> {
    db.read(|conn| require_product(conn, id))
}

pub fn list_session_products(db: &Database, session_id: i64) -> LedgerResult<Vec<Product>> {
    db.read(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products WHERE session_id = ?1 ORDER BY created_at DESC, id DESC",
            PRODUCT_COLUMNS
        ))?;

        let products = stmt
            .query_map([session_id], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(products)
    })
}

/// Delete a product. Order items that reference it stay and read back without a name.
pub fn delete_product(db: &Database, id: i64) -> LedgerResult<()> {
    db.write(|tx| {
        let changed = tx.execute("DELETE FROM products WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(LedgerError::not_found("product", id));
        }
        Ok(())
    })?;

    tracing::info!(product_id = id, "product deleted");
    Ok(())
}
