use crate::commands::{limits, products, settings};
use crate::db::Database;
use crate::error::LedgerResult;

/// Boxes the user may still count toward the limit in this session.
/// `None` when no limit is configured.
pub fn remaining_limit(db: &Database, user_id: i64, session_id: i64) -> LedgerResult<Option<i64>> {
    db.read(|conn| {
        let limit = settings::read_limit_per_person(conn)?;
        if limit == 0 {
            return Ok(None);
        }
        let used = limits::read_completed_boxes(conn, user_id, session_id)?;
        Ok(Some((limit - used).max(0)))
    })
}

/// How many boxes of `product_id` the user may still buy.
///
/// Without a limit this is the product's stock as stored, even when negative.
pub fn available_for_user(
    db: &Database,
    user_id: i64,
    session_id: i64,
    product_id: i64,
) -> LedgerResult<i64> {
    db.read(|conn| {
        let product = products::require_product(conn, product_id)?;
        let stock = product.stock;

        let limit = settings::read_limit_per_person(conn)?;
        if limit == 0 {
            return Ok(stock);
        }

        let by_limit = limit - limits::read_completed_boxes(conn, user_id, session_id)?;
        Ok(by_limit.min(stock).max(0))
    })
}
