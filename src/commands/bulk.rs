use crate::commands::{orders, status};
use crate::db::Database;
use crate::models::{BulkCompletion, OrderStatus};

enum Outcome {
    Completed,
    AlreadyCompleted,
    Missing,
}

/// Mark every listed order `completed`, one transaction per order.
///
/// Best effort: an order that fails does not undo the ones committed before
/// it. Unknown ids and storage failures both land in `failed`.
#[tracing::instrument(skip(db, order_ids), fields(requested = order_ids.len()))]
pub fn complete_many(db: &Database, order_ids: &[i64]) -> BulkCompletion {
    let mut result = BulkCompletion::default();

    for &order_id in order_ids {
        let outcome = db.write(|tx| {
            let Some(order) = orders::find_order(tx, order_id)? else {
                return Ok(Outcome::Missing);
            };
            if order.status.is_completed() {
                return Ok(Outcome::AlreadyCompleted);
            }
            status::apply_transition(tx, &order, OrderStatus::Completed)?;
            Ok(Outcome::Completed)
        });

        match outcome {
            Ok(Outcome::Completed) => result.success.push(order_id),
            Ok(Outcome::AlreadyCompleted) => result.already_completed.push(order_id),
            Ok(Outcome::Missing) => result.failed.push(order_id),
            Err(e) => {
                tracing::warn!(order_id, error = %e, "bulk completion failed for order");
                result.failed.push(order_id);
            }
        }
    }

    tracing::info!(
        success = result.success.len(),
        already_completed = result.already_completed.len(),
        failed = result.failed.len(),
        "bulk completion finished"
    );
    result
}
