pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod telemetry;


pub use commands::availability::{available_for_user, remaining_limit};
pub use commands::bulk::complete_many;
pub use commands::editor::{add_item_to_order, change_item_quantity, delete_order_item};
pub use commands::limits::{audit_session_limits, completed_boxes};
pub use commands::orders::{
    create_order, delete_order, find_by_public_code, find_by_session_sequence, get_order,
    get_order_items, get_order_with_items, list_session_orders, user_orders,
};
pub use commands::reports::{orders_in_period, orders_since, session_sales_stats, Period};
pub use commands::sessions::{
    create_session, delete_session, get_session, is_trading_active, list_active_sessions,
    list_sessions, set_trading_active,
};
pub use commands::settings::{limit_per_person, set_limit_per_person};
pub use commands::status::{limit_delta, transition_status};
pub use config::Config;
pub use db::Database;
pub use error::{LedgerError, LedgerResult};

use serde::Serialize;

#[derive(Serialize)]
struct SessionSummary {
    session: models::Session,
    stats: models::SessionSalesStats,
}

/// Open the configured database, bring its schema up to date and print a
/// JSON summary of every session.
pub fn run() -> LedgerResult<()> {
    let config = Config::from_env()?;
    telemetry::init(&config.log_filter);

    let db = Database::open(&config)?;
    db.initialize()?;

    let mut summaries = Vec::new();
    for session in list_sessions(&db)? {
        let stats = session_sales_stats(&db, session.id)?;
        summaries.push(SessionSummary { session, stats });
    }

    tracing::info!(
        path = %db.path().display(),
        sessions = summaries.len(),
        limit_per_person = limit_per_person(&db)?,
        "ledger opened"
    );

    let json = serde_json::to_string_pretty(&summaries)
        .map_err(|e| LedgerError::Internal(format!("failed to encode summary: {}", e)))?;
    println!("{}", json);

    Ok(())
}
