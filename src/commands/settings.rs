use crate::db::Database;
use crate::error::{LedgerError, LedgerResult};
use rusqlite::{Connection, OptionalExtension};

const LIMIT_PER_PERSON: &str = "limit_per_person";

/// Boxes one user may accumulate per session; 0 means unlimited.
///
/// A missing or unparseable stored value reads as 0.
pub(crate) fn read_limit_per_person(conn: &Connection) -> LedgerResult<i64> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [LIMIT_PER_PERSON],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
}

pub fn limit_per_person(db: &Database) -> LedgerResult<i64> {
    db.read(read_limit_per_person)
}

pub fn set_limit_per_person(db: &Database, limit: i64) -> LedgerResult<()> {
    if limit < 0 {
        return Err(LedgerError::validation(format!(
            "limit per person must not be negative, got {}",
            limit
        )));
    }

    db.write(|tx| {
        tx.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![LIMIT_PER_PERSON, limit.to_string()],
        )?;
        Ok(())
    })?;

    tracing::info!(limit, "limit per person updated");
    Ok(())
}
