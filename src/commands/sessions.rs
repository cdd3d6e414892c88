use crate::db::Database;
use crate::error::{is_unique_violation, LedgerError, LedgerResult};
use crate::models::{CreateSession, Session, SessionDeletion};
use rusqlite::{Connection, OptionalExtension, Row};

const SESSION_COLUMNS: &str = "id, name, description, is_active, created_at, created_by";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        trading_active: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
        created_by: row.get(5)?,
    })
}

pub fn create_session(db: &Database, session: CreateSession) -> LedgerResult<Session> {
    let name = session.name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("session name must not be empty"));
    }

    let session_id = db.write(|tx| {
        tx.execute(
            "INSERT INTO sessions (name, description, created_by) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, session.description, session.created_by],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::conflict(format!("session {:?} already exists", name))
            } else {
                e.into()
            }
        })?;
        Ok(tx.last_insert_rowid())
    })?;

    tracing::info!(session_id, name, created_by = session.created_by, "session created");
    get_session(db, session_id)
}

pub(crate) fn find_session(conn: &Connection, id: i64) -> LedgerResult<Option<Session>> {
    let session = conn
        .query_row(
            &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
            [id],
            session_from_row,
        )
        .optional()?;
    Ok(session)
}

pub fn get_session(db: &Database, id: i64) -> LedgerResult<Session> {
    db.read(|conn| find_session(conn, id)?.ok_or(LedgerError::not_found("session", id)))
}

fn query_sessions(conn: &Connection, only_active: bool) -> LedgerResult<Vec<Session>> {
    let filter = if only_active { "WHERE is_active = 1" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sessions {} ORDER BY created_at DESC, id DESC",
        SESSION_COLUMNS, filter
    ))?;

    let sessions = stmt
        .query_map([], session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sessions)
}

pub fn list_sessions(db: &Database) -> LedgerResult<Vec<Session>> {
    db.read(|conn| query_sessions(conn, false))
}

pub fn list_active_sessions(db: &Database) -> LedgerResult<Vec<Session>> {
    db.read(|conn| query_sessions(conn, true))
}

pub fn set_trading_active(db: &Database, session_id: i64, active: bool) -> LedgerResult<()> {
    db.write(|tx| {
        let changed = tx.execute(
            "UPDATE sessions SET is_active = ?1 WHERE id = ?2",
            rusqlite::params![active, session_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("session", session_id));
        }
        Ok(())
    })?;

    tracing::info!(session_id, active, "session trading status changed");
    Ok(())
}

/// Whether buyers may place new orders in the session.
pub fn is_trading_active(db: &Database, session_id: i64) -> LedgerResult<bool> {
    db.read(|conn| {
        find_session(conn, session_id)?
            .map(|s| s.trading_active)
            .ok_or(LedgerError::not_found("session", session_id))
    })
}

/// Delete a session together with its products and limit rows.
///
/// Orders and order items of the session are left in place; the returned
/// report counts them.
pub fn delete_session(db: &Database, session_id: i64) -> LedgerResult<SessionDeletion> {
    let deletion = db.write(|tx| {
        if find_session(tx, session_id)?.is_none() {
            return Err(LedgerError::not_found("session", session_id));
        }

        let limits_removed = tx.execute(
            "DELETE FROM user_session_limits WHERE session_id = ?1",
            [session_id],
        )?;
        let products_removed =
            tx.execute("DELETE FROM products WHERE session_id = ?1", [session_id])?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;

        let orphaned_orders: i64 = tx.query_row(
            "SELECT COUNT(*) FROM orders WHERE session_id = ?1",
            [session_id],
            |row| row.get(0),
        )?;

        Ok(SessionDeletion {
            session_id,
            products_removed,
            limits_removed,
            orphaned_orders: orphaned_orders as usize,
        })
    })?;

    if deletion.orphaned_orders > 0 {
        tracing::warn!(
            session_id,
            orphaned_orders = deletion.orphaned_orders,
            "session deleted with orders still attached"
        );
    } else {
        tracing::info!(session_id, "session deleted");
    }

    Ok(deletion)
}
