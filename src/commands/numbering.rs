//! Public order codes and per-session sequence numbers.

use crate::error::{LedgerError, LedgerResult};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};

/// Width of a freshly issued public code.
pub const CODE_WIDTH: u32 = 6;
/// Widest code the generator falls back to once narrower widths keep colliding.
pub const MAX_CODE_WIDTH: u32 = 8;

fn format_code(value: u32, width: u32) -> String {
    format!("{:0width$}", value, width = width as usize)
}

fn code_exists(conn: &Connection, code: &str) -> LedgerResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM orders WHERE public_code = ?1",
            [code],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Draw a random decimal code not held by any existing order.
///
/// Makes up to `attempts` draws at each width from [`CODE_WIDTH`] to
/// [`MAX_CODE_WIDTH`]. Must run inside the transaction that inserts the order
/// so the probe and the insert see the same rows.
pub fn next_public_code(conn: &Connection, attempts: u32) -> LedgerResult<String> {
    next_public_code_with(conn, attempts, &mut rand::thread_rng())
}

pub(crate) fn next_public_code_with(
    conn: &Connection,
    attempts: u32,
    rng: &mut impl Rng,
) -> LedgerResult<String> {
    for width in CODE_WIDTH..=MAX_CODE_WIDTH {
        let space = 10u32.pow(width);
        for _ in 0..attempts {
            let code = format_code(rng.gen_range(0..space), width);
            if !code_exists(conn, &code)? {
                return Ok(code);
            }
            tracing::debug!(code = %code, "public code collision, drawing again");
        }
        tracing::warn!(width, attempts, "public code space crowded, widening");
    }

    Err(LedgerError::conflict(
        "no free public order code after widening the code space",
    ))
}

/// Claim the next sequence number of `session_id`.
///
/// Advances the session's counter in place, so concurrent writers in the same
/// session get distinct values and deleted orders never give theirs back.
pub fn next_session_sequence(conn: &Connection, session_id: i64) -> LedgerResult<i64> {
    conn.query_row(
        "UPDATE sessions SET last_sequence = last_sequence + 1 WHERE id = ?1 RETURNING last_sequence",
        [session_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(LedgerError::not_found("session", session_id))
}
