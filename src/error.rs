use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Unknown session, product, order or order item.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Duplicate session name, or a code space that ran out of free values.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rejected input (non-positive quantity or price, empty text).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Poisoned lock or other in-process failure. Reported like a storage error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub(crate) fn ensure_positive(what: &str, value: i32) -> LedgerResult<()> {
    if value <= 0 {
        return Err(LedgerError::validation(format!(
            "{} must be positive, got {}",
            what, value
        )));
    }
    Ok(())
}
