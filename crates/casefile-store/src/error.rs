//! Error types for the storage layer.

use casefile_protocol::{EventId, SessionId, SessionStatus};

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row matched the lookup. The string names what was looked for.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness rule rejected the write (a suspect already claimed).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Every generated session code collided with a live session.
    #[error("no free session code after {attempts} attempts")]
    CodesExhausted { attempts: u32 },

    /// The caller folded a log that has since grown.
    ///
    /// Nothing was written. Re-read the log and try again.
    #[error("stale event head: expected {expected:?}, found {actual:?}")]
    StaleHead {
        expected: Option<EventId>,
        actual: Option<EventId>,
    },

    /// A status change would move the session backwards.
    #[error("session cannot move from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// The session is closed and accepts no more events.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    /// A stored value could not be turned back into a model type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The connection lock was poisoned by a panic in another caller.
    #[error("internal store error: {0}")]
    Internal(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json column: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether `err` is SQLite refusing a write because of a UNIQUE or
    /// CHECK constraint.
    pub(crate) fn is_constraint(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
