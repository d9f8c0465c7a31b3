//! Error types for the session layer.

use casefile_protocol::SessionCode;
use casefile_store::StoreError;

/// Errors from enrolling, authenticating or reconnecting a player.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown session, unknown player, or a token that belongs to a
    /// different session.
    #[error("{0} not found")]
    NotFound(String),

    /// The token doesn't match the player it was presented for.
    #[error("reconnect token does not match player")]
    Unauthorized,

    /// The suspect is taken, or the game has already started.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A blank name or a suspect outside the roster.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("session {0} is closed")]
    SessionClosed(SessionCode),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => SessionError::NotFound(what),
            StoreError::Conflict(why) => SessionError::Conflict(why),
            other => SessionError::Store(other),
        }
    }
}
