//! Error types for the hub layer.

use casefile_protocol::SessionCode;
use casefile_store::StoreError;

/// Errors that can occur while routing live connections.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No session exists for the code.
    #[error("session {0} not found")]
    NotFound(SessionCode),

    /// The session is closed and accepts no more live connections.
    #[error("session {0} is closed")]
    SessionClosed(SessionCode),

    /// The coordinator task stopped before it could answer.
    #[error("hub for session {0} is unavailable")]
    Unavailable(SessionCode),

    #[error(transparent)]
    Store(StoreError),
}

impl HubError {
    /// Maps a store error, keeping "not found" in the hub's vocabulary.
    pub(crate) fn from_store(code: &SessionCode, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => HubError::NotFound(code.clone()),
            StoreError::SessionClosed(_) => {
                HubError::SessionClosed(code.clone())
            }
            other => HubError::Store(other),
        }
    }
}
