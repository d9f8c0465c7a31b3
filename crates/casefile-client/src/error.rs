//! Error types for the client layer.

use casefile_protocol::{LiveErrorCode, ProtocolError};
use casefile_turn::TurnError;

/// Errors that can occur on the client side.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The live connection could not be opened or broke.
    #[error("live connection: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server sent an error frame other than `session_closed`.
    #[error("server error {code:?}: {message}")]
    Server {
        code: LiveErrorCode,
        message: String,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An event in the log could not be folded.
    #[error(transparent)]
    Turn(#[from] TurnError),

    /// Reading or writing the stored identity failed.
    #[error("identity store: {0}")]
    Identity(String),
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Identity(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Identity(e.to_string())
    }
}
