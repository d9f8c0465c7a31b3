//! Error types for the protocol layer.
//!
//! Each crate in Casefile defines its own error enum. When you see a
//! `ProtocolError`, the problem is in parsing or encoding — a malformed
//! frame, an unknown action, a payload missing a field — not in storage
//! or game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into JSON text).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning JSON text into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or an
    /// unknown `type` tag.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// An event payload doesn't match the shape its action requires.
    ///
    /// Raised at the API boundary before anything is persisted, so the
    /// caller can surface it as a 400 rather than a server fault.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
