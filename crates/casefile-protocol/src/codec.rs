//! Codec trait and the JSON implementation.
//!
//! The live endpoint carries WebSocket *text* frames, so a codec here
//! turns a value into a `String` and back. The hub, the server and the
//! client all go through [`Codec`] rather than calling `serde_json`
//! directly, so the frame format is decided in one place.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts messages to and from text frames.
///
/// `Send + Sync + 'static` because a codec is held by long-lived tasks
/// that Tokio may move between threads.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// # Errors
    /// [`ProtocolError::Decode`] if the text is malformed or doesn't
    /// match `T`.
    fn decode<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
