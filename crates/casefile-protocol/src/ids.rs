//! Identity types.
//!
//! Every id is a "newtype wrapper" around a primitive. You can't pass a
//! `PlayerId` where an `EventId` is expected even though both are `i64`
//! underneath, and `#[serde(transparent)]` keeps the JSON a plain number.
//!
//! The numeric ids are `i64` because that is what SQLite hands out for
//! `INTEGER PRIMARY KEY` columns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Primary key of a session row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Primary key of a player row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Position of an event in the append-only log.
///
/// Assigned by the store, never by a client. Event ids are a total order
/// within a session: "what have I already seen" is answered by comparing
/// against the last `EventId` a client applied, which is why this type
/// derives `Ord`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// A claim on one slot of the fixed suspect roster (e.g. `"plum"`).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SuspectId(pub String);

impl SuspectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SuspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The short, human-typeable code players enter on their phones.
///
/// Codes are drawn from [`SessionCode::ALPHABET`], which leaves out
/// characters that are easy to misread on a TV across the room
/// (`I`/`1`, `O`/`0`). Parsing is case-insensitive: a phone keyboard
/// that sends `"kx7p"` finds session `KX7P`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Characters a code may contain.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Shortest accepted code.
    pub const MIN_LEN: usize = 4;

    /// Longest accepted code.
    pub const MAX_LEN: usize = 8;

    /// Parses user input into a code, normalizing to upper case.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] if the input is the wrong length
    /// or contains a character outside the alphabet.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim().to_ascii_uppercase();
        if code.len() < Self::MIN_LEN || code.len() > Self::MAX_LEN {
            return Err(ProtocolError::InvalidMessage(format!(
                "session code must be {}-{} characters",
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        if let Some(bad) =
            code.bytes().find(|b| !Self::ALPHABET.contains(b))
        {
            return Err(ProtocolError::InvalidMessage(format!(
                "session code contains invalid character {:?}",
                bad as char
            )));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
