//! Messages on the live connection.
//!
//! The live endpoint is deliberately small. The server pushes three kinds
//! of frame and the client sends one:
//!
//! ```text
//! Server → Client: {"type":"session", session, players}
//!                  {"type":"event", event}
//!                  {"type":"error", code, message}
//! Client → Server: {"type":"resume", lastEventId?}
//! ```
//!
//! Both enums are "internally tagged" on `type`, so a browser client can
//! switch on `msg.type` directly.

use serde::{Deserialize, Serialize};

use crate::{Event, EventId, Player, Session};

/// A session plus its players in join order.
///
/// This is also the body of most REST responses, which is why it lives
/// here rather than in the server crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: Session,
    pub players: Vec<Player>,
}

/// Machine-readable reason attached to a live error frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveErrorCode {
    /// The session was closed. Clients drop their local state.
    SessionClosed,
    /// No session exists for the code.
    NotFound,
    /// The client sent a frame the server couldn't parse.
    BadMessage,
    /// The server couldn't serve the request. Reconnect and resume.
    Unavailable,
}

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full current state. Sent on connect and after host changes.
    Session {
        session: Session,
        players: Vec<Player>,
    },

    /// One log entry. Always delivered in ascending id order.
    Event { event: Event },

    Error {
        code: LiveErrorCode,
        message: String,
    },
}

impl ServerMessage {
    pub fn snapshot(snapshot: SessionSnapshot) -> Self {
        ServerMessage::Session {
            session: snapshot.session,
            players: snapshot.players,
        }
    }

    pub fn error(code: LiveErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// "Send me everything after `last_event_id`." Without an id the
    /// server treats it as a no-op: the connect snapshot already covers
    /// the current state.
    Resume {
        #[serde(default)]
        last_event_id: Option<EventId>,
    },
}
