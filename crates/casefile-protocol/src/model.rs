//! The persisted data model: sessions, players, and the event log.
//!
//! These are the shapes the server stores and the shapes clients see.
//! Field names are camelCase on the wire because the host screen and the
//! phones are browser clients.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EventId, PlayerId, SessionCode, SessionId, SuspectId};

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a session.
///
/// Status only ever moves forward:
///
/// ```text
/// Lobby ──(start_game event)──→ Active ──(close)──→ Closed
///   └──────────────────(close)─────────────────────↗
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Lobby,
    Active,
    Closed,
}

impl SessionStatus {
    /// Column value used by the store.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lobby" => Some(Self::Lobby),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Lobby => 0,
            Self::Active => 1,
            Self::Closed => 2,
        }
    }

    /// Returns `true` if moving to `target` keeps the status monotonic.
    pub fn can_transition_to(self, target: Self) -> bool {
        target.rank() > self.rank()
    }

    /// Players may only attach while the session is in the lobby.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Host display state
// ---------------------------------------------------------------------------

/// Why an interruption fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionKind {
    /// The game clock (net of pauses) crossed a threshold.
    Timed,
    /// The revealed-clue ratio crossed a fraction.
    RevealProgress,
    /// The one-time "rooms unlock" announcement.
    RoomsUnlock,
    /// Pushed manually by the host.
    Custom,
}

/// A session-wide pause-and-announce currently shown on the host screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interruption {
    pub id: String,
    pub kind: InterruptionKind,
    pub message: String,
}

/// The last graded accusation, as published by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccusationResult {
    pub player_id: PlayerId,
    pub correct_count: u8,
    pub feedback: String,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One party-game instance.
///
/// The secret [`Solution`] is deliberately *not* a field here: this type
/// is what every phone receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub code: SessionCode,
    pub status: SessionStatus,
    pub current_turn_suspect_id: Option<SuspectId>,
    /// Whether the host has opened the notes panel on the phones.
    #[serde(default)]
    pub notes_available: bool,
    #[serde(default)]
    pub interruption: Option<Interruption>,
    /// Inspector notes the host has made available to read.
    #[serde(default)]
    pub inspector_notes: BTreeSet<String>,
    #[serde(default)]
    pub accusation_result: Option<AccusationResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player's private deduction sheet: what they have ruled out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Eliminations {
    pub suspects: BTreeSet<String>,
    pub items: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub times: BTreeSet<String>,
}

/// One phone participant bound to a session and a claimed suspect.
///
/// The reconnect token is not part of this shape. It is returned exactly
/// once, alongside the player, by the join and reconnect endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub session_id: SessionId,
    pub name: String,
    pub suspect_id: SuspectId,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub eliminations: Eliminations,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Discriminator of an event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TurnAction,
    Accusation,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TurnAction => "turn_action",
            Self::Accusation => "accusation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "turn_action" => Some(Self::TurnAction),
            "accusation" => Some(Self::Accusation),
            _ => None,
        }
    }
}

/// An immutable entry in a session's log.
///
/// `payload` stays an untyped JSON value on the wire and in storage;
/// use [`Event::action`](crate::Event::action) to get the typed
/// [`GameAction`](crate::GameAction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Game answer and turn order
// ---------------------------------------------------------------------------

/// The four-field answer to the mystery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub suspect: String,
    pub item: String,
    pub location: String,
    pub time: String,
}

/// One entry of the frozen turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSlot {
    pub player_id: PlayerId,
    pub suspect_id: SuspectId,
}
