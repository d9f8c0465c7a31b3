//! The closed action vocabulary.
//!
//! Events are stored with an untyped JSON `payload` so the log stays
//! readable by any client. Everything that *acts* on a payload goes
//! through [`GameAction`] instead: parse once at the boundary with
//! [`GameAction::from_wire`], then dispatch with an exhaustive `match`.
//! Adding an action means adding a variant here, and the compiler points
//! at every place that has to handle it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Event, EventKind, ProtocolError, SuspectId, TurnSlot};

/// How a secret passage turned out. Narrative only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageOutcome {
    Good,
    Neutral,
    Bad,
}

impl PassageOutcome {
    pub const ALL: [PassageOutcome; 3] =
        [PassageOutcome::Good, PassageOutcome::Neutral, PassageOutcome::Bad];
}

/// The server-drawn result of one secret passage use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageDraw {
    pub outcome: PassageOutcome,
    pub text: String,
}

/// Payload of a `turn_action` event.
///
/// On the wire the variant is the `action` field:
///
/// ```json
/// { "action": "reveal_clue", "clueIndex": 3 }
/// ```
///
/// Fields the server is authoritative for (`turnOrder`, `passage`) may be
/// absent in what a phone sends; the API fills them before persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum TurnAction {
    /// Flips the session to active and freezes the turn order.
    StartGame {
        #[serde(default)]
        turn_order: Vec<TurnSlot>,
    },

    /// Reveals one clue from the shared deck.
    RevealClue { clue_index: u32 },

    /// A theory voiced out loud. Confirms the end of the turn.
    Suggestion {
        suspect: String,
        item: String,
        location: String,
        time: String,
    },

    /// At most once per turn.
    SecretPassage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passage: Option<PassageDraw>,
    },

    /// Reads a confidential note. The first read of a note ends the turn.
    ReadInspectorNote { note_id: String },

    /// The host hands the turn to another player. Written by the server
    /// for `POST /sessions/{code}/turn`, never accepted from a phone.
    SetTurn { suspect_id: SuspectId },
}

/// Payload of an `accusation` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accusation {
    pub suspect: String,
    pub item: String,
    pub location: String,
    pub time: String,
    /// Filled in by the server after grading. Anything a phone sends here
    /// is overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_count: Option<u8>,
}

/// Any action a phone can submit, typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    Turn(TurnAction),
    Accuse(Accusation),
}

impl GameAction {
    /// Parses an event `type` and raw payload into a typed action.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidPayload`] when the payload doesn't match
    /// the shape of its event type, or names an unknown action.
    pub fn from_wire(
        kind: EventKind,
        payload: &Value,
    ) -> Result<Self, ProtocolError> {
        let action = match kind {
            EventKind::TurnAction => {
                TurnAction::deserialize(payload).map(GameAction::Turn)
            }
            EventKind::Accusation => {
                Accusation::deserialize(payload).map(GameAction::Accuse)
            }
        }
        .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;

        action.validate()?;
        Ok(action)
    }

    /// The event type this action is stored under.
    pub fn kind(&self) -> EventKind {
        match self {
            GameAction::Turn(_) => EventKind::TurnAction,
            GameAction::Accuse(_) => EventKind::Accusation,
        }
    }

    pub fn is_start_game(&self) -> bool {
        matches!(self, GameAction::Turn(TurnAction::StartGame { .. }))
    }

    /// Actions only the server writes on the host's behalf.
    pub fn is_host_only(&self) -> bool {
        matches!(self, GameAction::Turn(TurnAction::SetTurn { .. }))
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            GameAction::Turn(TurnAction::StartGame { .. }) => "start_game",
            GameAction::Turn(TurnAction::RevealClue { .. }) => "reveal_clue",
            GameAction::Turn(TurnAction::Suggestion { .. }) => "suggestion",
            GameAction::Turn(TurnAction::SecretPassage { .. }) => {
                "secret_passage"
            }
            GameAction::Turn(TurnAction::ReadInspectorNote { .. }) => {
                "read_inspector_note"
            }
            GameAction::Turn(TurnAction::SetTurn { .. }) => "set_turn",
            GameAction::Accuse(_) => "accusation",
        }
    }

    /// Serializes back into the untyped payload stored on the event.
    pub fn to_payload(&self) -> Result<Value, ProtocolError> {
        match self {
            GameAction::Turn(action) => serde_json::to_value(action),
            GameAction::Accuse(accusation) => serde_json::to_value(accusation),
        }
        .map_err(ProtocolError::Encode)
    }

    /// Structural checks serde can't express: named fields must not be
    /// blank.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            GameAction::Turn(TurnAction::Suggestion {
                suspect,
                item,
                location,
                time,
            })
            | GameAction::Accuse(Accusation {
                suspect,
                item,
                location,
                time,
                ..
            }) => {
                for (field, value) in [
                    ("suspect", suspect),
                    ("item", item),
                    ("location", location),
                    ("time", time),
                ] {
                    if value.trim().is_empty() {
                        return Err(ProtocolError::InvalidPayload(format!(
                            "{field} must not be empty"
                        )));
                    }
                }
                Ok(())
            }
            GameAction::Turn(TurnAction::ReadInspectorNote { note_id }) => {
                if note_id.trim().is_empty() {
                    return Err(ProtocolError::InvalidPayload(
                        "noteId must not be empty".into(),
                    ));
                }
                Ok(())
            }
            GameAction::Turn(TurnAction::SetTurn { suspect_id }) => {
                if suspect_id.as_str().trim().is_empty() {
                    return Err(ProtocolError::InvalidPayload(
                        "suspectId must not be empty".into(),
                    ));
                }
                Ok(())
            }
            GameAction::Turn(
                TurnAction::StartGame { .. }
                | TurnAction::RevealClue { .. }
                | TurnAction::SecretPassage { .. },
            ) => Ok(()),
        }
    }
}

impl Event {
    /// The typed action carried by this event.
    pub fn action(&self) -> Result<GameAction, ProtocolError> {
        GameAction::from_wire(self.kind, &self.payload)
    }
}
