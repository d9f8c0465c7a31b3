//! Error types for the turn engine.

use casefile_protocol::{PlayerId, ProtocolError, SuspectId};

use crate::OneShotKind;

/// Why an action is not allowed right now.
///
/// Everything except [`TurnError::Payload`] and
/// [`TurnError::NoSolution`] is an *illegal turn action*: the request was
/// well-formed, the game just doesn't allow it at this point.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("the game has not started")]
    NotStarted,

    #[error("the game has already started")]
    AlreadyStarted,

    #[error("the game is over")]
    GameOver,

    #[error(
        "player {player} acted out of turn (current: {})",
        .current.as_ref().map_or("none", SuspectId::as_str)
    )]
    NotYourTurn {
        player: PlayerId,
        current: Option<SuspectId>,
    },

    #[error("{0:?} already used this turn")]
    OneShotUsed(OneShotKind),

    #[error("clue {index} is out of range (total {total})")]
    ClueOutOfRange { index: u32, total: u32 },

    #[error("clue {0} is already revealed")]
    ClueAlreadyRevealed(u32),

    #[error("inspector note {0} is not available")]
    NoteUnavailable(String),

    #[error("{0} is not in the turn order")]
    NotInTurnOrder(SuspectId),

    #[error("turn order is empty")]
    EmptyTurnOrder,

    /// The session has no secret answer to grade against.
    #[error("session has no solution to grade against")]
    NoSolution,

    /// A stored event payload couldn't be parsed during a fold.
    #[error(transparent)]
    Payload(#[from] ProtocolError),
}

impl TurnError {
    /// Whether this is a legal request refused by the game rules.
    pub fn is_illegal_action(&self) -> bool {
        !matches!(self, TurnError::Payload(_) | TurnError::NoSolution)
    }
}
