//! The turn-based game state machine for Casefile.
//!
//! Nothing in this crate does I/O. Every device (the server before it
//! persists an action, the host screen, each phone) folds the same event
//! log through [`TurnState`] and arrives at the same answer to "whose
//! turn is it and what may they do".
//!
//! # Key types
//!
//! - [`TurnState`] — fold of the event log: turn order, turn pointer,
//!   one-shot usage, revealed clues, note reads, accusation tally
//! - [`GameRules`] / [`InterruptionSchedule`] — per-game configuration
//! - [`InterruptionScheduler`] + [`GameClock`] — when the host screen
//!   pauses the game to announce something
//! - [`grade`] — counts the matching fields of an accusation
//! - [`FeedbackPicker`] — flavor lines for a graded accusation
//! - [`PassageDeck`] — the secret passage draw
//!
//! # Phases
//!
//! ```text
//! Lobby ──(start_game)──→ Active ──(4/4 accusation)──→ Solved
//!                           └──────(session closed)──→ Abandoned
//! ```

mod clock;
mod error;
mod feedback;
mod grading;
mod passage;
mod rules;
mod schedule;
mod state;

pub use clock::GameClock;
pub use error::TurnError;
pub use feedback::FeedbackPicker;
pub use grading::{SOLVED_COUNT, grade};
pub use passage::PassageDeck;
pub use rules::{
    GameRules, InterruptionSchedule, RevealMilestone, TimedInterruption,
};
pub use schedule::{InterruptionScheduler, ROOMS_UNLOCK_ID, Trigger};
pub use state::{OneShotKind, Phase, TurnState};
