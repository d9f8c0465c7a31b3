//! The fold of a session's event log into turn state.
//!
//! [`TurnState`] has two halves that must agree:
//!
//! - [`check`](TurnState::check) — may this player do this now? Pure;
//!   the server calls it before persisting anything.
//! - [`apply`](TurnState::apply) — the state after an accepted action.
//!   Infallible; every device calls it for every event in the log.
//!
//! Because `apply` never fails, a log written by a correct server folds
//! the same way everywhere, including on a phone that missed half the
//! game and is replaying it after a reconnect.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use casefile_protocol::{
    Accusation, Event, EventId, GameAction, PlayerId, SuspectId, TurnAction,
    TurnSlot,
};
use serde::{Deserialize, Serialize};

use crate::{GameRules, SOLVED_COUNT, TurnError};

/// Where the game is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Active,
    /// Someone accused with all four fields right.
    Solved { by: PlayerId },
    /// The session was closed mid-game.
    Abandoned,
}

/// Actions that may be taken at most once per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneShotKind {
    SecretPassage,
}

/// Derived turn state.
#[derive(Debug, Clone)]
pub struct TurnState {
    phase: Phase,
    turn_order: Vec<TurnSlot>,
    /// Index into `turn_order` of the player whose turn it is.
    current: usize,
    /// Completed turns. Starts at 0 when the game starts.
    turn_count: u32,
    /// One-shot actions used, keyed by the turn they were used in.
    one_shots: HashSet<(u32, OneShotKind)>,
    revealed: BTreeSet<u32>,
    notes_read: BTreeMap<PlayerId, BTreeSet<String>>,
    accusations: u32,
    wrong_accusations: u32,
    last_event_id: Option<EventId>,
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Lobby,
            turn_order: Vec::new(),
            current: 0,
            turn_count: 0,
            one_shots: HashSet::new(),
            revealed: BTreeSet::new(),
            notes_read: BTreeMap::new(),
            accusations: 0,
            wrong_accusations: 0,
            last_event_id: None,
        }
    }

    /// Folds a whole log, oldest first.
    ///
    /// # Errors
    /// [`TurnError::Payload`] if an event payload doesn't parse.
    pub fn fold<'a>(
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Result<Self, TurnError> {
        let mut state = Self::new();
        for event in events {
            state.apply_event(event)?;
        }
        Ok(state)
    }

    /// Applies one event from the log.
    ///
    /// Events at or below the last applied id are ignored, so feeding a
    /// replay that overlaps what was already folded is harmless. Returns
    /// whether the event was applied.
    ///
    /// Every log opens with `start_game`. On an empty fold anything else
    /// is the middle of a log whose head is missing, so it is skipped and
    /// leaves `last_event_id` alone; the caller backfills from the start.
    pub fn apply_event(&mut self, event: &Event) -> Result<bool, TurnError> {
        if self.last_event_id.is_some_and(|last| event.id <= last) {
            return Ok(false);
        }
        let action = event.action()?;
        if self.last_event_id.is_none() && !action.is_start_game() {
            tracing::debug!(event_id = %event.id, "event before start_game, skipped");
            return Ok(false);
        }
        self.apply(event.player_id, &action);
        self.last_event_id = Some(event.id);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // check
    // -----------------------------------------------------------------------

    /// Whether `player` may take `action` now.
    ///
    /// `available_notes` is the set of inspector notes the host has made
    /// readable.
    pub fn check(
        &self,
        player: PlayerId,
        action: &GameAction,
        rules: &GameRules,
        available_notes: &BTreeSet<String>,
    ) -> Result<(), TurnError> {
        if let GameAction::Turn(TurnAction::StartGame { turn_order }) = action {
            return match self.phase {
                Phase::Lobby if turn_order.is_empty() => {
                    Err(TurnError::EmptyTurnOrder)
                }
                Phase::Lobby => Ok(()),
                _ => Err(TurnError::AlreadyStarted),
            };
        }

        match self.phase {
            Phase::Lobby => return Err(TurnError::NotStarted),
            Phase::Solved { .. } | Phase::Abandoned => {
                return Err(TurnError::GameOver);
            }
            Phase::Active => {}
        }

        match action {
            GameAction::Turn(TurnAction::StartGame { .. }) => {
                Err(TurnError::AlreadyStarted)
            }
            GameAction::Turn(TurnAction::RevealClue { clue_index }) => {
                self.require_turn(player)?;
                if *clue_index >= rules.total_clues {
                    return Err(TurnError::ClueOutOfRange {
                        index: *clue_index,
                        total: rules.total_clues,
                    });
                }
                if self.revealed.contains(clue_index) {
                    return Err(TurnError::ClueAlreadyRevealed(*clue_index));
                }
                Ok(())
            }
            GameAction::Turn(TurnAction::Suggestion { .. }) => {
                self.require_turn(player)
            }
            GameAction::Turn(TurnAction::SecretPassage { .. }) => {
                self.require_turn(player)?;
                if self.one_shot_used(OneShotKind::SecretPassage) {
                    return Err(TurnError::OneShotUsed(
                        OneShotKind::SecretPassage,
                    ));
                }
                Ok(())
            }
            GameAction::Turn(TurnAction::ReadInspectorNote { note_id }) => {
                if !available_notes.contains(note_id) {
                    return Err(TurnError::NoteUnavailable(note_id.clone()));
                }
                // Re-reading a note is free, at any time.
                if self.has_read(player, note_id) {
                    return Ok(());
                }
                self.require_turn(player)
            }
            GameAction::Accuse(_) => self.require_turn(player),
            // The host may hand the turn to anyone in the order.
            GameAction::Turn(TurnAction::SetTurn { suspect_id }) => {
                if self.turn_order.iter().any(|s| &s.suspect_id == suspect_id) {
                    Ok(())
                } else {
                    Err(TurnError::NotInTurnOrder(suspect_id.clone()))
                }
            }
        }
    }

    fn require_turn(&self, player: PlayerId) -> Result<(), TurnError> {
        match self.current_slot() {
            Some(slot) if slot.player_id == player => Ok(()),
            slot => Err(TurnError::NotYourTurn {
                player,
                current: slot.map(|s| s.suspect_id.clone()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // apply
    // -----------------------------------------------------------------------

    /// The state after `player` took `action`.
    ///
    /// Assumes the action was accepted by [`check`](Self::check) when it
    /// was persisted. Actions that would make no sense in the current
    /// phase are ignored rather than rejected.
    pub fn apply(&mut self, player: PlayerId, action: &GameAction) {
        match action {
            GameAction::Turn(TurnAction::StartGame { turn_order }) => {
                if self.phase != Phase::Lobby {
                    return;
                }
                self.phase = Phase::Active;
                self.turn_order = turn_order.clone();
                self.current = 0;
                self.turn_count = 0;
                tracing::debug!(players = turn_order.len(), "game started");
            }
            _ if self.phase != Phase::Active => {}
            GameAction::Turn(TurnAction::RevealClue { clue_index }) => {
                self.revealed.insert(*clue_index);
            }
            GameAction::Turn(TurnAction::Suggestion { .. }) => {
                self.advance();
            }
            GameAction::Turn(TurnAction::SecretPassage { .. }) => {
                self.one_shots
                    .insert((self.turn_count, OneShotKind::SecretPassage));
            }
            GameAction::Turn(TurnAction::ReadInspectorNote { note_id }) => {
                let first_read = self
                    .notes_read
                    .entry(player)
                    .or_default()
                    .insert(note_id.clone());
                if first_read {
                    self.advance();
                }
            }
            GameAction::Turn(TurnAction::SetTurn { suspect_id }) => {
                self.set_current_suspect(suspect_id);
            }
            GameAction::Accuse(Accusation { correct_count, .. }) => {
                self.accusations += 1;
                if *correct_count == Some(SOLVED_COUNT) {
                    self.phase = Phase::Solved { by: player };
                    tracing::info!(%player, "case solved");
                } else {
                    self.wrong_accusations += 1;
                    self.advance();
                }
            }
        }
    }

    /// Marks the game as abandoned if it was in progress.
    pub fn close(&mut self) {
        if self.phase == Phase::Active {
            self.phase = Phase::Abandoned;
        }
    }

    /// Hands the turn to `suspect`, starting a new turn.
    ///
    /// Only while the game is active and `suspect` is in the turn order.
    /// Returns whether the pointer moved.
    pub fn set_current_suspect(&mut self, suspect: &SuspectId) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        match self
            .turn_order
            .iter()
            .position(|slot| &slot.suspect_id == suspect)
        {
            Some(index) if index != self.current => {
                self.move_to(index);
                tracing::debug!(%suspect, turn = self.turn_count, "turn handed over");
                true
            }
            _ => false,
        }
    }

    fn advance(&mut self) {
        if self.turn_order.is_empty() {
            return;
        }
        self.move_to((self.current + 1) % self.turn_order.len());
    }

    fn move_to(&mut self, index: usize) {
        self.current = index;
        self.turn_count += 1;
        let turn = self.turn_count;
        self.one_shots.retain(|(t, _)| *t == turn);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Solved { .. } | Phase::Abandoned)
    }

    pub fn turn_order(&self) -> &[TurnSlot] {
        &self.turn_order
    }

    /// The slot whose turn it is. `None` outside the active phase.
    pub fn current_slot(&self) -> Option<&TurnSlot> {
        if self.phase != Phase::Active {
            return None;
        }
        self.turn_order.get(self.current)
    }

    pub fn current_suspect(&self) -> Option<&SuspectId> {
        self.current_slot().map(|slot| &slot.suspect_id)
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn one_shot_used(&self, kind: OneShotKind) -> bool {
        self.one_shots.contains(&(self.turn_count, kind))
    }

    pub fn revealed_clues(&self) -> &BTreeSet<u32> {
        &self.revealed
    }

    /// Fraction of the deck revealed, in `0.0..=1.0`.
    pub fn reveal_ratio(&self, total_clues: u32) -> f64 {
        if total_clues == 0 {
            return 0.0;
        }
        self.revealed.len() as f64 / f64::from(total_clues)
    }

    pub fn has_read(&self, player: PlayerId, note_id: &str) -> bool {
        self.notes_read
            .get(&player)
            .is_some_and(|notes| notes.contains(note_id))
    }

    pub fn accusations(&self) -> u32 {
        self.accusations
    }

    pub fn wrong_accusations(&self) -> u32 {
        self.wrong_accusations
    }

    /// Id of the newest event folded in, `None` for an empty log.
    pub fn last_event_id(&self) -> Option<EventId> {
        self.last_event_id
    }
}
