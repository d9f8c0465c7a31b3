//! Interruption scheduling.
//!
//! The host screen polls the scheduler after every event and on a timer.
//! Each configured interruption fires at most once per game:
//!
//! - **timed** — the [`GameClock`] (net of pauses) passed a threshold
//! - **reveal progress** — the revealed-clue ratio reached a fraction;
//!   the milestone's inspector note becomes readable
//! - **rooms unlock** — enough turns played *and* more than half of the
//!   clues revealed
//!
//! The host pauses the clock while an interruption is displayed and
//! resumes it when the interruption is dismissed.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use casefile_protocol::{Interruption, InterruptionKind};

use crate::{GameClock, InterruptionSchedule, Phase, TurnState};

/// Id of the rooms-unlock interruption.
pub const ROOMS_UNLOCK_ID: &str = "rooms-unlock";

/// An interruption that just became due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub interruption: Interruption,
    /// Inspector note the host should make readable along with it.
    pub unlocks_note: Option<String>,
}

/// Tracks which interruptions have fired.
#[derive(Debug, Clone)]
pub struct InterruptionScheduler {
    schedule: InterruptionSchedule,
    fired_timed: BTreeSet<usize>,
    fired_milestones: BTreeSet<usize>,
    rooms_unlocked: bool,
}

impl InterruptionScheduler {
    pub fn new(schedule: InterruptionSchedule) -> Self {
        Self {
            schedule,
            fired_timed: BTreeSet::new(),
            fired_milestones: BTreeSet::new(),
            rooms_unlocked: false,
        }
    }

    pub fn rooms_unlocked(&self) -> bool {
        self.rooms_unlocked
    }

    /// [`poll`](Self::poll) with the elapsed time read from `clock`.
    pub fn poll_clock(
        &mut self,
        clock: &GameClock,
        now: Instant,
        state: &TurnState,
        total_clues: u32,
    ) -> Vec<Trigger> {
        self.poll(clock.elapsed(now), state, total_clues)
    }

    /// Everything that became due, in schedule order. Nothing fires
    /// outside the active phase.
    pub fn poll(
        &mut self,
        elapsed: Duration,
        state: &TurnState,
        total_clues: u32,
    ) -> Vec<Trigger> {
        if state.phase() != Phase::Active {
            return Vec::new();
        }

        let mut due = Vec::new();
        let ratio = state.reveal_ratio(total_clues);

        for (i, timed) in self.schedule.timed.iter().enumerate() {
            if elapsed >= timed.after && self.fired_timed.insert(i) {
                tracing::info!(id = %timed.id, elapsed_s = elapsed.as_secs(), "timed interruption due");
                due.push(Trigger {
                    interruption: Interruption {
                        id: timed.id.clone(),
                        kind: InterruptionKind::Timed,
                        message: timed.message.clone(),
                    },
                    unlocks_note: None,
                });
            }
        }

        for (i, milestone) in self.schedule.reveal_milestones.iter().enumerate() {
            if ratio >= milestone.fraction && self.fired_milestones.insert(i) {
                tracing::info!(note = %milestone.note_id, ratio, "reveal milestone reached");
                due.push(Trigger {
                    interruption: Interruption {
                        id: milestone.note_id.clone(),
                        kind: InterruptionKind::RevealProgress,
                        message: milestone.message.clone(),
                    },
                    unlocks_note: Some(milestone.note_id.clone()),
                });
            }
        }

        if !self.rooms_unlocked
            && state.turn_count() >= self.schedule.rooms_unlock_after_turns
            && ratio > 0.5
        {
            self.rooms_unlocked = true;
            tracing::info!(turns = state.turn_count(), "rooms unlocked");
            due.push(Trigger {
                interruption: Interruption {
                    id: ROOMS_UNLOCK_ID.into(),
                    kind: InterruptionKind::RoomsUnlock,
                    message: self.schedule.rooms_unlock_message.clone(),
                },
                unlocks_note: None,
            });
        }

        due
    }
}
