//! The host screen's side of the game.
//!
//! The host owns the things the server does not: the play clock, the
//! interruption queue and the feedback line shown after an accusation.
//! It pushes the results to the server through the host control
//! endpoints (`/interruption`, `/inspector-note`, `/accusation-result`).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use casefile_protocol::{AccusationResult, Event, GameAction};
use casefile_turn::{
    FeedbackPicker, GameClock, GameRules, InterruptionScheduler, Phase,
    Trigger, TurnState,
};

use crate::ClientError;

/// Clock, interruption queue and feedback picker for one game.
#[derive(Debug)]
pub struct HostConsole {
    rules: GameRules,
    clock: GameClock,
    scheduler: InterruptionScheduler,
    feedback: FeedbackPicker,
    /// Triggers that came due while another was on screen.
    pending: VecDeque<Trigger>,
    showing: Option<Trigger>,
}

impl HostConsole {
    pub fn new(rules: GameRules) -> Self {
        Self::with_feedback(rules, FeedbackPicker::default())
    }

    pub fn with_feedback(rules: GameRules, feedback: FeedbackPicker) -> Self {
        let scheduler = InterruptionScheduler::new(rules.schedule.clone());
        Self {
            rules,
            clock: GameClock::new(),
            scheduler,
            feedback,
            pending: VecDeque::new(),
            showing: None,
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Play time so far, net of interruptions.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.clock.elapsed(now)
    }

    /// Checks the schedule against the folded state.
    ///
    /// The clock starts the first time the game is seen active. Returns
    /// the interruption to put on screen now, if any; the clock stays
    /// paused until [`dismiss`](Self::dismiss). Triggers that fire while
    /// one is showing wait their turn.
    pub fn poll(&mut self, now: Instant, state: &TurnState) -> Option<&Trigger> {
        if state.phase() == Phase::Active {
            self.clock.start(now);
        }
        let due = self.scheduler.poll_clock(
            &self.clock,
            now,
            state,
            self.rules.total_clues,
        );
        self.pending.extend(due);

        if self.showing.is_some() {
            return None;
        }
        let next = self.pending.pop_front()?;
        tracing::info!(id = %next.interruption.id, queued = self.pending.len(), "showing interruption");
        self.clock.pause(now);
        self.showing = Some(next);
        self.showing.as_ref()
    }

    /// The interruption on screen, if any.
    pub fn showing(&self) -> Option<&Trigger> {
        self.showing.as_ref()
    }

    /// Takes the current interruption off screen and restarts the clock.
    pub fn dismiss(&mut self, now: Instant) -> Option<Trigger> {
        let trigger = self.showing.take()?;
        self.clock.resume(now);
        Some(trigger)
    }

    /// Builds the result to publish for an accusation event. Returns
    /// `None` for other events and for accusations the server has not
    /// graded.
    pub fn accusation_result(
        &mut self,
        event: &Event,
    ) -> Result<Option<AccusationResult>, ClientError> {
        let GameAction::Accuse(accusation) = event.action()? else {
            return Ok(None);
        };
        let Some(correct_count) = accusation.correct_count else {
            return Ok(None);
        };
        let feedback = self.feedback.pick(event.player_id, correct_count);
        Ok(Some(AccusationResult {
            player_id: event.player_id,
            correct_count,
            feedback,
        }))
    }
}
