//! Game clock with pause accounting.
//!
//! While an interruption is on the host screen nobody is playing, so
//! that time must not count towards the next timed interruption. The
//! clock keeps a running total of paused time and subtracts it.
//!
//! Every method takes `now` explicitly instead of reading the system
//! clock, which keeps the scheduler deterministic under test.

use std::time::{Duration, Instant};

/// Elapsed play time, net of pauses.
#[derive(Debug, Clone, Default)]
pub struct GameClock {
    started_at: Option<Instant>,
    paused_since: Option<Instant>,
    paused_total: Duration,
}

impl GameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the clock. Starting a running clock does nothing.
    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
            tracing::debug!("game clock started");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Pauses the clock. Idempotent.
    pub fn pause(&mut self, now: Instant) {
        if self.started_at.is_some() && self.paused_since.is_none() {
            self.paused_since = Some(now);
            tracing::debug!("game clock paused");
        }
    }

    /// Resumes after a pause, adding the pause length to the paused
    /// total. Idempotent.
    pub fn resume(&mut self, now: Instant) {
        if let Some(since) = self.paused_since.take() {
            let paused = now.saturating_duration_since(since);
            self.paused_total += paused;
            tracing::debug!(paused_ms = paused.as_millis() as u64, "game clock resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_since.is_some()
    }

    /// Play time at `now`. Zero before [`start`](Self::start); frozen
    /// while paused.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.paused_since.unwrap_or(now);
        end.saturating_duration_since(started)
            .saturating_sub(self.paused_total)
    }
}
