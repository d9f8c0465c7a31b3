//! Per-game configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameRules
// ---------------------------------------------------------------------------

/// Rules the server checks actions against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRules {
    /// Size of the clue deck. Valid clue indices are `0..total_clues`.
    pub total_clues: u32,

    pub schedule: InterruptionSchedule,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            total_clues: 30,
            schedule: InterruptionSchedule::default(),
        }
    }
}

impl GameRules {
    pub fn with_total_clues(total_clues: u32) -> Self {
        Self {
            total_clues,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// InterruptionSchedule
// ---------------------------------------------------------------------------

/// Fires once the game clock (net of pauses) passes `after`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedInterruption {
    pub after: Duration,
    pub id: String,
    pub message: String,
}

/// Fires once the revealed-clue ratio reaches `fraction`, and makes
/// `note_id` readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealMilestone {
    pub fraction: f64,
    pub note_id: String,
    pub message: String,
}

/// Everything that can interrupt a game, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptionSchedule {
    pub timed: Vec<TimedInterruption>,
    pub reveal_milestones: Vec<RevealMilestone>,

    /// Completed turns before the rooms may unlock. The unlock also
    /// needs more than half of the clues revealed.
    pub rooms_unlock_after_turns: u32,
    pub rooms_unlock_message: String,
}

impl Default for InterruptionSchedule {
    fn default() -> Self {
        Self {
            timed: vec![
                TimedInterruption {
                    after: Duration::from_secs(15 * 60),
                    id: "blackout".into(),
                    message: "The lights go out across the manor.".into(),
                },
                TimedInterruption {
                    after: Duration::from_secs(30 * 60),
                    id: "scream".into(),
                    message: "A scream echoes from the upper floor.".into(),
                },
            ],
            reveal_milestones: vec![
                RevealMilestone {
                    fraction: 0.5,
                    note_id: "inspector-1".into(),
                    message: "The inspector has left a confidential note."
                        .into(),
                },
                RevealMilestone {
                    fraction: 0.65,
                    note_id: "inspector-2".into(),
                    message: "A second note arrives from the inspector."
                        .into(),
                },
            ],
            rooms_unlock_after_turns: 8,
            rooms_unlock_message: "The locked wing is now open.".into(),
        }
    }
}
