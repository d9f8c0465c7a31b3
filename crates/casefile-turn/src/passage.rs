//! The secret passage draw.
//!
//! A uniform pick of good, neutral or bad, plus a line of flavor text for
//! that outcome. Draws are independent. The result is narrative only and
//! changes nothing in [`TurnState`](crate::TurnState) beyond using up the
//! turn's passage.

use casefile_protocol::{PassageDraw, PassageOutcome};
use rand::Rng;
use rand::seq::IndexedRandom;

/// Flavor text per outcome.
#[derive(Debug, Clone)]
pub struct PassageDeck {
    good: Vec<String>,
    neutral: Vec<String>,
    bad: Vec<String>,
}

impl PassageDeck {
    /// Builds a deck from custom lines. An empty pool falls back to the
    /// outcome name as its text.
    pub fn new(good: Vec<String>, neutral: Vec<String>, bad: Vec<String>) -> Self {
        Self { good, neutral, bad }
    }

    /// Draws with the thread-local RNG.
    pub fn draw(&self) -> PassageDraw {
        self.draw_with(&mut rand::rng())
    }

    pub fn draw_with<R: Rng>(&self, rng: &mut R) -> PassageDraw {
        let outcome = PassageOutcome::ALL[rng.random_range(0..PassageOutcome::ALL.len())];
        let pool = match outcome {
            PassageOutcome::Good => &self.good,
            PassageOutcome::Neutral => &self.neutral,
            PassageOutcome::Bad => &self.bad,
        };
        let text = pool
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| format!("{outcome:?}").to_lowercase());
        PassageDraw { outcome, text }
    }
}

impl Default for PassageDeck {
    fn default() -> Self {
        let lines = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            good: lines(&[
                "You find a torn page tucked behind a loose brick.",
                "The passage lets out behind the study curtain. Nobody saw you.",
                "A forgotten candle lights the way to a useful clue.",
            ]),
            neutral: lines(&[
                "Dust and cobwebs. The passage leads back where you started.",
                "You hear footsteps overhead, then nothing.",
                "A draft, a creak, and a locked door at the far end.",
            ]),
            bad: lines(&[
                "You trip in the dark and drop your notes.",
                "The butler is waiting at the other end, arms folded.",
                "The candle goes out. You lose your bearings.",
            ]),
        }
    }
}
