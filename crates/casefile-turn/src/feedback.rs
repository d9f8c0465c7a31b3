//! Flavor lines for graded accusations.
//!
//! There is a fixed pool per correctness bucket (0 to 4 matching
//! fields). A player never sees the same line twice for a bucket until
//! they have seen every line in it; then the bucket starts over.

use std::collections::{HashMap, HashSet};

use casefile_protocol::PlayerId;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::SOLVED_COUNT;

const BUCKETS: usize = SOLVED_COUNT as usize + 1;

/// Picks feedback lines with per-player, per-bucket history.
#[derive(Debug, Clone)]
pub struct FeedbackPicker {
    pools: [Vec<String>; BUCKETS],
    shown: HashMap<(PlayerId, u8), HashSet<usize>>,
}

impl FeedbackPicker {
    /// `pools[n]` holds the lines for `n` correct fields.
    pub fn new(pools: [Vec<String>; BUCKETS]) -> Self {
        Self {
            pools,
            shown: HashMap::new(),
        }
    }

    pub fn pick(&mut self, player: PlayerId, correct_count: u8) -> String {
        self.pick_with(player, correct_count, &mut rand::rng())
    }

    pub fn pick_with<R: Rng>(
        &mut self,
        player: PlayerId,
        correct_count: u8,
        rng: &mut R,
    ) -> String {
        let bucket = correct_count.min(SOLVED_COUNT);
        let pool = &self.pools[bucket as usize];
        if pool.is_empty() {
            return format!("{bucket} of {SOLVED_COUNT} correct.");
        }

        let history = self.shown.entry((player, bucket)).or_default();
        if history.len() >= pool.len() {
            tracing::debug!(%player, bucket, "feedback pool exhausted, cycling");
            history.clear();
        }

        let unseen: Vec<usize> =
            (0..pool.len()).filter(|i| !history.contains(i)).collect();
        // `unseen` is non-empty: the history was cleared if it covered
        // the whole pool.
        let index = unseen.choose(rng).copied().unwrap_or(0);
        history.insert(index);
        pool[index].clone()
    }
}

impl Default for FeedbackPicker {
    fn default() -> Self {
        let lines = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        };
        Self::new([
            lines(&[
                "Not even close. The inspector sighs.",
                "Every detail is wrong. Back to the notes.",
                "The room goes quiet. That was a wild guess.",
            ]),
            lines(&[
                "One detail holds up. The rest falls apart.",
                "You're onto something, but only just.",
                "A single thread of truth in a tangled story.",
            ]),
            lines(&[
                "Half right. The inspector raises an eyebrow.",
                "Two pieces fit. Two do not.",
                "The picture is coming together, slowly.",
            ]),
            lines(&[
                "So close. One detail is wrong.",
                "Three out of four. The culprit is sweating.",
                "Nearly there. Check that last detail.",
            ]),
            lines(&[
                "Case closed. You've solved it!",
                "Brilliant deduction. The culprit confesses.",
                "Every detail is right. Well done, detective.",
            ]),
        ])
    }
}
