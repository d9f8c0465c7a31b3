//! Accusation grading.

use casefile_protocol::{Accusation, Solution};

/// A fully correct accusation.
pub const SOLVED_COUNT: u8 = 4;

/// Counts how many of the four fields match the solution.
///
/// Comparison ignores surrounding whitespace and ASCII case, so `" Plum"`
/// matches `"plum"`.
pub fn grade(accusation: &Accusation, solution: &Solution) -> u8 {
    [
        (&accusation.suspect, &solution.suspect),
        (&accusation.item, &solution.item),
        (&accusation.location, &solution.location),
        (&accusation.time, &solution.time),
    ]
    .into_iter()
    .filter(|(guess, answer)| {
        guess.trim().eq_ignore_ascii_case(answer.trim())
    })
    .count() as u8
}
