//! Leaderboard ranking
//!
//! Orders finished results by score (highest first) and then by completion
//! time (fastest first). Results that tie on both keys keep the order they
//! were given in, so ranking the same input twice always gives the same
//! output. Ranks are positional: tied results get consecutive ranks.

use std::cmp::Ordering;

use itertools::Itertools;
use serde::Serialize;

use crate::{id::ResultId, quiz::session::SessionResult, store::PersistedResult};

/// Anything that can be placed on the leaderboard
pub trait Standing {
    /// Number of correct answers
    fn score(&self) -> u32;

    /// Seconds the participant needed to finish
    fn completion_time_seconds(&self) -> u64;
}

impl Standing for SessionResult {
    fn score(&self) -> u32 {
        self.score
    }

    fn completion_time_seconds(&self) -> u64 {
        self.completion_time_seconds
    }
}

impl<T: Standing + ?Sized> Standing for &T {
    fn score(&self) -> u32 {
        (**self).score()
    }

    fn completion_time_seconds(&self) -> u64 {
        (**self).completion_time_seconds()
    }
}

/// Leaderboard order: score descending, then completion time ascending
pub fn standing_order<T: Standing>(a: &T, b: &T) -> Ordering {
    b.score()
        .cmp(&a.score())
        .then_with(|| a.completion_time_seconds().cmp(&b.completion_time_seconds()))
}

/// A result annotated with its position on the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry<T> {
    /// 1-based position
    pub rank: usize,
    /// The ranked result
    #[serde(flatten)]
    pub entry: T,
}

/// Ranks results by leaderboard order
///
/// # Examples
///
/// ```rust
/// use quizboard::leaderboard::{rank, Standing};
///
/// struct Run(u32, u64);
///
/// impl Standing for Run {
///     fn score(&self) -> u32 { self.0 }
///     fn completion_time_seconds(&self) -> u64 { self.1 }
/// }
///
/// let ranked = rank([Run(8, 50), Run(8, 40), Run(9, 99)]);
/// let order: Vec<_> = ranked.iter().map(|e| (e.rank, e.entry.0, e.entry.1)).collect();
/// assert_eq!(order, [(1, 9, 99), (2, 8, 40), (3, 8, 50)]);
/// ```
pub fn rank<T: Standing, I: IntoIterator<Item = T>>(results: I) -> Vec<LeaderboardEntry<T>> {
    results
        .into_iter()
        .sorted_by(standing_order)
        .enumerate()
        .map(|(position, entry)| LeaderboardEntry {
            rank: position + 1,
            entry,
        })
        .collect_vec()
}

/// The result that would be ranked first, or `None` for no results
///
/// Among equal results the earliest one wins, matching [`rank`].
pub fn top<T: Standing, I: IntoIterator<Item = T>>(results: I) -> Option<T> {
    results.into_iter().min_by(standing_order)
}

/// Whether `id` is the first entry of the ranked snapshot
///
/// The snapshot has to be read after the result was stored, otherwise the
/// result cannot be in it and this is trivially `false`.
pub fn is_top_scorer(id: ResultId, results: &[PersistedResult]) -> bool {
    top(results).is_some_and(|first| first.id == id)
}
