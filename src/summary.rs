//! Aggregate statistics over submitted results

use std::fmt::Display;

use serde::Serialize;
use serde_with::SerializeDisplay;

use crate::leaderboard::{self, Standing};

/// Mean score over a non-empty set of results
///
/// Displays (and serializes) with one decimal place.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, SerializeDisplay)]
pub struct AverageScore(f64);

impl AverageScore {
    /// The unrounded mean
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Display for AverageScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Summary of a collection of results
///
/// Both optional fields are `None` exactly when there are no results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary<T> {
    /// Number of results
    pub participant_count: usize,
    /// Mean score
    pub average_score: Option<AverageScore>,
    /// The result that ranks first on the leaderboard
    pub top_scorer: Option<T>,
}

/// Summarizes results, picking the top scorer with the leaderboard order
pub fn summarize<T: Standing + Clone>(results: &[T]) -> Summary<T> {
    let average_score = (!results.is_empty()).then(|| {
        let total: f64 = results.iter().map(|r| f64::from(r.score())).sum();
        AverageScore(total / results.len() as f64)
    });

    Summary {
        participant_count: results.len(),
        average_score,
        top_scorer: leaderboard::top(results).cloned(),
    }
}
