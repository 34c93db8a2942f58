//! Configuration constants for the quiz
//!
//! Limits and default timings used across the crate, grouped by the
//! component they constrain.

/// Question bank constants
pub mod question {
    /// Number of answer options every question carries
    pub const OPTION_COUNT: usize = 4;
    /// Highest valid correct option index
    pub const LAST_OPTION_INDEX: usize = OPTION_COUNT - 1;
    /// Maximum number of questions in a bank
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a question or option text in characters
    pub const MAX_TEXT_LENGTH: usize = 300;
}

/// Quiz session timing constants
pub mod session {
    /// Default countdown budget per question in seconds
    pub const TIME_LIMIT: u64 = 15;
    /// Minimum configurable countdown budget in seconds
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum configurable countdown budget in seconds
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Interval between two countdown ticks in milliseconds
    pub const TICK: u64 = 1000;
    /// Default wait between locking a question and advancing, in milliseconds
    pub const PACING_DELAY: u64 = 600;
    /// Maximum configurable pacing delay in milliseconds
    pub const MAX_PACING_DELAY: u64 = 5000;
}

/// Registration constants
pub mod registration {
    /// Minimum length of a trimmed display name in characters
    pub const MIN_NAME_LENGTH: usize = 2;
}

/// Leaderboard constants
pub mod leaderboard {
    /// Default number of ranked results fetched from the store
    pub const LIMIT: usize = 100;
    /// Maximum configurable number of ranked results
    pub const MAX_LIMIT: usize = 1000;
}

/// Results page constants
pub mod results {
    /// Minimum percentage for the outstanding band
    pub const OUTSTANDING: u32 = 90;
    /// Minimum percentage for the great band
    pub const GREAT: u32 = 70;
    /// Minimum percentage for the good band
    pub const GOOD: u32 = 50;
}

/// Administrative dashboard constants
pub mod admin {
    /// Maximum number of result rows sent to the dashboard
    pub const ROW_LIMIT: usize = 500;
}
