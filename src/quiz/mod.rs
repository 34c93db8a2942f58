//! Questions and the timed session that plays them
//!
//! This module contains the static question bank and the per-participant
//! session state machine that walks through it one question at a time,
//! enforcing the countdown and collecting answers.

pub mod bank;
pub mod session;
