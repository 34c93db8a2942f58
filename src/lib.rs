//! # Quizboard
//!
//! This library provides the core logic for a timed multiple-choice quiz:
//! registration checks, a per-question countdown state machine, scoring,
//! leaderboard ranking, result aggregation and the gateway through which
//! finished sessions are persisted. Hosts (a browser through WASM, a terminal,
//! a server) own timers and rendering; the crate talks to them through
//! scheduled alarms and the [`tunnel::Tunnel`] trait.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod app;
pub mod id;
pub mod leaderboard;
pub mod publish;
pub mod quiz;
pub mod registration;
pub mod store;
pub mod summary;
pub mod tunnel;

/// Messages sent to bring a freshly attached view in line with the current state
///
/// A host that re-renders from scratch (page reload, reconnect) asks for one
/// of these instead of replaying every update.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum SyncMessage {
    /// Stage-level views (landing, registration, results, leaderboard, dashboard)
    App(app::SyncMessage),
    /// The question currently being played
    Session(quiz::session::SyncMessage),
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Messages sent to update part of what the participant currently sees
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Stage-level updates
    App(app::UpdateMessage),
    /// Question, countdown and lock updates
    Session(quiz::session::UpdateMessage),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Alarm messages for timed events
///
/// Hosts schedule these when asked to and hand them back once the requested
/// delay has passed. Alarms that arrive late or for a question that has moved
/// on are ignored, so a host may deliver them without any bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Countdown and pacing alarms of a quiz session
    Session(quiz::session::AlarmMessage),
}

impl AlarmMessage {
    /// The session this alarm belongs to
    ///
    /// Hosts use this to drop pending alarms of a session that was torn down.
    pub fn session(&self) -> id::SessionId {
        match self {
            Self::Session(alarm) => alarm.session(),
        }
    }
}

/// A truncated vector that maintains the exact count while limiting displayed items
///
/// Useful for showing "250 participants" while only sending the first 100 rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated vector from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to include in the truncated vector
    /// * `exact_count` - The exact total count of items (may be larger than limit)
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Maps a function over the items in the truncated vector
    pub fn map<F, U>(self, f: F) -> TruncatedVec<U>
    where
        F: Fn(T) -> U,
    {
        TruncatedVec {
            exact_count: self.exact_count,
            items: self.items.into_iter().map(f).collect_vec(),
        }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Whether there is nothing at all to show
    pub fn is_empty(&self) -> bool {
        self.exact_count == 0
    }
}
