//! Result persistence gateway
//!
//! Finished results are appended to a shared store owned by an external
//! backend. The quiz never edits stored rows: it inserts through
//! [`ResultStore::submit`] and reads back through the two fetch operations.
//! [`MemoryStore`] is an in-process implementation for tests and demos.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    id::ResultId,
    leaderboard::{Standing, standing_order},
    quiz::session::SessionResult,
};

/// A result as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedResult {
    /// Identifier assigned on insert
    pub id: ResultId,
    /// When the backend accepted the result
    pub submitted_at: DateTime<Utc>,
    /// The submitted result
    #[serde(flatten)]
    pub result: SessionResult,
}

impl Standing for PersistedResult {
    fn score(&self) -> u32 {
        self.result.score
    }

    fn completion_time_seconds(&self) -> u64 {
        self.result.completion_time_seconds
    }
}

/// Errors reported by a result store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The backend could not be reached
    #[error("result store is unavailable")]
    Unavailable,
    /// The backend rejected or failed the request
    #[error("result store failed: {0}")]
    Backend(String),
}

/// The operations the quiz needs from the result backend
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Appends a finished result and returns it with its id and timestamp
    ///
    /// # Errors
    ///
    /// Returns a `PersistenceError` on any backend failure.
    async fn submit(&self, result: SessionResult) -> Result<PersistedResult, PersistenceError>;

    /// Reads at most `limit` results in leaderboard order
    ///
    /// # Errors
    ///
    /// Returns a `PersistenceError` on any backend failure.
    async fn fetch_ranked(&self, limit: usize) -> Result<Vec<PersistedResult>, PersistenceError>;

    /// Reads every result, most recently submitted first
    ///
    /// # Errors
    ///
    /// Returns a `PersistenceError` on any backend failure.
    async fn fetch_all(&self) -> Result<Vec<PersistedResult>, PersistenceError>;
}

/// A result store kept in memory
///
/// It can be switched into a failing mode in which every operation returns
/// [`PersistenceError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<PersistedResult>>,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following operation fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored results
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether nothing has been stored
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn submit(&self, result: SessionResult) -> Result<PersistedResult, PersistenceError> {
        self.check()?;
        let persisted = PersistedResult {
            id: ResultId::new(),
            submitted_at: Utc::now(),
            result,
        };
        self.rows.write().await.push(persisted.clone());
        Ok(persisted)
    }

    async fn fetch_ranked(&self, limit: usize) -> Result<Vec<PersistedResult>, PersistenceError> {
        self.check()?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .sorted_by(|a, b| standing_order(a, b))
            .take(limit)
            .cloned()
            .collect_vec())
    }

    async fn fetch_all(&self) -> Result<Vec<PersistedResult>, PersistenceError> {
        self.check()?;
        // newest insert first among equal timestamps
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .rev()
            .sorted_by(|a, b| b.submitted_at.cmp(&a.submitted_at))
            .cloned()
            .collect_vec())
    }
}
