//! Publishing a finished result
//!
//! Runs after a session completes: the result is submitted, and only once the
//! store has answered is the ranked snapshot read to decide whether the new
//! result is the top scorer. Hosts run this in the background and feed the
//! [`Publication`] back into the app; nothing here blocks the results view.

use tracing::{error, info, warn};

use crate::{
    id::{ResultId, SessionId},
    leaderboard,
    quiz::session::SessionResult,
    store::{PersistedResult, ResultStore},
};

/// Outcome of publishing a result
///
/// Tagged with the session that produced the result, so the app only ever
/// decorates that session. Failures carry no stored result and no badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// The session the published result came from
    pub session: SessionId,
    /// The stored result, if the submit succeeded
    pub submitted: Option<PersistedResult>,
    /// Whether the stored result ranks first right after it was stored
    pub top_scorer: bool,
}

impl Publication {
    /// A publication whose submit failed
    pub fn failed(session: SessionId) -> Self {
        Self {
            session,
            submitted: None,
            top_scorer: false,
        }
    }

    /// Identifier of the stored result
    pub fn id(&self) -> Option<ResultId> {
        self.submitted.as_ref().map(|submitted| submitted.id)
    }
}

/// Submits `result` and then checks it against the top `limit` ranked results
///
/// Store failures are logged and never returned.
pub async fn publish<S: ResultStore + ?Sized>(
    store: &S,
    session: SessionId,
    result: SessionResult,
    limit: usize,
) -> Publication {
    let submitted = match store.submit(result).await {
        Ok(submitted) => submitted,
        Err(error) => {
            error!(%error, %session, "failed to submit result");
            return Publication::failed(session);
        }
    };
    info!(id = %submitted.id, score = submitted.result.score, "result submitted");

    let top_scorer = match store.fetch_ranked(limit).await {
        Ok(ranked) => leaderboard::is_top_scorer(submitted.id, &ranked),
        Err(error) => {
            warn!(%error, id = %submitted.id, "failed to read leaderboard after submitting");
            false
        }
    };

    Publication {
        session,
        submitted: Some(submitted),
        top_scorer,
    }
}
