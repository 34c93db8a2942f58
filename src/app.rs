//! Application flow
//!
//! This module ties the components together into the screens a participant
//! moves through: landing, registration, the quiz itself, results, the
//! leaderboard and the administrative dashboard. The app owns at most one
//! quiz session at a time; it is created when registration is accepted and
//! dropped on retake.
//!
//! Data that lives in the result store reaches the app through the host:
//! the host fetches, then hands the outcome (success or failure) to
//! [`App::show_leaderboard`], [`App::open_admin`] or
//! [`App::publication_ready`]. Store failures only ever produce empty views.

use std::{fmt::Debug, time::Duration};

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{debug, info, warn};

use crate::{
    AlarmMessage, TruncatedVec,
    id::{ResultId, SessionId},
    leaderboard::{self, LeaderboardEntry},
    publish::Publication,
    quiz::{
        bank::QuestionBank,
        session::{QuizSession, SessionAnswer, SessionResult, Timing},
    },
    registration::{self, ValidationErrors},
    store::{PersistedResult, PersistenceError},
    summary::{self, Summary},
    tunnel::Tunnel,
};

/// The screen the participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Welcome screen
    Landing,
    /// Registration form
    Register,
    /// A quiz session is being played
    Quiz,
    /// Score and per-question review of the finished session
    Results,
    /// Ranked results of everyone
    Leaderboard,
    /// Administrative dashboard
    Admin,
}

/// Tunable settings of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Options {
    /// Countdown and pacing of every session
    #[garde(dive)]
    timing: Timing,
    /// Number of ranked results fetched for the leaderboard and the top-scorer check
    #[garde(range(min = 1, max = crate::constants::leaderboard::MAX_LIMIT))]
    leaderboard_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            leaderboard_limit: crate::constants::leaderboard::LIMIT,
        }
    }
}

impl Options {
    /// Creates options; they are checked by [`App::new`]
    pub fn new(timing: Timing, leaderboard_limit: usize) -> Self {
        Self {
            timing,
            leaderboard_limit,
        }
    }

    /// Countdown and pacing of every session
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Number of ranked results to fetch
    pub fn leaderboard_limit(&self) -> usize {
        self.leaderboard_limit
    }
}

/// How well a participant did, by percentage of correct answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    /// 90% or more
    Outstanding,
    /// 70% or more
    Great,
    /// 50% or more
    Good,
    /// Below 50%
    KeepPracticing,
}

impl Band {
    /// The band a percentage falls into
    pub fn from_percentage(percentage: u32) -> Self {
        use crate::constants::results::{GOOD, GREAT, OUTSTANDING};

        match percentage {
            p if p >= OUTSTANDING => Self::Outstanding,
            p if p >= GREAT => Self::Great,
            p if p >= GOOD => Self::Good,
            _ => Self::KeepPracticing,
        }
    }
}

/// Percentage of correct answers, rounded half up
fn percentage(score: u32, total_questions: u32) -> u32 {
    if total_questions == 0 {
        return 0;
    }
    (f64::from(score) * 100.0 / f64::from(total_questions)).round() as u32
}

/// One question of the results review
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewItem {
    /// The question text
    pub question: String,
    /// The answer options
    pub options: Vec<String>,
    /// What the participant answered, `None` if the countdown ran out
    pub answer: SessionAnswer,
    /// Index of the correct option
    pub correct: usize,
}

/// Everything the results screen shows
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultsMessage {
    /// The participant's display name
    pub name: String,
    /// Number of correct answers
    pub score: u32,
    /// Number of questions
    pub total_questions: u32,
    /// Rounded percentage of correct answers
    pub percentage: u32,
    /// Performance band for the percentage
    pub band: Band,
    /// Seconds from registration to the final lock
    pub completion_time_seconds: u64,
    /// Per-question review in question order
    pub review: Vec<ReviewItem>,
    /// Identifier of the stored result, once known
    pub id: Option<ResultId>,
    /// Whether the stored result ranked first when it was stored
    pub top_scorer: bool,
}

/// One row of the leaderboard screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    /// 1-based position
    pub rank: usize,
    /// Display name
    pub name: String,
    /// Number of correct answers
    pub score: u32,
    /// Number of questions
    pub total_questions: u32,
    /// Seconds needed to finish
    pub completion_time_seconds: u64,
    /// Whether this row is the participant's own result
    pub own: bool,
}

impl LeaderboardRow {
    fn new(entry: LeaderboardEntry<PersistedResult>, own: Option<ResultId>) -> Self {
        let LeaderboardEntry { rank, entry } = entry;
        Self {
            rank,
            name: entry.result.participant.name().to_owned(),
            score: entry.result.score,
            total_questions: entry.result.total_questions,
            completion_time_seconds: entry.result.completion_time_seconds,
            own: own == Some(entry.id),
        }
    }
}

/// Everything the administrative dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMessage {
    /// Participant count, average score and top scorer
    pub summary: Summary<PersistedResult>,
    /// Stored results, most recent first
    pub rows: TruncatedVec<PersistedResult>,
}

/// Update messages for stage-level screens
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Show the welcome screen
    Landing,
    /// Show an empty registration form
    RegistrationForm,
    /// Show field errors on the registration form
    RegistrationErrors(ValidationErrors),
    /// Show the results of the finished session
    Results(ResultsMessage),
    /// Show the ranked results; empty when loading failed or nobody played
    Leaderboard(TruncatedVec<LeaderboardRow>),
    /// Show the administrative dashboard
    Dashboard(Box<DashboardMessage>),
}

/// Sync messages for stage-level screens
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// The welcome screen
    Landing,
    /// The registration form
    RegistrationForm {
        /// Errors of the last rejected attempt
        errors: Option<ValidationErrors>,
    },
    /// The results of the finished session
    Results(ResultsMessage),
    /// The ranked results
    Leaderboard(TruncatedVec<LeaderboardRow>),
    /// The administrative dashboard
    Dashboard(Box<DashboardMessage>),
}

/// Inputs a participant can send from the view
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Leave the landing screen
    Start,
    /// Submit the registration form
    Register {
        /// Display name as typed
        name: String,
        /// Email as typed
        email: String,
    },
    /// Tentatively pick an option
    Pick(usize),
    /// Confirm the tentative pick
    Confirm,
    /// Go back from the leaderboard or the dashboard
    Back,
    /// Start over with a new registration
    Retake,
}

/// The quiz application for one participant's view
pub struct App {
    bank: QuestionBank,
    options: Options,
    stage: Stage,
    /// Errors of the last rejected registration
    errors: ValidationErrors,
    session: Option<QuizSession>,
    publication: Option<Publication>,
    leaderboard: TruncatedVec<LeaderboardRow>,
    dashboard: Option<DashboardMessage>,
}

impl Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("stage", &self.stage)
            .field("session", &self.session_id())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Creates an app on the landing screen
    ///
    /// # Errors
    ///
    /// Returns a `garde::Report` if the options are out of range.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quizboard::app::{App, Options, Stage};
    /// use quizboard::quiz::bank::QuestionBank;
    ///
    /// let app = App::new(QuestionBank::default(), Options::default()).unwrap();
    /// assert_eq!(app.stage(), Stage::Landing);
    /// ```
    pub fn new(bank: QuestionBank, options: Options) -> Result<Self, garde::Report> {
        options.validate()?;

        Ok(Self {
            bank,
            options,
            stage: Stage::Landing,
            errors: ValidationErrors::default(),
            session: None,
            publication: None,
            leaderboard: TruncatedVec::default(),
            dashboard: None,
        })
    }

    /// The current screen
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The app settings
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The current or just finished session
    pub fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    /// Identifier of the current session, for purging its pending alarms
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(QuizSession::id)
    }

    /// The publication outcome of the finished session, once reported
    pub fn publication(&self) -> Option<&Publication> {
        self.publication.as_ref()
    }

    fn set_stage(&mut self, stage: Stage) {
        info!(from = ?self.stage, to = ?stage, "stage changed");
        self.stage = stage;
    }

    fn results_message(&self) -> Option<ResultsMessage> {
        let session = self.session.as_ref()?;
        let result = session.result()?;

        let review = session
            .bank()
            .iter()
            .zip(&result.answers)
            .map(|(question, answer)| ReviewItem {
                question: question.text().to_owned(),
                options: question.options().to_vec(),
                answer: *answer,
                correct: question.correct_option_index(),
            })
            .collect_vec();
        let percentage = percentage(result.score, result.total_questions);

        Some(ResultsMessage {
            name: result.participant.name().to_owned(),
            score: result.score,
            total_questions: result.total_questions,
            percentage,
            band: Band::from_percentage(percentage),
            completion_time_seconds: result.completion_time_seconds,
            review,
            id: self.publication.as_ref().and_then(Publication::id),
            top_scorer: self.publication.as_ref().is_some_and(|p| p.top_scorer),
        })
    }

    fn send_results<T: Tunnel>(&self, tunnel: &T) {
        if let Some(results) = self.results_message() {
            tunnel.send_message(&UpdateMessage::Results(results).into());
        }
    }

    /// Leaves the landing screen for the registration form
    pub fn start<T: Tunnel>(&mut self, tunnel: &T) -> bool {
        if self.stage != Stage::Landing {
            return false;
        }

        self.errors = ValidationErrors::default();
        self.set_stage(Stage::Register);
        tunnel.send_message(&UpdateMessage::RegistrationForm.into());

        true
    }

    /// Submits the registration form
    ///
    /// On success a fresh session starts, timed from this moment, and its
    /// first question is shown. On failure every field error is sent and the
    /// form stays open for another attempt.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name as typed
    /// * `email` - Email as typed
    /// * `schedule_message` - Function to schedule alarms after a delay
    /// * `tunnel` - The participant's view
    ///
    /// # Returns
    ///
    /// `true` if a session was started
    pub fn register<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        name: &str,
        email: &str,
        schedule_message: S,
        tunnel: &T,
    ) -> bool {
        if self.stage != Stage::Register {
            return false;
        }

        match registration::validate(name, email) {
            Ok(participant) => {
                let mut session =
                    QuizSession::new(self.bank.clone(), self.options.timing, participant);
                info!(session = %session.id(), "registration accepted");

                self.errors = ValidationErrors::default();
                self.publication = None;
                self.set_stage(Stage::Quiz);
                session.play(schedule_message, tunnel);
                self.session = Some(session);

                true
            }
            Err(errors) => {
                debug!(%errors, "registration rejected");
                tunnel.send_message(&UpdateMessage::RegistrationErrors(errors.clone()).into());
                self.errors = errors;

                false
            }
        }
    }

    /// Tentatively picks an option on the current question
    pub fn pick<T: Tunnel>(&mut self, option: usize, tunnel: &T) -> bool {
        if self.stage != Stage::Quiz {
            return false;
        }
        self.session
            .as_mut()
            .is_some_and(|session| session.pick(option, tunnel))
    }

    /// Confirms the tentative pick on the current question
    pub fn confirm<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        schedule_message: S,
        tunnel: &T,
    ) -> bool {
        if self.stage != Stage::Quiz {
            return false;
        }
        self.session
            .as_mut()
            .is_some_and(|session| session.confirm(schedule_message, tunnel))
    }

    /// Handles an alarm previously handed to the scheduler
    ///
    /// When the alarm completes the session, the app moves straight to the
    /// results screen and returns the result so the host can publish it in
    /// the background. Alarms of a discarded session are ignored.
    ///
    /// # Returns
    ///
    /// The finished session and its result, exactly once per session
    pub fn receive_alarm<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        message: &AlarmMessage,
        schedule_message: &mut S,
        tunnel: &T,
    ) -> Option<(SessionId, SessionResult)> {
        if self.stage != Stage::Quiz {
            return None;
        }
        let session = self.session.as_mut()?;
        if !session.receive_alarm(message, schedule_message, tunnel) {
            return None;
        }
        let finished = (session.id(), session.result()?.clone());

        self.set_stage(Stage::Results);
        self.send_results(tunnel);

        Some(finished)
    }

    /// Records the outcome of publishing the finished session
    ///
    /// Only decorates the results screen (result id and top-scorer badge).
    /// A publication of any other session, such as one discarded by a
    /// retake, is ignored whether it succeeded or failed.
    pub fn publication_ready<T: Tunnel>(&mut self, publication: Publication, tunnel: &T) -> bool {
        let finished = self
            .session
            .as_ref()
            .filter(|session| session.is_complete())
            .map(QuizSession::id);
        if finished != Some(publication.session) {
            debug!(session = %publication.session, "publication of another session ignored");
            return false;
        }

        self.publication = Some(publication);
        if self.stage == Stage::Results {
            self.send_results(tunnel);
        }

        true
    }

    /// Moves from the results to the leaderboard
    ///
    /// # Arguments
    ///
    /// * `fetched` - The ranked read from the result store; a failure shows an empty leaderboard
    /// * `tunnel` - The participant's view
    pub fn show_leaderboard<T: Tunnel>(
        &mut self,
        fetched: Result<Vec<PersistedResult>, PersistenceError>,
        tunnel: &T,
    ) -> bool {
        if self.stage != Stage::Results {
            return false;
        }

        let results = fetched.unwrap_or_else(|error| {
            warn!(%error, "failed to load the leaderboard");
            Vec::new()
        });
        let count = results.len();
        let own = self.publication.as_ref().and_then(Publication::id);

        self.leaderboard = TruncatedVec::new(
            leaderboard::rank(results)
                .into_iter()
                .map(|entry| LeaderboardRow::new(entry, own)),
            self.options.leaderboard_limit,
            count,
        );
        self.set_stage(Stage::Leaderboard);
        tunnel.send_message(&UpdateMessage::Leaderboard(self.leaderboard.clone()).into());

        true
    }

    /// Moves from the landing screen to the administrative dashboard
    ///
    /// # Arguments
    ///
    /// * `fetched` - The full read from the result store; a failure shows an empty dashboard
    /// * `tunnel` - The participant's view
    pub fn open_admin<T: Tunnel>(
        &mut self,
        fetched: Result<Vec<PersistedResult>, PersistenceError>,
        tunnel: &T,
    ) -> bool {
        if self.stage != Stage::Landing {
            return false;
        }

        let results = fetched.unwrap_or_else(|error| {
            warn!(%error, "failed to load results for the dashboard");
            Vec::new()
        });
        let dashboard = DashboardMessage {
            summary: summary::summarize(&results),
            rows: TruncatedVec::new(
                results.iter().cloned(),
                crate::constants::admin::ROW_LIMIT,
                results.len(),
            ),
        };

        self.set_stage(Stage::Admin);
        tunnel.send_message(&UpdateMessage::Dashboard(Box::new(dashboard.clone())).into());
        self.dashboard = Some(dashboard);

        true
    }

    /// Goes back from the leaderboard to the results, or from the dashboard to the landing screen
    pub fn back<T: Tunnel>(&mut self, tunnel: &T) -> bool {
        match self.stage {
            Stage::Leaderboard => {
                self.set_stage(Stage::Results);
                self.send_results(tunnel);
                true
            }
            Stage::Admin => {
                self.dashboard = None;
                self.set_stage(Stage::Landing);
                tunnel.send_message(&UpdateMessage::Landing.into());
                true
            }
            _ => false,
        }
    }

    /// Drops the finished session and opens a fresh registration form
    pub fn retake<T: Tunnel>(&mut self, tunnel: &T) -> bool {
        if self.stage != Stage::Results {
            return false;
        }

        if let Some(session) = self.session.take() {
            debug!(session = %session.id(), "session discarded");
        }
        self.publication = None;
        self.leaderboard = TruncatedVec::default();
        self.errors = ValidationErrors::default();
        self.set_stage(Stage::Register);
        tunnel.send_message(&UpdateMessage::RegistrationForm.into());

        true
    }

    /// Routes an input from the participant's view
    ///
    /// # Returns
    ///
    /// `true` if the input was accepted in the current stage
    pub fn receive_message<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        message: IncomingMessage,
        schedule_message: S,
        tunnel: &T,
    ) -> bool {
        match message {
            IncomingMessage::Start => self.start(tunnel),
            IncomingMessage::Register { name, email } => {
                self.register(&name, &email, schedule_message, tunnel)
            }
            IncomingMessage::Pick(option) => self.pick(option, tunnel),
            IncomingMessage::Confirm => self.confirm(schedule_message, tunnel),
            IncomingMessage::Back => self.back(tunnel),
            IncomingMessage::Retake => self.retake(tunnel),
        }
    }

    /// Builds the message a freshly attached view needs to render the current screen
    pub fn state_message(&self) -> crate::SyncMessage {
        if let (Stage::Quiz, Some(session)) = (self.stage, &self.session) {
            return session.state_message().into();
        }

        let message = match self.stage {
            Stage::Landing | Stage::Quiz => SyncMessage::Landing,
            Stage::Register => SyncMessage::RegistrationForm {
                errors: (!self.errors.is_empty()).then(|| self.errors.clone()),
            },
            Stage::Results => self
                .results_message()
                .map_or(SyncMessage::Landing, SyncMessage::Results),
            Stage::Leaderboard => SyncMessage::Leaderboard(self.leaderboard.clone()),
            Stage::Admin => self
                .dashboard
                .clone()
                .map_or(SyncMessage::Landing, |dashboard| {
                    SyncMessage::Dashboard(Box::new(dashboard))
                }),
        };

        message.into()
    }

    /// Sends the current screen to a view that (re)attached
    pub fn update_view<T: Tunnel>(&self, tunnel: &T) {
        tunnel.send_state(&self.state_message());
    }

    /// Tears the app down and closes the view
    ///
    /// # Returns
    ///
    /// The session whose pending alarms the host should drop, if any
    pub fn shut_down<T: Tunnel>(self, tunnel: T) -> Option<SessionId> {
        let session = self.session_id();
        info!(?session, "app shut down");
        tunnel.close();

        session
    }
}
