//! Timed quiz session
//!
//! A session walks one participant through the question bank. Each question
//! gets a fresh countdown; the participant may change a tentative pick until
//! they confirm it or the countdown runs out, at which point the question is
//! locked. After a short pacing delay the session advances, and once the bank
//! is exhausted the result is assembled.
//!
//! The session never sleeps or spawns timers. It hands alarms to the host
//! through a scheduling callback and reacts when the host delivers them back.
//! Alarms name the session and question they were scheduled for, so one that
//! arrives after its question was locked or left behind does nothing.

use std::time::Duration;

use garde::Validate;
use once_cell_serde::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{debug, info};
use web_time::SystemTime;

use crate::{id::SessionId, registration::Participant, tunnel::Tunnel};

use super::bank::QuestionBank;

/// The answer recorded for one question: the chosen option, or `None` on timeout
pub type SessionAnswer = Option<usize>;

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds in milliseconds
fn validate_duration<const MIN_MILLIS: u64, const MAX_MILLIS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    let millis = u64::try_from(val.as_millis()).unwrap_or(u64::MAX);
    if (MIN_MILLIS..=MAX_MILLIS).contains(&millis) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_MILLIS}ms,{MAX_MILLIS}ms]",
        )))
    }
}

/// Validates the per-question countdown budget, which must be whole seconds
fn validate_time_limit(val: &Duration) -> ValidationResult {
    validate_duration::<
        { crate::constants::session::MIN_TIME_LIMIT * 1000 },
        { crate::constants::session::MAX_TIME_LIMIT * 1000 },
    >("time_limit", val)?;
    if val.subsec_nanos() == 0 {
        Ok(())
    } else {
        Err(garde::Error::new("time_limit must be a whole number of seconds"))
    }
}

/// Validates the wait between locking a question and advancing
fn validate_pacing_delay(val: &Duration) -> ValidationResult {
    validate_duration::<0, { crate::constants::session::MAX_PACING_DELAY }>("pacing_delay", val)
}

/// Timing parameters of a session
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Timing {
    /// Countdown budget for every question
    #[garde(custom(|v, _| validate_time_limit(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    time_limit: Duration,
    /// Presentational wait between a lock and the next question
    #[garde(custom(|v, _| validate_pacing_delay(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pacing_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(crate::constants::session::TIME_LIMIT),
            pacing_delay: Duration::from_millis(crate::constants::session::PACING_DELAY),
        }
    }
}

impl Timing {
    /// Creates timing parameters; check them with [`Validate::validate`]
    pub fn new(time_limit: Duration, pacing_delay: Duration) -> Self {
        Self {
            time_limit,
            pacing_delay,
        }
    }

    /// Countdown budget for every question
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Wait between a lock and the next question
    pub fn pacing_delay(&self) -> Duration {
        self.pacing_delay
    }
}

/// What finalized a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockCause {
    /// The participant confirmed their pick
    Submitted,
    /// The countdown reached zero
    TimedOut,
}

/// The finalized outcome of one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// The recorded answer
    pub answer: SessionAnswer,
    /// Whether it was confirmed or timed out
    pub cause: LockCause,
}

/// Runtime state of the question being played
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentQuestion {
    index: usize,
    /// Seconds left on the countdown
    time_remaining: u64,
    /// Tentative pick, replaced freely until the question is locked
    selected: Option<usize>,
    /// Set exactly once, by whichever of confirmation or timeout comes first
    lock: OnceCell<Lock>,
}

impl CurrentQuestion {
    fn new(index: usize, time_remaining: u64) -> Self {
        Self {
            index,
            time_remaining,
            selected: None,
            lock: OnceCell::new(),
        }
    }

    /// Position of the question in the bank
    pub fn index(&self) -> usize {
        self.index
    }

    /// Seconds left on the countdown
    pub fn time_remaining(&self) -> u64 {
        self.time_remaining
    }

    /// The current tentative pick
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// The lock, once the question has been finalized
    pub fn lock(&self) -> Option<&Lock> {
        self.lock.get()
    }

    /// Whether the question has been finalized
    pub fn is_locked(&self) -> bool {
        self.lock.get().is_some()
    }
}

/// The outcome of a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Who took the quiz
    #[serde(flatten)]
    pub participant: Participant,
    /// One answer per question, in question order
    pub answers: Vec<SessionAnswer>,
    /// Number of answers matching their question's correct option
    pub score: u32,
    /// Number of questions in the bank
    pub total_questions: u32,
    /// Seconds from registration to the final lock
    pub completion_time_seconds: u64,
}

/// Phase of a session
///
/// Sessions only move forward: there is no pause and no going back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum State {
    /// Registered but the first question has not been shown
    NotStarted,
    /// A question is being played
    InProgress(CurrentQuestion),
    /// Every question has been answered or timed out
    Complete(SessionResult),
}

/// Update messages sent to the participant while playing
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// A new question is shown with a full countdown
    QuestionAnnouncement {
        /// Index of the question (0-based)
        index: usize,
        /// Total number of questions
        count: usize,
        /// The question text
        question: String,
        /// The answer options
        options: Vec<String>,
        /// Countdown budget
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        duration: Duration,
    },
    /// Seconds left after a tick
    TimeRemaining(u64),
    /// The tentative pick changed
    Selected(usize),
    /// The question was finalized; the correct option may now be revealed
    Locked {
        /// The recorded answer
        answer: SessionAnswer,
        /// Index of the correct option
        correct: usize,
        /// Whether the countdown ran out
        timed_out: bool,
    },
}

/// Synchronization messages for a view attaching mid-session
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// The session has not shown its first question yet
    NotStarted,
    /// The question currently being played
    Question {
        /// Index of the question (0-based)
        index: usize,
        /// Total number of questions
        count: usize,
        /// The question text
        question: String,
        /// The answer options
        options: Vec<String>,
        /// Seconds left on the countdown
        time_remaining: u64,
        /// The tentative pick
        selected: Option<usize>,
        /// The lock, if the question is already finalized
        lock: Option<Lock>,
    },
    /// The session is over
    Complete {
        /// Final score
        score: u32,
        /// Number of questions
        total_questions: u32,
    },
}

/// Alarm messages for the countdown and the pacing delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// One countdown tick for a question
    Tick {
        /// Session the tick was scheduled by
        session: SessionId,
        /// Question the tick was scheduled for
        index: usize,
    },
    /// The pacing delay after a lock has elapsed
    Advance {
        /// Session the alarm was scheduled by
        session: SessionId,
        /// Question that was locked
        index: usize,
    },
}

impl AlarmMessage {
    /// The session this alarm belongs to
    pub fn session(&self) -> SessionId {
        match self {
            Self::Tick { session, .. } | Self::Advance { session, .. } => *session,
        }
    }
}

/// One participant's attempt at the whole question bank
///
/// Created when registration is accepted; that moment is the start of the
/// completion time. Dropped on retake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSession {
    id: SessionId,
    bank: QuestionBank,
    timing: Timing,
    participant: Participant,
    started_at: SystemTime,
    /// Answers of questions that have been advanced past
    answers: Vec<SessionAnswer>,
    /// Captured at the final lock, before the pacing delay
    completion_time_seconds: Option<u64>,
    state: State,
}

impl QuizSession {
    /// Creates a session for a freshly registered participant
    pub fn new(bank: QuestionBank, timing: Timing, participant: Participant) -> Self {
        Self {
            id: SessionId::new(),
            bank,
            timing,
            participant,
            started_at: SystemTime::now(),
            answers: Vec::new(),
            completion_time_seconds: None,
            state: State::NotStarted,
        }
    }

    /// The session identifier carried by its alarms
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The participant taking the quiz
    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// The questions being played
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// The current phase
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The question being played, if any
    pub fn current(&self) -> Option<&CurrentQuestion> {
        match &self.state {
            State::InProgress(current) => Some(current),
            _ => None,
        }
    }

    /// Answers of the questions already advanced past
    pub fn answers(&self) -> &[SessionAnswer] {
        &self.answers
    }

    /// The result, once the session is complete
    pub fn result(&self) -> Option<&SessionResult> {
        match &self.state {
            State::Complete(result) => Some(result),
            _ => None,
        }
    }

    /// Whether every question has been played
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete(_))
    }

    /// Shows the first question and starts its countdown
    ///
    /// Does nothing once the session has started.
    ///
    /// # Arguments
    ///
    /// * `schedule_message` - Function to schedule alarms after a delay
    /// * `tunnel` - The participant's view
    pub fn play<T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        schedule_message: S,
        tunnel: &T,
    ) {
        if matches!(self.state, State::NotStarted) {
            self.start_question(0, schedule_message, tunnel);
        }
    }

    /// Changes the tentative pick on the current question
    ///
    /// # Returns
    ///
    /// `false` without changing anything if no question is being played,
    /// the question is locked, or the option does not exist.
    pub fn pick<T: Tunnel>(&mut self, option: usize, tunnel: &T) -> bool {
        let State::InProgress(current) = &mut self.state else {
            return false;
        };
        let option_count = self
            .bank
            .get(current.index)
            .map_or(0, |question| question.options().len());
        if current.is_locked() || option >= option_count {
            return false;
        }

        current.selected = Some(option);
        tunnel.send_message(&UpdateMessage::Selected(option).into());

        true
    }

    /// Confirms the tentative pick and locks the current question
    ///
    /// # Returns
    ///
    /// `false` if there is no pick to confirm or the question is already locked.
    pub fn confirm<T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        schedule_message: S,
        tunnel: &T,
    ) -> bool {
        let Some(selected) = self.current().and_then(CurrentQuestion::selected) else {
            return false;
        };

        self.lock(
            Lock {
                answer: Some(selected),
                cause: LockCause::Submitted,
            },
            schedule_message,
            tunnel,
        )
    }

    /// Handles an alarm previously handed to the scheduler
    ///
    /// # Returns
    ///
    /// `true` if this alarm completed the session
    pub fn receive_alarm<T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        message: &crate::AlarmMessage,
        schedule_message: &mut S,
        tunnel: &T,
    ) -> bool {
        let crate::AlarmMessage::Session(alarm) = message;
        if alarm.session() != self.id {
            return false;
        }

        match *alarm {
            AlarmMessage::Tick { index, .. } => {
                self.tick(index, schedule_message, tunnel);
                false
            }
            AlarmMessage::Advance { index, .. } => self.advance(index, schedule_message, tunnel),
        }
    }

    /// Builds the message a freshly attached view needs to render the session
    pub fn state_message(&self) -> SyncMessage {
        match &self.state {
            State::NotStarted => SyncMessage::NotStarted,
            State::InProgress(current) => {
                let (question, options) = self
                    .bank
                    .get(current.index)
                    .map(|q| (q.text().to_owned(), q.options().to_vec()))
                    .unwrap_or_default();
                SyncMessage::Question {
                    index: current.index,
                    count: self.bank.count(),
                    question,
                    options,
                    time_remaining: current.time_remaining,
                    selected: current.selected,
                    lock: current.lock().copied(),
                }
            }
            State::Complete(result) => SyncMessage::Complete {
                score: result.score,
                total_questions: result.total_questions,
            },
        }
    }

    /// Seconds since registration, rounded to the nearest second
    fn elapsed_seconds(&self) -> u64 {
        self.started_at
            .elapsed()
            .map_or(0, |elapsed| ((elapsed.as_millis() + 500) / 1000) as u64)
    }

    /// Enters the question at `index` with a fresh countdown, or completes
    ///
    /// # Returns
    ///
    /// `true` if there was no question left and the session completed
    fn start_question<T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        index: usize,
        mut schedule_message: S,
        tunnel: &T,
    ) -> bool {
        let Some(question) = self.bank.get(index) else {
            self.complete();
            return true;
        };

        self.state = State::InProgress(CurrentQuestion::new(
            index,
            self.timing.time_limit.as_secs(),
        ));
        debug!(session = %self.id, index, "question started");

        tunnel.send_message(
            &UpdateMessage::QuestionAnnouncement {
                index,
                count: self.bank.count(),
                question: question.text().to_owned(),
                options: question.options().to_vec(),
                duration: self.timing.time_limit,
            }
            .into(),
        );

        schedule_message(
            AlarmMessage::Tick {
                session: self.id,
                index,
            }
            .into(),
            Duration::from_millis(crate::constants::session::TICK),
        );

        false
    }

    /// Counts the countdown down by one and times the question out at zero
    fn tick<T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        index: usize,
        mut schedule_message: S,
        tunnel: &T,
    ) {
        let State::InProgress(current) = &mut self.state else {
            return;
        };
        if current.index != index || current.is_locked() {
            return;
        }

        current.time_remaining = current.time_remaining.saturating_sub(1);
        let time_remaining = current.time_remaining;
        tunnel.send_message(&UpdateMessage::TimeRemaining(time_remaining).into());

        if time_remaining == 0 {
            self.lock(
                Lock {
                    answer: None,
                    cause: LockCause::TimedOut,
                },
                schedule_message,
                tunnel,
            );
        } else {
            schedule_message(
                AlarmMessage::Tick {
                    session: self.id,
                    index,
                }
                .into(),
                Duration::from_millis(crate::constants::session::TICK),
            );
        }
    }

    /// Finalizes the current question if nothing finalized it first
    fn lock<T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        lock: Lock,
        mut schedule_message: S,
        tunnel: &T,
    ) -> bool {
        let State::InProgress(current) = &self.state else {
            return false;
        };
        let index = current.index;
        let Some(correct) = self.bank.get(index).map(|q| q.correct_option_index()) else {
            return false;
        };
        if current.lock.set(lock).is_err() {
            return false;
        }

        if index + 1 >= self.bank.count() {
            self.completion_time_seconds = Some(self.elapsed_seconds());
        }
        debug!(session = %self.id, index, cause = ?lock.cause, "question locked");

        tunnel.send_message(
            &UpdateMessage::Locked {
                answer: lock.answer,
                correct,
                timed_out: lock.cause == LockCause::TimedOut,
            }
            .into(),
        );

        schedule_message(
            AlarmMessage::Advance {
                session: self.id,
                index,
            }
            .into(),
            self.timing.pacing_delay,
        );

        true
    }

    /// Records the locked answer and moves on to the next question
    fn advance<T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        index: usize,
        schedule_message: S,
        tunnel: &T,
    ) -> bool {
        let State::InProgress(current) = &self.state else {
            return false;
        };
        if current.index != index {
            return false;
        }
        let Some(lock) = current.lock().copied() else {
            return false;
        };

        self.answers.push(lock.answer);
        self.start_question(index + 1, schedule_message, tunnel)
    }

    fn complete(&mut self) {
        let result = SessionResult {
            participant: self.participant.clone(),
            answers: self.answers.clone(),
            score: self.bank.score(&self.answers),
            total_questions: self.bank.count() as u32,
            completion_time_seconds: self
                .completion_time_seconds
                .unwrap_or_else(|| self.elapsed_seconds()),
        };
        info!(
            session = %self.id,
            score = result.score,
            total = result.total_questions,
            seconds = result.completion_time_seconds,
            "session complete"
        );

        self.state = State::Complete(result);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{quiz::bank::Question, registration};

    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockTunnel {
        pub(crate) messages: Rc<RefCell<Vec<crate::UpdateMessage>>>,
        pub(crate) states: Rc<RefCell<Vec<crate::SyncMessage>>>,
        pub(crate) closed: Rc<RefCell<bool>>,
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &crate::UpdateMessage) {
            self.messages.borrow_mut().push(message.clone());
        }

        fn send_state(&self, state: &crate::SyncMessage) {
            self.states.borrow_mut().push(state.clone());
        }

        fn close(self) {
            *self.closed.borrow_mut() = true;
        }
    }

    /// Collects scheduled alarms so tests can deliver them by hand
    #[derive(Debug, Default)]
    pub(crate) struct RecordingScheduler {
        alarms: RefCell<Vec<(crate::AlarmMessage, Duration)>>,
    }

    impl RecordingScheduler {
        pub(crate) fn schedule(&self) -> impl FnMut(crate::AlarmMessage, Duration) + '_ {
            |message, duration| self.alarms.borrow_mut().push((message, duration))
        }

        pub(crate) fn drain(&self) -> Vec<(crate::AlarmMessage, Duration)> {
            std::mem::take(&mut *self.alarms.borrow_mut())
        }
    }

    fn participant() -> Participant {
        registration::validate("Grace", "grace@example.com").unwrap()
    }

    fn small_bank() -> QuestionBank {
        QuestionBank::new(vec![
            Question::new("First", ["a", "b", "c", "d"], 0),
            Question::new("Second", ["a", "b", "c", "d"], 1),
            Question::new("Third", ["a", "b", "c", "d"], 2),
        ])
        .unwrap()
    }

    fn started(bank: QuestionBank) -> (QuizSession, RecordingScheduler, MockTunnel) {
        let mut session = QuizSession::new(bank, Timing::default(), participant());
        let scheduler = RecordingScheduler::default();
        let tunnel = MockTunnel::default();
        session.play(scheduler.schedule(), &tunnel);
        (session, scheduler, tunnel)
    }

    /// Delivers every pending alarm once; returns whether the session completed
    fn deliver(
        session: &mut QuizSession,
        scheduler: &RecordingScheduler,
        tunnel: &MockTunnel,
    ) -> bool {
        let mut completed = false;
        for (alarm, _) in scheduler.drain() {
            completed |= session.receive_alarm(&alarm, &mut scheduler.schedule(), tunnel);
        }
        completed
    }

    /// Delivers alarms until none are pending
    fn run_until_quiet(
        session: &mut QuizSession,
        scheduler: &RecordingScheduler,
        tunnel: &MockTunnel,
    ) -> bool {
        let mut completed = false;
        loop {
            let pending = scheduler.drain();
            if pending.is_empty() {
                return completed;
            }
            for (alarm, _) in pending {
                completed |= session.receive_alarm(&alarm, &mut scheduler.schedule(), tunnel);
            }
        }
    }

    fn answer(
        session: &mut QuizSession,
        scheduler: &RecordingScheduler,
        tunnel: &MockTunnel,
        option: usize,
    ) -> bool {
        assert!(session.pick(option, tunnel));
        assert!(session.confirm(scheduler.schedule(), tunnel));
        deliver(session, scheduler, tunnel)
    }

    #[test]
    fn test_timing_validation() {
        assert!(Timing::default().validate().is_ok());
        assert!(
            Timing::new(Duration::from_secs(4), Duration::from_millis(600))
                .validate()
                .is_err()
        );
        assert!(
            Timing::new(Duration::from_secs(241), Duration::from_millis(600))
                .validate()
                .is_err()
        );
        assert!(
            Timing::new(Duration::from_millis(15_500), Duration::from_millis(600))
                .validate()
                .is_err()
        );
        assert!(
            Timing::new(Duration::from_secs(15), Duration::from_secs(6))
                .validate()
                .is_err()
        );
        assert!(
            Timing::new(Duration::from_secs(15), Duration::ZERO)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_timing_serialization() {
        let json = serde_json::to_string(&Timing::default()).unwrap();
        assert_eq!(json, r#"{"time_limit":15,"pacing_delay":600}"#);

        let timing: Timing = serde_json::from_str(r#"{"time_limit":30,"pacing_delay":0}"#).unwrap();
        assert_eq!(timing.time_limit(), Duration::from_secs(30));
        assert_eq!(timing.pacing_delay(), Duration::ZERO);
    }

    #[test]
    fn test_new_session_not_started() {
        let session = QuizSession::new(small_bank(), Timing::default(), participant());

        assert!(matches!(session.state(), State::NotStarted));
        assert!(session.current().is_none());
        assert!(session.result().is_none());
        assert!(matches!(session.state_message(), SyncMessage::NotStarted));
    }

    #[test]
    fn test_play_starts_first_question() {
        let (session, scheduler, tunnel) = started(small_bank());

        let current = session.current().unwrap();
        assert_eq!(current.index(), 0);
        assert_eq!(current.time_remaining(), 15);
        assert_eq!(current.selected(), None);
        assert!(!current.is_locked());

        let alarms = scheduler.drain();
        assert_eq!(alarms.len(), 1);
        assert_eq!(
            alarms[0],
            (
                crate::AlarmMessage::from(AlarmMessage::Tick {
                    session: session.id(),
                    index: 0
                }),
                Duration::from_secs(1)
            )
        );
        assert!(matches!(
            tunnel.messages.borrow()[0],
            crate::UpdateMessage::Session(UpdateMessage::QuestionAnnouncement { index: 0, count: 3, .. })
        ));
    }

    #[test]
    fn test_play_twice_is_noop() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        scheduler.drain();

        session.play(scheduler.schedule(), &tunnel);

        assert!(scheduler.drain().is_empty());
        assert_eq!(tunnel.messages.borrow().len(), 1);
    }

    #[test]
    fn test_pick_replaces_tentative_choice() {
        let (mut session, _scheduler, tunnel) = started(small_bank());

        assert!(session.pick(2, &tunnel));
        assert!(session.pick(3, &tunnel));
        assert_eq!(session.current().unwrap().selected(), Some(3));
        assert!(!session.current().unwrap().is_locked());
    }

    #[test]
    fn test_pick_rejects_missing_option() {
        let (mut session, _scheduler, tunnel) = started(small_bank());

        assert!(!session.pick(4, &tunnel));
        assert_eq!(session.current().unwrap().selected(), None);
    }

    #[test]
    fn test_pick_before_start_is_rejected() {
        let mut session = QuizSession::new(small_bank(), Timing::default(), participant());
        let tunnel = MockTunnel::default();

        assert!(!session.pick(0, &tunnel));
    }

    #[test]
    fn test_confirm_without_pick_is_noop() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        scheduler.drain();

        assert!(!session.confirm(scheduler.schedule(), &tunnel));
        assert!(!session.current().unwrap().is_locked());
        assert!(scheduler.drain().is_empty());
    }

    #[test]
    fn test_confirm_locks_and_schedules_advance() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        scheduler.drain();

        session.pick(1, &tunnel);
        assert!(session.confirm(scheduler.schedule(), &tunnel));

        let current = session.current().unwrap();
        assert_eq!(
            current.lock(),
            Some(&Lock {
                answer: Some(1),
                cause: LockCause::Submitted
            })
        );
        assert_eq!(
            scheduler.drain(),
            vec![(
                crate::AlarmMessage::from(AlarmMessage::Advance {
                    session: session.id(),
                    index: 0
                }),
                Duration::from_millis(600)
            )]
        );
        assert!(matches!(
            tunnel.messages.borrow().last(),
            Some(crate::UpdateMessage::Session(UpdateMessage::Locked {
                answer: Some(1),
                correct: 0,
                timed_out: false
            }))
        ));
    }

    #[test]
    fn test_locked_question_rejects_picks_and_confirms() {
        let (mut session, scheduler, tunnel) = started(small_bank());

        session.pick(1, &tunnel);
        session.confirm(scheduler.schedule(), &tunnel);
        let before = session.current().unwrap().clone();

        assert!(!session.pick(2, &tunnel));
        assert!(!session.confirm(scheduler.schedule(), &tunnel));

        let after = session.current().unwrap();
        assert_eq!(after.selected(), before.selected());
        assert_eq!(after.lock(), before.lock());
        assert_eq!(after.time_remaining(), before.time_remaining());
    }

    #[test]
    fn test_tick_after_lock_is_noop() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        let pending_tick = scheduler.drain();

        session.pick(0, &tunnel);
        session.confirm(scheduler.schedule(), &tunnel);
        let scheduled_after_lock = scheduler.drain();

        for (alarm, _) in &pending_tick {
            assert!(!session.receive_alarm(alarm, &mut scheduler.schedule(), &tunnel));
        }

        assert_eq!(session.current().unwrap().time_remaining(), 15);
        assert!(scheduler.drain().is_empty());
        assert_eq!(scheduled_after_lock.len(), 1);
    }

    #[test]
    fn test_tick_decrements_countdown() {
        let (mut session, scheduler, tunnel) = started(small_bank());

        deliver(&mut session, &scheduler, &tunnel);
        deliver(&mut session, &scheduler, &tunnel);

        assert_eq!(session.current().unwrap().time_remaining(), 13);
        assert!(matches!(
            tunnel.messages.borrow().last(),
            Some(crate::UpdateMessage::Session(UpdateMessage::TimeRemaining(13)))
        ));
    }

    #[test]
    fn test_timeout_records_no_answer_even_with_pick() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        session.pick(0, &tunnel);

        for _ in 0..15 {
            deliver(&mut session, &scheduler, &tunnel);
        }

        let current = session.current().unwrap();
        assert_eq!(current.index(), 0);
        assert_eq!(current.time_remaining(), 0);
        assert_eq!(
            current.lock(),
            Some(&Lock {
                answer: None,
                cause: LockCause::TimedOut
            })
        );

        let pending = scheduler.drain();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1, Duration::from_millis(600));
        for (alarm, _) in pending {
            session.receive_alarm(&alarm, &mut scheduler.schedule(), &tunnel);
        }
        assert_eq!(session.answers(), &[None]);
        assert_eq!(session.current().unwrap().index(), 1);
    }

    #[test]
    fn test_confirm_after_timeout_is_rejected() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        for _ in 0..15 {
            deliver(&mut session, &scheduler, &tunnel);
        }

        assert!(!session.pick(0, &tunnel));
        assert!(!session.confirm(scheduler.schedule(), &tunnel));
        assert_eq!(session.current().unwrap().lock().unwrap().answer, None);
    }

    #[test]
    fn test_next_question_gets_fresh_countdown() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        deliver(&mut session, &scheduler, &tunnel);
        deliver(&mut session, &scheduler, &tunnel);

        answer(&mut session, &scheduler, &tunnel, 0);

        let current = session.current().unwrap();
        assert_eq!(current.index(), 1);
        assert_eq!(current.time_remaining(), 15);
        assert_eq!(current.selected(), None);
        assert!(!current.is_locked());
    }

    #[test]
    fn test_stale_tick_from_previous_question_is_ignored() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        let stale = scheduler.drain();

        session.pick(0, &tunnel);
        session.confirm(scheduler.schedule(), &tunnel);
        deliver(&mut session, &scheduler, &tunnel);
        assert_eq!(session.current().unwrap().index(), 1);

        for (alarm, _) in &stale {
            session.receive_alarm(alarm, &mut scheduler.schedule(), &tunnel);
        }
        assert_eq!(session.current().unwrap().time_remaining(), 15);
    }

    #[test]
    fn test_stale_advance_is_ignored() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        session.pick(0, &tunnel);
        session.confirm(scheduler.schedule(), &tunnel);
        let advance = scheduler
            .drain()
            .into_iter()
            .find(|(alarm, _)| {
                matches!(alarm, crate::AlarmMessage::Session(AlarmMessage::Advance { .. }))
            })
            .unwrap()
            .0;

        session.receive_alarm(&advance, &mut scheduler.schedule(), &tunnel);
        session.receive_alarm(&advance, &mut scheduler.schedule(), &tunnel);

        assert_eq!(session.current().unwrap().index(), 1);
        assert_eq!(session.answers(), &[Some(0)]);
    }

    #[test]
    fn test_advance_before_lock_is_ignored() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        let early: crate::AlarmMessage = AlarmMessage::Advance {
            session: session.id(),
            index: 0,
        }
        .into();

        assert!(!session.receive_alarm(&early, &mut scheduler.schedule(), &tunnel));
        assert_eq!(session.current().unwrap().index(), 0);
        assert!(session.answers().is_empty());
    }

    #[test]
    fn test_alarm_for_other_session_is_ignored() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        let foreign: crate::AlarmMessage = AlarmMessage::Tick {
            session: SessionId::new(),
            index: 0,
        }
        .into();

        assert!(!session.receive_alarm(&foreign, &mut scheduler.schedule(), &tunnel));
        assert_eq!(session.current().unwrap().time_remaining(), 15);
    }

    #[test]
    fn test_answers_complete_only_at_completion() {
        let (mut session, scheduler, tunnel) = started(small_bank());

        assert!(!answer(&mut session, &scheduler, &tunnel, 0));
        assert!(!answer(&mut session, &scheduler, &tunnel, 1));
        assert_eq!(session.answers().len(), 2);

        session.pick(3, &tunnel);
        session.confirm(scheduler.schedule(), &tunnel);
        assert!(!session.is_complete());
        assert_eq!(session.answers().len(), 2);

        assert!(deliver(&mut session, &scheduler, &tunnel));
        let result = session.result().unwrap();
        assert_eq!(result.answers, vec![Some(0), Some(1), Some(3)]);
        assert_eq!(result.score, 2);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.participant.name(), "Grace");
    }

    #[test]
    fn test_complete_session_ignores_everything() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        assert!(run_until_quiet(&mut session, &scheduler, &tunnel));

        let result = session.result().unwrap().clone();
        assert_eq!(result.answers, vec![None, None, None]);
        assert_eq!(result.score, 0);

        assert!(!session.pick(0, &tunnel));
        assert!(!session.confirm(scheduler.schedule(), &tunnel));
        let late: crate::AlarmMessage = AlarmMessage::Advance {
            session: session.id(),
            index: 2,
        }
        .into();
        assert!(!session.receive_alarm(&late, &mut scheduler.schedule(), &tunnel));
        assert_eq!(session.result(), Some(&result));
        assert!(matches!(
            session.state_message(),
            SyncMessage::Complete {
                score: 0,
                total_questions: 3
            }
        ));
    }

    #[test]
    fn test_state_message_in_progress() {
        let (mut session, scheduler, tunnel) = started(small_bank());
        deliver(&mut session, &scheduler, &tunnel);
        session.pick(2, &tunnel);

        match session.state_message() {
            SyncMessage::Question {
                index,
                count,
                question,
                options,
                time_remaining,
                selected,
                lock,
            } => {
                assert_eq!(index, 0);
                assert_eq!(count, 3);
                assert_eq!(question, "First");
                assert_eq!(options.len(), 4);
                assert_eq!(time_remaining, 14);
                assert_eq!(selected, Some(2));
                assert_eq!(lock, None);
            }
            other => panic!("unexpected sync message {other:?}"),
        }
    }

    #[test]
    fn test_completion_time_measured_at_final_lock() {
        let mut session = QuizSession::new(small_bank(), Timing::default(), participant());
        session.started_at = SystemTime::now() - Duration::from_millis(41_600);
        let scheduler = RecordingScheduler::default();
        let tunnel = MockTunnel::default();
        session.play(scheduler.schedule(), &tunnel);

        answer(&mut session, &scheduler, &tunnel, 0);
        answer(&mut session, &scheduler, &tunnel, 1);
        session.pick(2, &tunnel);
        session.confirm(scheduler.schedule(), &tunnel);

        // the pacing delay must not count, even if the advance arrives much later
        session.started_at -= Duration::from_secs(60);
        deliver(&mut session, &scheduler, &tunnel);

        let result = session.result().unwrap();
        assert_eq!(result.score, 3);
        assert!((42..=43).contains(&result.completion_time_seconds));
    }

    #[test]
    fn test_bundled_session_nine_correct_last_timed_out() {
        let bank = QuestionBank::bundled().clone();
        let correct = bank.iter().map(|q| q.correct_option_index()).collect::<Vec<_>>();
        let mut session = QuizSession::new(bank, Timing::default(), participant());
        session.started_at = SystemTime::now() - Duration::from_secs(150);
        let registered = session.started_at;
        let scheduler = RecordingScheduler::default();
        let tunnel = MockTunnel::default();
        session.play(scheduler.schedule(), &tunnel);

        for option in &correct[..9] {
            assert!(!answer(&mut session, &scheduler, &tunnel, *option));
        }
        assert_eq!(session.current().unwrap().index(), 9);
        assert_eq!(session.answers().len(), 9);

        assert!(run_until_quiet(&mut session, &scheduler, &tunnel));
        let wall = registered.elapsed().unwrap().as_millis();
        let wall = ((wall + 500) / 1000) as u64;

        let result = session.result().unwrap();
        assert_eq!(result.score, 9);
        assert_eq!(result.total_questions, 10);
        assert_eq!(result.answers.len(), 10);
        assert_eq!(result.answers[9], None);
        assert!((150..=151).contains(&result.completion_time_seconds));
        assert!(result.completion_time_seconds.abs_diff(wall) <= 1);
    }

    #[test]
    fn test_deserialize_rejects_invalid_bank() {
        let (session, _scheduler, _tunnel) = started(small_bank());
        let mut json = serde_json::to_value(&session).unwrap();

        let restored: QuizSession = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(restored.id(), session.id());

        json["bank"]["questions"] = serde_json::json!([]);
        assert!(serde_json::from_value::<QuizSession>(json).is_err());
    }
}
