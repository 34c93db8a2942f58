//! The question bank
//!
//! A fixed, ordered list of multiple-choice questions. The bank is validated
//! once when it is built and never changes afterwards; sessions only read it.

use std::sync::LazyLock;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::SessionAnswer;

/// A multiple-choice question with exactly four options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Question {
    /// The question text shown to the participant
    #[garde(length(chars, min = 1, max = crate::constants::question::MAX_TEXT_LENGTH))]
    text: String,
    /// The answer options in display order
    #[garde(
        length(
            min = crate::constants::question::OPTION_COUNT,
            max = crate::constants::question::OPTION_COUNT
        ),
        inner(length(chars, min = 1, max = crate::constants::question::MAX_TEXT_LENGTH))
    )]
    options: Vec<String>,
    /// Index of the correct option
    #[garde(range(max = crate::constants::question::LAST_OPTION_INDEX))]
    correct_option_index: usize,
}

impl Question {
    /// Creates a question; it is checked when added to a [`QuestionBank`]
    pub fn new<S: Into<String>>(
        text: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        correct_option_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_option_index,
        }
    }

    /// The question text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The answer options in display order
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Index of the correct option
    pub fn correct_option_index(&self) -> usize {
        self.correct_option_index
    }

    /// Whether a recorded answer picks the correct option
    pub fn is_correct(&self, answer: SessionAnswer) -> bool {
        answer == Some(self.correct_option_index)
    }
}

/// Errors that can occur while building a question bank
#[derive(Error, Debug)]
pub enum Error {
    /// The input is not well-formed JSON for a bank
    #[error("question bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// A question breaks one of the bank rules
    #[error("question bank is invalid: {0}")]
    Invalid(#[from] garde::Report),
}

/// An immutable, ordered sequence of questions
///
/// Deserializing goes through the same checks as [`QuestionBank::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(try_from = "UncheckedBank")]
pub struct QuestionBank {
    #[garde(
        length(min = 1, max = crate::constants::question::MAX_QUESTION_COUNT),
        dive
    )]
    questions: Vec<Question>,
}

/// Wire shape of a bank before validation
#[derive(Deserialize)]
struct UncheckedBank {
    questions: Vec<Question>,
}

impl TryFrom<UncheckedBank> for QuestionBank {
    type Error = Error;

    fn try_from(unchecked: UncheckedBank) -> Result<Self, Self::Error> {
        Self::new(unchecked.questions)
    }
}

static BUNDLED: LazyLock<QuestionBank> = LazyLock::new(|| QuestionBank {
    questions: vec![
        Question::new(
            "What is cloud computing?",
            [
                "Storing data only on personal computers",
                "Delivering computing services over the internet",
                "Using hardware without software",
                "Connecting USB devices to a server",
            ],
            1,
        ),
        Question::new(
            "Which of the following is an example of a cloud service provider?",
            [
                "Windows Defender",
                "Google Cloud Platform",
                "Adobe Photoshop",
                "VLC Media Player",
            ],
            1,
        ),
        Question::new(
            "What does IaaS stand for?",
            [
                "Internet as a Service",
                "Infrastructure as a Service",
                "Integration as a Software",
                "Interface as a System",
            ],
            1,
        ),
        Question::new(
            "Which cloud model allows shared resources among multiple users?",
            [
                "Private Cloud",
                "Hybrid Cloud",
                "Public Cloud",
                "Community Cloud",
            ],
            2,
        ),
        Question::new(
            "Which of the following is a benefit of cloud computing?",
            [
                "High upfront hardware cost",
                "Limited scalability",
                "On-demand resource availability",
                "Manual software updates",
            ],
            2,
        ),
        Question::new(
            "What does SaaS stand for?",
            [
                "Software as a Service",
                "Storage as a System",
                "Server as a Software",
                "Security as a Service",
            ],
            0,
        ),
        Question::new(
            "Which cloud deployment model combines public and private clouds?",
            [
                "Hybrid Cloud",
                "Community Cloud",
                "Edge Cloud",
                "Distributed Cloud",
            ],
            0,
        ),
        Question::new(
            "Which of the following is an example of SaaS?",
            [
                "Amazon EC2",
                "Google Docs",
                "Microsoft Azure VM",
                "Docker Engine",
            ],
            1,
        ),
        Question::new(
            "What is elasticity in cloud computing?",
            [
                "Permanent storage capacity",
                "Automatic scaling of resources",
                "Fixed server configuration",
                "Manual resource allocation",
            ],
            1,
        ),
        Question::new(
            "Which service model gives developers control over applications without managing hardware?",
            ["IaaS", "SaaS", "PaaS", "DaaS"],
            2,
        ),
    ],
});

impl QuestionBank {
    /// Builds a bank from questions, checking every one of them
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if the bank is empty, too large, or any
    /// question does not have exactly four non-empty options with the
    /// correct index among them.
    pub fn new(questions: Vec<Question>) -> Result<Self, Error> {
        let bank = Self { questions };
        bank.validate()?;
        Ok(bank)
    }

    /// Parses and checks a bank from JSON of the form `{"questions": [...]}`
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for malformed JSON and `Error::Invalid` when a
    /// question breaks the bank rules.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let unchecked: UncheckedBank = serde_json::from_str(json)?;
        Self::new(unchecked.questions)
    }

    /// The ten-question cloud computing bank shipped with the crate
    pub fn bundled() -> &'static Self {
        &BUNDLED
    }

    /// The question at `index`, or `None` past the end of the bank
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Number of questions in the bank
    pub fn count(&self) -> usize {
        self.questions.len()
    }

    /// Iterates over the questions in order
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Counts the answers that match the correct option of their question
    pub fn score(&self, answers: &[SessionAnswer]) -> u32 {
        self.questions
            .iter()
            .zip(answers)
            .filter(|(question, answer)| question.is_correct(**answer))
            .count() as u32
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::bundled().clone()
    }
}
