//! Participant registration and validation
//!
//! This module checks the display name and email a participant enters before
//! a session starts. Both fields are checked independently so the form can
//! show every problem at once instead of one per attempt.

use std::{fmt::Display, sync::LazyLock};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One or more non-space-non-@, `@`, the same again, a dot, then non-space characters
static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// A registered participant
///
/// Created once registration succeeds and left untouched for the rest of the
/// session. The name is trimmed; the email is trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    name: String,
    email: String,
}

impl Participant {
    /// The trimmed display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized email address
    pub fn email(&self) -> &str {
        &self.email
    }
}

/// The registration form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Field {
    /// Display name
    Name,
    /// Email address
    Email,
}

/// Errors that can occur while validating a registration field
#[derive(Error, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The name is empty or contains only whitespace
    #[error("name is required")]
    EmptyName,
    /// The trimmed name is shorter than the minimum length
    #[error("name must be at least 2 characters")]
    NameTooShort,
    /// The email is empty or contains only whitespace
    #[error("email is required")]
    EmptyEmail,
    /// The email does not look like `local@domain.tld`
    #[error("please enter a valid email")]
    InvalidEmailFormat,
}

impl Error {
    /// The form field this error belongs to
    pub fn field(self) -> Field {
        match self {
            Self::EmptyName | Self::NameTooShort => Field::Name,
            Self::EmptyEmail | Self::InvalidEmailFormat => Field::Email,
        }
    }
}

/// Every field-level error found in one registration attempt
///
/// Holds at most one error per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(EnumMap<Field, Option<Error>>);

impl ValidationErrors {
    fn record(&mut self, error: Error) {
        self.0[error.field()] = Some(error);
    }

    /// The error reported for a field, if any
    pub fn get(&self, field: Field) -> Option<Error> {
        self.0[field]
    }

    /// All reported errors, name first
    pub fn iter(&self) -> impl Iterator<Item = Error> + '_ {
        self.0.values().filter_map(|error| *error)
    }

    /// Number of fields with an error
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no field has an error
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.iter().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn check_name(name: &str) -> Result<&str, Error> {
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::EmptyName);
    }
    if name.chars().count() < crate::constants::registration::MIN_NAME_LENGTH {
        return Err(Error::NameTooShort);
    }
    Ok(name)
}

fn check_email(email: &str) -> Result<String, Error> {
    let trimmed = rustrict::trim_whitespace(email);
    if trimmed.is_empty() {
        return Err(Error::EmptyEmail);
    }
    // the shape is matched against the raw input, so surrounding spaces fail it
    if !EMAIL_SHAPE.is_match(email) {
        return Err(Error::InvalidEmailFormat);
    }
    Ok(trimmed.to_lowercase())
}

/// Validates a registration attempt
///
/// # Errors
///
/// Returns every applicable field error together when either field is invalid.
pub fn validate(name: &str, email: &str) -> Result<Participant, ValidationErrors> {
    match (check_name(name), check_email(email)) {
        (Ok(name), Ok(email)) => Ok(Participant {
            name: name.to_owned(),
            email,
        }),
        (name, email) => {
            let mut errors = ValidationErrors::default();
            for error in [name.err(), email.err()].into_iter().flatten() {
                errors.record(error);
            }
            Err(errors)
        }
    }
}
