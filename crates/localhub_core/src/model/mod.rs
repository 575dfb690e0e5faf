//! Domain model for communities, activities and their interactions.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Validate record-level invariants before persistence.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Timestamps are Unix epoch milliseconds.
//! - Optional timestamps (`published`, `deleted`, `read`, ...) double as state flags.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod activity;
pub mod comment;
pub mod community;
pub mod content;
pub mod event;
pub mod interaction;
pub mod invite;
pub mod join_request;
pub mod message;
pub mod notification;
pub mod user;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Record-level validation failures shared by all model types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is blank after trim.
    EmptyField(&'static str),
    /// Text field exceeds its maximum length in chars.
    TooLong { field: &'static str, max: usize },
    InvalidDomain(String),
    InvalidEmail(String),
    InvalidTimezone(String),
    InvalidCountry(String),
    EventEndsBeforeStart,
    RepeatingEventSpansDays,
    RepeatsUntilWithoutRepeat,
    RepeatsUntilBeforeStart,
    PollWithoutAnswers,
    /// Sender and recipient are the same user.
    SelfMessage,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be blank"),
            Self::TooLong { field, max } => {
                write!(f, "{field} must be at most {max} characters")
            }
            Self::InvalidDomain(value) => write!(f, "invalid domain `{value}`"),
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
            Self::InvalidTimezone(value) => write!(f, "unknown timezone `{value}`"),
            Self::InvalidCountry(value) => write!(f, "invalid country code `{value}`"),
            Self::EventEndsBeforeStart => write!(f, "end date cannot be before start date"),
            Self::RepeatingEventSpansDays => {
                write!(f, "end date must be same as start date if repeating")
            }
            Self::RepeatsUntilWithoutRepeat => write!(
                f,
                "repeat until date cannot be set if not a repeating event"
            ),
            Self::RepeatsUntilBeforeStart => {
                write!(f, "repeat until date cannot be before start date")
            }
            Self::PollWithoutAnswers => write!(f, "poll must have at least one answer"),
            Self::SelfMessage => write!(f, "cannot send a message to yourself"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub(crate) fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.trim().split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.contains('@') && domain.contains('.') && !domain.ends_with('.')
}
