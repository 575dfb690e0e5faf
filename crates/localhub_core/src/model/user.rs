//! User accounts and per-user preferences.

use super::notification::Verb;
use super::{is_valid_email, now_ms, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type UserId = Uuid;

const USERNAME_MAX_CHARS: usize = 150;
const NAME_MAX_CHARS: usize = 255;

/// Optional narrowing of the default activity stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFilter {
    /// Only show activities of followed users (and own).
    Users,
    /// Only show activities carrying followed tags (and own).
    Tags,
}

impl StreamFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Tags => "tags",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "users" => Some(Self::Users),
            "tags" => Some(Self::Tags),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub email: String,
    pub language: String,
    pub is_active: bool,
    pub send_email_notifications: bool,
    pub notification_prefs: BTreeSet<Verb>,
    pub activity_stream_filters: BTreeSet<StreamFilter>,
    pub created: i64,
}

impl User {
    /// New active user with every notification preference switched on.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            name: String::new(),
            email: email.into(),
            language: "en".to_string(),
            is_active: true,
            send_email_notifications: true,
            notification_prefs: Verb::preferences().collect(),
            activity_stream_filters: BTreeSet::new(),
            created: now_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("username", &self.username, USERNAME_MAX_CHARS)?;
        if self.name.chars().count() > NAME_MAX_CHARS {
            return Err(ValidationError::TooLong {
                field: "name",
                max: NAME_MAX_CHARS,
            });
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }

    /// Full name if set, otherwise the username.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.username
        } else {
            self.name.trim()
        }
    }

    /// Up to two uppercase initials of the display name.
    pub fn initials(&self) -> String {
        self.display_name()
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect()
    }

    /// Whether a notification with this verb should reach the user.
    pub fn accepts(&self, verb: Verb) -> bool {
        !verb.is_preference() || self.notification_prefs.contains(&verb)
    }
}

#[cfg(test)]
mod tests {
    use super::User;
    use crate::model::notification::Verb;
    use crate::model::ValidationError;

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = User::new("danjac", "dan@example.com");
        assert_eq!(user.display_name(), "danjac");
        user.name = "Dan Jacob".to_string();
        assert_eq!(user.display_name(), "Dan Jacob");
        assert_eq!(user.initials(), "DJ");
    }

    #[test]
    fn preferences_only_gate_preference_verbs() {
        let mut user = User::new("tester", "tester@example.com");
        user.notification_prefs.clear();
        assert!(!user.accepts(Verb::Like));
        assert!(user.accepts(Verb::Message));
    }

    #[test]
    fn validate_rejects_bad_email() {
        let user = User::new("tester", "not-an-email");
        assert_eq!(
            user.validate(),
            Err(ValidationError::InvalidEmail("not-an-email".to_string()))
        );
    }
}
