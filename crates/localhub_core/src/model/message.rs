//! Private messages between members of a community.
//!
//! # Invariants
//! - Sender and recipient differ.
//! - A side that deleted the message no longer sees it; once both sides
//!   deleted it the row is removed.

use super::{now_ms, require_text, ValidationError};
use crate::text::abbreviate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = Uuid;

const MESSAGE_MAX_CHARS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub community_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub message: String,
    /// Message this one answers.
    pub parent_id: Option<MessageId>,
    pub read: Option<i64>,
    pub sender_deleted: Option<i64>,
    pub recipient_deleted: Option<i64>,
    pub created: i64,
}

impl Message {
    pub fn new(
        community_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            community_id,
            sender_id,
            recipient_id,
            message: message.into(),
            parent_id: None,
            read: None,
            sender_deleted: None,
            recipient_deleted: None,
            created: now_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sender_id == self.recipient_id {
            return Err(ValidationError::SelfMessage);
        }
        require_text("message", &self.message, MESSAGE_MAX_CHARS)
    }

    pub fn is_read(&self) -> bool {
        self.read.is_some()
    }

    /// Whether `user_id` can still see this message.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        (self.sender_id == user_id && self.sender_deleted.is_none())
            || (self.recipient_id == user_id && self.recipient_deleted.is_none())
    }

    /// The participant that is not `user_id`.
    pub fn other_user(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id {
            self.recipient_id
        } else {
            self.sender_id
        }
    }

    pub fn abbreviate(&self, length: usize) -> String {
        abbreviate(&self.message, length)
    }
}

#[cfg(test)]
mod tests {
    use super::Message;
    use crate::model::ValidationError;
    use uuid::Uuid;

    #[test]
    fn rejects_message_to_self() {
        let user = Uuid::new_v4();
        let message = Message::new(Uuid::new_v4(), user, user, "hello");
        assert_eq!(message.validate(), Err(ValidationError::SelfMessage));
    }

    #[test]
    fn visibility_follows_side_deletion() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut message = Message::new(Uuid::new_v4(), sender, recipient, "hello");
        assert!(message.is_visible_to(sender));
        message.sender_deleted = Some(1);
        assert!(!message.is_visible_to(sender));
        assert!(message.is_visible_to(recipient));
        assert!(!message.is_visible_to(Uuid::new_v4()));
        assert_eq!(message.other_user(recipient), sender);
    }
}
