//! Generic content references.
//!
//! A `ContentRef` points at any record that can carry comments, likes, flags,
//! bookmarks or notifications. It is stored as an `(object_type, object_id)`
//! column pair.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Every record type that can be the target of a generic relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Photo,
    Event,
    Poll,
    Comment,
    Message,
    User,
    JoinRequest,
    Invite,
    Community,
}

impl ContentType {
    pub const ALL: [ContentType; 10] = [
        ContentType::Post,
        ContentType::Photo,
        ContentType::Event,
        ContentType::Poll,
        ContentType::Comment,
        ContentType::Message,
        ContentType::User,
        ContentType::JoinRequest,
        ContentType::Invite,
        ContentType::Community,
    ];

    /// Storage/object name, e.g. `post` or `join_request`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Photo => "photo",
            Self::Event => "event",
            Self::Poll => "poll",
            Self::Comment => "comment",
            Self::Message => "message",
            Self::User => "user",
            Self::JoinRequest => "join_request",
            Self::Invite => "invite",
            Self::Community => "community",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Whether the content type is one of the activity tables.
    pub fn is_activity(self) -> bool {
        matches!(self, Self::Post | Self::Photo | Self::Event | Self::Poll)
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polymorphic pointer to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub object_id: Uuid,
}

impl ContentRef {
    pub fn new(content_type: ContentType, object_id: Uuid) -> Self {
        Self {
            content_type,
            object_id,
        }
    }
}

impl Display for ContentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.content_type, self.object_id)
    }
}
