//! Likes, flags and bookmarks on any content object.

use super::content::ContentRef;
use super::now_ms;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Owner of the liked content.
    pub recipient_id: Uuid,
    pub community_id: Uuid,
    pub content: ContentRef,
    pub created: i64,
}

impl Like {
    pub fn new(user_id: Uuid, recipient_id: Uuid, community_id: Uuid, content: ContentRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            recipient_id,
            community_id,
            content,
            created: now_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    Spam,
    Abuse,
    Rules,
    IllegalActivity,
    Pornography,
    Copyright,
}

impl FlagReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Abuse => "abuse",
            Self::Rules => "rules",
            Self::IllegalActivity => "illegal_activity",
            Self::Pornography => "pornography",
            Self::Copyright => "copyright",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "spam" => Some(Self::Spam),
            "abuse" => Some(Self::Abuse),
            "rules" => Some(Self::Rules),
            "illegal_activity" => Some(Self::IllegalActivity),
            "pornography" => Some(Self::Pornography),
            "copyright" => Some(Self::Copyright),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Spam => "Spam",
            Self::Abuse => "Abuse",
            Self::Rules => "Breach of community rules",
            Self::IllegalActivity => "Illegal activity",
            Self::Pornography => "Pornography",
            Self::Copyright => "Breach of copyright",
        }
    }
}

impl Display for FlagReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub content: ContentRef,
    pub reason: FlagReason,
    /// Moderator who reviewed the flag.
    pub moderator_id: Option<Uuid>,
    pub created: i64,
}

impl Flag {
    pub fn new(user_id: Uuid, community_id: Uuid, content: ContentRef, reason: FlagReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            community_id,
            content,
            reason,
            moderator_id: None,
            created: now_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub content: ContentRef,
    pub created: i64,
}

impl Bookmark {
    pub fn new(user_id: Uuid, community_id: Uuid, content: ContentRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            community_id,
            content,
            created: now_ms(),
        }
    }
}
