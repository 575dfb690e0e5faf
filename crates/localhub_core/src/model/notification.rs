//! Notification records and web-push subscriptions.

use super::content::ContentRef;
use super::now_ms;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type NotificationId = Uuid;

/// What happened to the notification's content object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Mention,
    NewFollowedUserPost,
    NewFollowedTagPost,
    ModeratorEdit,
    ModeratorReviewRequest,
    ModeratorDelete,
    Reshare,
    Like,
    Flag,
    NewComment,
    RepliedToComment,
    NewSiblingComment,
    NewFollowedUserComment,
    Message,
    FollowUp,
    Reply,
    NewMember,
    NewFollower,
    Update,
    Attend,
    Cancel,
    Request,
    Accept,
    Reject,
    Invite,
}

impl Verb {
    pub const ALL: [Verb; 25] = [
        Verb::Mention,
        Verb::NewFollowedUserPost,
        Verb::NewFollowedTagPost,
        Verb::ModeratorEdit,
        Verb::ModeratorReviewRequest,
        Verb::ModeratorDelete,
        Verb::Reshare,
        Verb::Like,
        Verb::Flag,
        Verb::NewComment,
        Verb::RepliedToComment,
        Verb::NewSiblingComment,
        Verb::NewFollowedUserComment,
        Verb::Message,
        Verb::FollowUp,
        Verb::Reply,
        Verb::NewMember,
        Verb::NewFollower,
        Verb::Update,
        Verb::Attend,
        Verb::Cancel,
        Verb::Request,
        Verb::Accept,
        Verb::Reject,
        Verb::Invite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::NewFollowedUserPost => "new_followed_user_post",
            Self::NewFollowedTagPost => "new_followed_tag_post",
            Self::ModeratorEdit => "moderator_edit",
            Self::ModeratorReviewRequest => "moderator_review_request",
            Self::ModeratorDelete => "moderator_delete",
            Self::Reshare => "reshare",
            Self::Like => "like",
            Self::Flag => "flag",
            Self::NewComment => "new_comment",
            Self::RepliedToComment => "replied_to_comment",
            Self::NewSiblingComment => "new_sibling_comment",
            Self::NewFollowedUserComment => "new_followed_user_comment",
            Self::Message => "message",
            Self::FollowUp => "follow_up",
            Self::Reply => "reply",
            Self::NewMember => "new_member",
            Self::NewFollower => "new_follower",
            Self::Update => "update",
            Self::Attend => "attend",
            Self::Cancel => "cancel",
            Self::Request => "request",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Invite => "invite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == value)
    }

    /// Verbs a user can switch off in their notification preferences.
    ///
    /// All other verbs are always delivered.
    pub fn is_preference(self) -> bool {
        matches!(
            self,
            Self::Mention
                | Self::NewFollowedUserPost
                | Self::NewFollowedTagPost
                | Self::ModeratorEdit
                | Self::ModeratorReviewRequest
                | Self::ModeratorDelete
                | Self::Reshare
                | Self::Like
                | Self::Flag
                | Self::NewComment
                | Self::RepliedToComment
                | Self::NewSiblingComment
                | Self::NewFollowedUserComment
        )
    }

    /// All verbs that are subject to user preferences.
    pub fn preferences() -> impl Iterator<Item = Verb> {
        Self::ALL.into_iter().filter(|verb| verb.is_preference())
    }
}

impl Display for Verb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub community_id: Uuid,
    pub actor_id: Uuid,
    pub recipient_id: Uuid,
    pub content: ContentRef,
    pub verb: Verb,
    pub is_read: bool,
    pub created: i64,
}

impl Notification {
    pub fn new(
        content: ContentRef,
        community_id: Uuid,
        actor_id: Uuid,
        recipient_id: Uuid,
        verb: Verb,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            community_id,
            actor_id,
            recipient_id,
            content,
            verb,
            is_read: false,
            created: now_ms(),
        }
    }
}

/// Keeps only the first notification for each recipient, preserving order.
pub fn take_first_per_recipient(notifications: Vec<Notification>) -> Vec<Notification> {
    let mut seen = std::collections::HashSet::new();
    notifications
        .into_iter()
        .filter(|notification| seen.insert(notification.recipient_id))
        .collect()
}

/// Browser push subscription registered by a user for one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub endpoint: String,
    pub auth: String,
    pub p256dh: String,
}

/// Subscription JSON as posted by the browser push API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub auth: String,
    pub p256dh: String,
}

impl PushSubscription {
    pub fn from_info(user_id: Uuid, community_id: Uuid, info: SubscriptionInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            community_id,
            endpoint: info.endpoint,
            auth: info.keys.auth,
            p256dh: info.keys.p256dh,
        }
    }

    /// Subscription info in the shape push services expect.
    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            endpoint: self.endpoint.clone(),
            keys: SubscriptionKeys {
                auth: self.auth.clone(),
                p256dh: self.p256dh.clone(),
            },
        }
    }
}
