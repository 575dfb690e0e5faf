//! Per-content-type notification adapters.
//!
//! An adapter decides which verbs are deliverable for its content type and
//! renders the email subject, template candidates and web-push payload.

use crate::model::community::Community;
use crate::model::content::ContentType;
use crate::model::notification::{Notification, Verb};
use crate::model::user::User;
use serde::Serialize;

/// Display data of the notification's target object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Title or abbreviated text of the object.
    pub title: String,
    /// Site-relative path of the object.
    pub path: String,
}

/// Everything an adapter needs to render one notification.
#[derive(Debug, Clone, Copy)]
pub struct AdapterContext<'a> {
    pub notification: &'a Notification,
    pub community: &'a Community,
    pub actor: &'a User,
    pub recipient: &'a User,
    pub object: &'a ObjectSummary,
}

/// JSON body sent to browser push services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebpushPayload {
    pub head: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub url: String,
    pub icon: String,
}

pub trait Adapter: Send + Sync {
    fn content_type(&self) -> ContentType;

    fn allowed_verbs(&self) -> &'static [Verb];

    fn is_allowed(&self, verb: Verb) -> bool {
        self.allowed_verbs().contains(&verb)
    }

    /// Template candidates, most specific first.
    fn template_names(&self, verb: Verb, prefix: &str, suffix: &str) -> Vec<String> {
        let object = self.content_type().as_str();
        vec![
            format!("{prefix}/notifications/{verb}_{object}{suffix}"),
            format!("{prefix}/notifications/{verb}{suffix}"),
            format!("{prefix}/{object}_notification{suffix}"),
            format!("{prefix}/notification{suffix}"),
        ]
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String;

    fn webpush_body(&self, ctx: &AdapterContext<'_>) -> Option<String> {
        Some(ctx.object.title.clone()).filter(|title| !title.trim().is_empty())
    }

    fn object_url(&self, ctx: &AdapterContext<'_>) -> String {
        ctx.object.path.clone()
    }

    fn absolute_url(&self, ctx: &AdapterContext<'_>) -> String {
        ctx.community.resolve_url(&self.object_url(ctx))
    }

    fn webpush_payload(&self, ctx: &AdapterContext<'_>, icon_path: &str) -> WebpushPayload {
        WebpushPayload {
            head: self.email_subject(ctx),
            body: self.webpush_body(ctx),
            url: self.absolute_url(ctx),
            icon: ctx.community.resolve_url(icon_path),
        }
    }
}

/// Posts, photos, events and polls.
pub struct ActivityAdapter {
    content_type: ContentType,
}

impl ActivityAdapter {
    pub fn new(content_type: ContentType) -> Self {
        Self { content_type }
    }
}

const ACTIVITY_VERBS: &[Verb] = &[
    Verb::Flag,
    Verb::Like,
    Verb::Mention,
    Verb::ModeratorDelete,
    Verb::ModeratorEdit,
    Verb::ModeratorReviewRequest,
    Verb::NewFollowedTagPost,
    Verb::NewFollowedUserPost,
    Verb::Reshare,
];

const EVENT_VERBS: &[Verb] = &[
    Verb::Attend,
    Verb::Cancel,
    Verb::Flag,
    Verb::Like,
    Verb::Mention,
    Verb::ModeratorDelete,
    Verb::ModeratorEdit,
    Verb::ModeratorReviewRequest,
    Verb::NewFollowedTagPost,
    Verb::NewFollowedUserPost,
    Verb::Reshare,
];

impl Adapter for ActivityAdapter {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn allowed_verbs(&self) -> &'static [Verb] {
        if self.content_type == ContentType::Event {
            EVENT_VERBS
        } else {
            ACTIVITY_VERBS
        }
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String {
        let actor = ctx.actor.display_name();
        let object = self.content_type.as_str();
        match ctx.notification.verb {
            Verb::Mention => format!("{actor} has mentioned you in their {object}"),
            Verb::ModeratorDelete => format!("A moderator has deleted your {object}"),
            Verb::ModeratorEdit => format!("A moderator has edited your {object}"),
            Verb::ModeratorReviewRequest => {
                format!("{actor} has submitted or updated a {object} to review")
            }
            Verb::NewFollowedUserPost => format!("{actor} has submitted a new {object}"),
            Verb::NewFollowedTagPost => {
                format!("Someone has submitted a new {object} containing tags you are following")
            }
            Verb::Reshare => format!("{actor} has reshared your {object}"),
            Verb::Like => format!("{actor} has liked your {object}"),
            Verb::Flag => format!("{actor} has flagged this {object}"),
            Verb::Attend => format!("{actor} is attending your event"),
            Verb::Cancel => "An event you were attending has been canceled".to_string(),
            verb => format!("{actor}: {verb} {object}"),
        }
    }
}

pub struct CommentAdapter;

impl Adapter for CommentAdapter {
    fn content_type(&self) -> ContentType {
        ContentType::Comment
    }

    fn allowed_verbs(&self) -> &'static [Verb] {
        &[
            Verb::Flag,
            Verb::Like,
            Verb::Mention,
            Verb::ModeratorDelete,
            Verb::ModeratorEdit,
            Verb::ModeratorReviewRequest,
            Verb::NewComment,
            Verb::NewFollowedUserComment,
            Verb::NewSiblingComment,
            Verb::RepliedToComment,
        ]
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String {
        let actor = ctx.actor.display_name();
        match ctx.notification.verb {
            Verb::Mention => format!("{actor} has mentioned you in their comment"),
            Verb::ModeratorDelete => "A moderator has deleted your comment".to_string(),
            Verb::ModeratorEdit => "A moderator has edited your comment".to_string(),
            Verb::ModeratorReviewRequest => {
                format!("{actor} has submitted or updated a comment to review")
            }
            Verb::NewComment => format!("{actor} has commented on your post"),
            Verb::NewFollowedUserComment => format!("{actor} has submitted a new comment"),
            Verb::NewSiblingComment => {
                format!("{actor} has also commented on a post you commented on")
            }
            Verb::RepliedToComment => format!("{actor} has replied to your comment"),
            Verb::Like => format!("{actor} has liked your comment"),
            Verb::Flag => format!("{actor} has flagged this comment"),
            verb => format!("{actor}: {verb} comment"),
        }
    }
}

pub struct MessageAdapter;

impl Adapter for MessageAdapter {
    fn content_type(&self) -> ContentType {
        ContentType::Message
    }

    fn allowed_verbs(&self) -> &'static [Verb] {
        &[Verb::FollowUp, Verb::Message, Verb::Reply]
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String {
        let actor = ctx.actor.display_name();
        match ctx.notification.verb {
            Verb::Reply => format!("{actor} has replied to your message"),
            Verb::FollowUp => format!("{actor} has sent you a follow-up to their message"),
            _ => format!("{actor} has sent you a message"),
        }
    }
}

pub struct UserAdapter;

impl Adapter for UserAdapter {
    fn content_type(&self) -> ContentType {
        ContentType::User
    }

    fn allowed_verbs(&self) -> &'static [Verb] {
        &[Verb::NewFollower, Verb::NewMember, Verb::Update]
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String {
        let actor = ctx.actor.display_name();
        match ctx.notification.verb {
            Verb::NewFollower => format!("{actor} has started following you"),
            Verb::NewMember => format!("{actor} has joined {}", ctx.community.name),
            _ => format!("{actor} has updated their profile"),
        }
    }

    fn webpush_body(&self, _ctx: &AdapterContext<'_>) -> Option<String> {
        None
    }
}

pub struct JoinRequestAdapter;

impl Adapter for JoinRequestAdapter {
    fn content_type(&self) -> ContentType {
        ContentType::JoinRequest
    }

    fn allowed_verbs(&self) -> &'static [Verb] {
        &[Verb::Accept, Verb::Reject, Verb::Request]
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String {
        let community = &ctx.community.name;
        match ctx.notification.verb {
            Verb::Accept => format!("Your request to join {community} has been accepted"),
            Verb::Reject => format!("Your request to join {community} has been rejected"),
            _ => format!(
                "{} has requested to join this community",
                ctx.actor.display_name()
            ),
        }
    }
}

pub struct InviteAdapter;

impl Adapter for InviteAdapter {
    fn content_type(&self) -> ContentType {
        ContentType::Invite
    }

    fn allowed_verbs(&self) -> &'static [Verb] {
        &[Verb::Invite]
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String {
        format!(
            "{} has invited you to join {}",
            ctx.actor.display_name(),
            ctx.community.name
        )
    }

    fn webpush_body(&self, _ctx: &AdapterContext<'_>) -> Option<String> {
        None
    }
}

/// Community records carry no deliverable notifications.
pub struct CommunityAdapter;

impl Adapter for CommunityAdapter {
    fn content_type(&self) -> ContentType {
        ContentType::Community
    }

    fn allowed_verbs(&self) -> &'static [Verb] {
        &[]
    }

    fn email_subject(&self, ctx: &AdapterContext<'_>) -> String {
        ctx.community.name.clone()
    }
}
