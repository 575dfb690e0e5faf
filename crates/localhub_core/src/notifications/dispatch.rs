//! Persistence and delivery of fanned-out notifications.

use super::adapter::{Adapter, AdapterContext, ObjectSummary};
use super::channels::{ChannelError, EmailMessage, EmailSender, PushMessage, PushSender};
use super::registry::{AdapterRegistry, RegistryError};
use crate::config::PushSettings;
use crate::model::activity::ActivityKind;
use crate::model::community::Community;
use crate::model::content::ContentType;
use crate::model::notification::Notification;
use crate::model::user::User;
use crate::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use crate::repo::comment_repo::{CommentRepository, SqliteCommentRepository};
use crate::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use crate::repo::invite_repo::{InviteRepository, SqliteInviteRepository};
use crate::repo::join_request_repo::{JoinRequestRepository, SqliteJoinRequestRepository};
use crate::repo::message_repo::{MessageRepository, SqliteMessageRepository};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{RepoError, RepoResult};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const SUMMARY_LENGTH: usize = 60;

#[derive(Debug)]
pub enum NotificationError {
    Repo(RepoError),
    Registry(RegistryError),
    Serialize(serde_json::Error),
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "push payload serialization failed: {err}"),
        }
    }
}

impl Error for NotificationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<RepoError> for NotificationError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<RegistryError> for NotificationError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Counters describing one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub stored: usize,
    pub emailed: usize,
    pub pushed: usize,
    /// Notifications not delivered: disallowed verb or vanished records.
    pub skipped: usize,
    pub subscriptions_removed: usize,
    pub failures: usize,
}

pub struct Dispatcher {
    registry: AdapterRegistry,
    email: Arc<dyn EmailSender>,
    push: Arc<dyn PushSender>,
    push_settings: PushSettings,
}

impl Dispatcher {
    pub fn new(
        registry: AdapterRegistry,
        email: Arc<dyn EmailSender>,
        push: Arc<dyn PushSender>,
        push_settings: PushSettings,
    ) -> Self {
        Self {
            registry,
            email,
            push,
            push_settings,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Stores `notifications` in one transaction, then delivers each one.
    ///
    /// Channel failures are logged and counted; they never abort the run.
    pub fn dispatch(
        &self,
        conn: &Connection,
        notifications: Vec<Notification>,
    ) -> Result<DispatchReport, NotificationError> {
        let mut report = DispatchReport::default();
        if notifications.is_empty() {
            return Ok(report);
        }
        report.stored = SqliteNotificationRepository::new(conn).insert_notifications(&notifications)?;

        for notification in &notifications {
            self.deliver(conn, notification, &mut report)?;
        }
        log::info!(
            "event=notification_dispatch module=notifications status=ok stored={} emailed={} pushed={} skipped={} failures={}",
            report.stored,
            report.emailed,
            report.pushed,
            report.skipped,
            report.failures
        );
        Ok(report)
    }

    fn deliver(
        &self,
        conn: &Connection,
        notification: &Notification,
        report: &mut DispatchReport,
    ) -> Result<(), NotificationError> {
        let adapter = self.registry.get(notification.content.content_type)?;
        if !adapter.is_allowed(notification.verb) {
            log::debug!(
                "event=notification_skip module=notifications status=disallowed verb={} content={}",
                notification.verb,
                notification.content
            );
            report.skipped += 1;
            return Ok(());
        }
        let Some(parts) = load_parts(conn, notification)? else {
            log::warn!(
                "event=notification_skip module=notifications status=missing_record content={}",
                notification.content
            );
            report.skipped += 1;
            return Ok(());
        };
        let ctx = AdapterContext {
            notification,
            community: &parts.community,
            actor: &parts.actor,
            recipient: &parts.recipient,
            object: &parts.object,
        };

        if parts.recipient.send_email_notifications {
            let message = self.email_message(adapter.as_ref(), &ctx);
            match self.email.send(&message) {
                Ok(()) => report.emailed += 1,
                Err(err) => {
                    report.failures += 1;
                    log::warn!(
                        "event=notification_email module=notifications status=error error={err}"
                    );
                }
            }
        }
        self.push_to_subscriptions(conn, adapter.as_ref(), &ctx, report)
    }

    fn email_message(&self, adapter: &dyn Adapter, ctx: &AdapterContext<'_>) -> EmailMessage {
        let verb = ctx.notification.verb;
        let prefix = template_prefix(adapter.content_type());
        EmailMessage {
            subject: format!("{} | {}", ctx.community.name, adapter.email_subject(ctx)),
            from: ctx.community.resolve_email("no-reply"),
            to: ctx.recipient.email.clone(),
            plain_templates: adapter.template_names(verb, &prefix, ".txt"),
            html_templates: adapter.template_names(verb, &prefix, ".html"),
            url: adapter.absolute_url(ctx),
        }
    }

    fn push_to_subscriptions(
        &self,
        conn: &Connection,
        adapter: &dyn Adapter,
        ctx: &AdapterContext<'_>,
        report: &mut DispatchReport,
    ) -> Result<(), NotificationError> {
        let repo = SqliteNotificationRepository::new(conn);
        let subscriptions =
            repo.subscriptions_for(ctx.notification.recipient_id, ctx.community.id)?;
        if subscriptions.is_empty() {
            return Ok(());
        }
        let payload =
            serde_json::to_string(&adapter.webpush_payload(ctx, &self.push_settings.icon_url))?;
        for subscription in subscriptions {
            let message = PushMessage {
                subscription: subscription.info(),
                payload: payload.clone(),
                ttl_seconds: self.push_settings.ttl_seconds,
                vapid_admin_email: self.push_settings.vapid_admin_email.clone(),
            };
            match self.push.push(&message) {
                Ok(()) => report.pushed += 1,
                Err(ChannelError::Gone) => {
                    if repo.remove_subscription(subscription.id)? {
                        report.subscriptions_removed += 1;
                    }
                    log::info!(
                        "event=push_subscription_remove module=notifications status=gone subscription_id={}",
                        subscription.id
                    );
                }
                Err(err) => {
                    report.failures += 1;
                    log::warn!(
                        "event=notification_push module=notifications status=error subscription_id={} error={err}",
                        subscription.id
                    );
                }
            }
        }
        Ok(())
    }
}

struct Parts {
    community: Community,
    actor: User,
    recipient: User,
    object: ObjectSummary,
}

fn load_parts(conn: &Connection, notification: &Notification) -> RepoResult<Option<Parts>> {
    let users = SqliteUserRepository::new(conn);
    let Some(community) =
        SqliteCommunityRepository::new(conn).get_community(notification.community_id)?
    else {
        return Ok(None);
    };
    let (Some(actor), Some(recipient)) = (
        users.get_user(notification.actor_id)?,
        users.get_user(notification.recipient_id)?,
    ) else {
        return Ok(None);
    };
    let Some(object) = describe_object(conn, notification)? else {
        return Ok(None);
    };
    Ok(Some(Parts {
        community,
        actor,
        recipient,
        object,
    }))
}

/// Title and site path of the notification target, `None` once it is gone.
fn describe_object(
    conn: &Connection,
    notification: &Notification,
) -> RepoResult<Option<ObjectSummary>> {
    let id = notification.content.object_id;
    let summary = |title: String, path: String| Some(ObjectSummary { title, path });
    Ok(match notification.content.content_type {
        ContentType::Post | ContentType::Photo | ContentType::Event | ContentType::Poll => {
            let Some(kind) = ActivityKind::from_content_type(notification.content.content_type)
            else {
                return Ok(None);
            };
            SqliteActivityRepository::new(conn)
                .get_any(kind, id)?
                .and_then(|activity| {
                    summary(
                        activity.core().title.clone(),
                        format!("/{}/{}/", kind.table(), id),
                    )
                })
        }
        ContentType::Comment => SqliteCommentRepository::new(conn)
            .get_comment(id)?
            .and_then(|comment| {
                summary(comment.abbreviate(SUMMARY_LENGTH), format!("/comments/{id}/"))
            }),
        ContentType::Message => SqliteMessageRepository::new(conn)
            .get_message(id)?
            .and_then(|message| {
                summary(message.abbreviate(SUMMARY_LENGTH), format!("/messages/{id}/"))
            }),
        ContentType::User => SqliteUserRepository::new(conn)
            .get_user(id)?
            .and_then(|user| {
                summary(
                    user.display_name().to_string(),
                    format!("/people/{}/", user.username),
                )
            }),
        ContentType::JoinRequest => SqliteJoinRequestRepository::new(conn)
            .get_join_request(id)?
            .and_then(|request| {
                summary(
                    crate::text::abbreviate(&request.intro, SUMMARY_LENGTH),
                    format!("/join-requests/{id}/"),
                )
            }),
        ContentType::Invite => SqliteInviteRepository::new(conn)
            .get_invite(id)?
            .and_then(|invite| summary(invite.email, format!("/invites/{id}/"))),
        ContentType::Community => SqliteCommunityRepository::new(conn)
            .get_community(id)?
            .and_then(|community| summary(community.name, "/".to_string())),
    })
}

fn template_prefix(content_type: ContentType) -> String {
    let app = match content_type {
        ContentType::Post | ContentType::Photo | ContentType::Event | ContentType::Poll => {
            "activities"
        }
        ContentType::Comment => "comments",
        ContentType::Message => "private_messages",
        ContentType::User => "users",
        ContentType::JoinRequest => "join_requests",
        ContentType::Invite => "invites",
        ContentType::Community => "communities",
    };
    format!("{app}/emails")
}
