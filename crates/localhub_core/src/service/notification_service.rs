//! Notification inbox and web-push subscription use-cases.

use super::{viewer_for, ServiceError, ServiceResult};
use crate::model::notification::{Notification, NotificationId, PushSubscription, SubscriptionInfo};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::rules::{community as community_rules, require};
use rusqlite::Connection;
use uuid::Uuid;

pub struct NotificationService<'a> {
    conn: &'a Connection,
}

impl<'a> NotificationService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn repo(&self) -> SqliteNotificationRepository<'a> {
        SqliteNotificationRepository::new(self.conn)
    }

    pub fn list(
        &self,
        actor: Uuid,
        community: Uuid,
        unread_only: bool,
    ) -> ServiceResult<Vec<Notification>> {
        Ok(self.repo().notifications_for(actor, community, unread_only)?)
    }

    pub fn unread_count(&self, actor: Uuid, community: Uuid) -> ServiceResult<i64> {
        Ok(self.repo().unread_count(actor, community)?)
    }

    pub fn mark_read(&self, actor: Uuid, id: NotificationId) -> ServiceResult<()> {
        Ok(self.repo().mark_read(id, actor)?)
    }

    pub fn mark_all_read(&self, actor: Uuid, community: Uuid) -> ServiceResult<usize> {
        Ok(self.repo().mark_all_read(actor, community)?)
    }

    pub fn delete(&self, actor: Uuid, id: NotificationId) -> ServiceResult<()> {
        Ok(self.repo().delete_notification(id, actor)?)
    }

    /// Registers the subscription JSON posted by the browser push API.
    ///
    /// Returns `false` when the same subscription already exists.
    pub fn subscribe(&self, actor: Uuid, community: Uuid, subscription_json: &str) -> ServiceResult<bool> {
        let viewer = viewer_for(self.conn, actor, community)?;
        require(community_rules::can_view(&viewer), "subscribe to notifications")?;
        let info = parse_subscription(subscription_json)?;
        let added = self
            .repo()
            .add_subscription(&PushSubscription::from_info(actor, community, info))?;
        log::info!(
            "event=push_subscribe module=service status=ok user_id={actor} community_id={community} added={added}"
        );
        Ok(added)
    }

    pub fn unsubscribe(
        &self,
        actor: Uuid,
        community: Uuid,
        subscription_json: &str,
    ) -> ServiceResult<bool> {
        let info = parse_subscription(subscription_json)?;
        Ok(self.repo().remove_subscription_by_keys(
            actor,
            community,
            &info.keys.auth,
            &info.keys.p256dh,
        )?)
    }
}

fn parse_subscription(json: &str) -> ServiceResult<SubscriptionInfo> {
    let info: SubscriptionInfo = serde_json::from_str(json)
        .map_err(|err| ServiceError::InvalidInput(format!("invalid subscription: {err}")))?;
    if info.endpoint.trim().is_empty() || info.keys.auth.is_empty() || info.keys.p256dh.is_empty() {
        return Err(ServiceError::InvalidInput(
            "subscription requires endpoint, auth and p256dh".to_string(),
        ));
    }
    Ok(info)
}
