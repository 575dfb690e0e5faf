//! Notification and push subscription persistence.

use super::{ensure_changed, get_bool, get_content_ref, get_uuid, RepoError, RepoResult};
use crate::model::content::ContentRef;
use crate::model::notification::{Notification, NotificationId, PushSubscription, Verb};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    n.id,
    n.community_id,
    n.actor_id,
    n.recipient_id,
    n.object_type,
    n.object_id,
    n.verb,
    n.is_read,
    n.created
FROM notifications n
JOIN users actor ON actor.id = n.actor_id";

/// Filter applied to recipient listings: active actors not blocked by the recipient.
const VISIBLE_FILTER_SQL: &str = "n.recipient_id = ?1
    AND n.community_id = ?2
    AND actor.is_active = 1
    AND NOT EXISTS (
        SELECT 1 FROM user_blocks b
        WHERE b.blocker_id = n.recipient_id AND b.blocked_id = n.actor_id)";

pub trait NotificationRepository {
    /// Stores every notification in one transaction.
    fn insert_notifications(&self, notifications: &[Notification]) -> RepoResult<usize>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    /// Newest first; `unread_only` narrows to unread ones.
    fn notifications_for(
        &self,
        recipient: Uuid,
        community: Uuid,
        unread_only: bool,
    ) -> RepoResult<Vec<Notification>>;
    fn unread_count(&self, recipient: Uuid, community: Uuid) -> RepoResult<i64>;
    fn mark_read(&self, id: NotificationId, recipient: Uuid) -> RepoResult<()>;
    fn mark_all_read(&self, recipient: Uuid, community: Uuid) -> RepoResult<usize>;
    /// Marks read every notification of `recipient` about `content`.
    fn mark_read_for_content(&self, recipient: Uuid, content: ContentRef) -> RepoResult<usize>;
    fn delete_notification(&self, id: NotificationId, recipient: Uuid) -> RepoResult<()>;
    fn delete_for_content(&self, content: ContentRef) -> RepoResult<usize>;

    /// Returns false when the same subscription already exists.
    fn add_subscription(&self, subscription: &PushSubscription) -> RepoResult<bool>;
    fn subscriptions_for(&self, user: Uuid, community: Uuid) -> RepoResult<Vec<PushSubscription>>;
    fn remove_subscription(&self, id: Uuid) -> RepoResult<bool>;
    fn remove_subscription_by_keys(
        &self,
        user: Uuid,
        community: Uuid,
        auth: &str,
        p256dh: &str,
    ) -> RepoResult<bool>;
}

pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn insert_notifications(&self, notifications: &[Notification]) -> RepoResult<usize> {
        if notifications.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notifications (
                    id,
                    community_id,
                    actor_id,
                    recipient_id,
                    object_type,
                    object_id,
                    verb,
                    is_read,
                    created
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            )?;
            for notification in notifications {
                stmt.execute(params![
                    notification.id.to_string(),
                    notification.community_id.to_string(),
                    notification.actor_id.to_string(),
                    notification.recipient_id.to_string(),
                    notification.content.content_type.as_str(),
                    notification.content.object_id.to_string(),
                    notification.verb.as_str(),
                    i64::from(notification.is_read),
                    notification.created,
                ])?;
            }
        }
        tx.commit()?;
        Ok(notifications.len())
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE n.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_notification_row(row)?)),
            None => Ok(None),
        }
    }

    fn notifications_for(
        &self,
        recipient: Uuid,
        community: Uuid,
        unread_only: bool,
    ) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE {VISIBLE_FILTER_SQL}
               AND (?3 = 0 OR n.is_read = 0)
             ORDER BY n.created DESC, n.id;"
        ))?;
        let mut rows = stmt.query(params![
            recipient.to_string(),
            community.to_string(),
            i64::from(unread_only),
        ])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn unread_count(&self, recipient: Uuid, community: Uuid) -> RepoResult<i64> {
        let count = self.conn.query_row(
            &format!(
                "SELECT COUNT(*)
                 FROM notifications n
                 JOIN users actor ON actor.id = n.actor_id
                 WHERE {VISIBLE_FILTER_SQL} AND n.is_read = 0;"
            ),
            params![recipient.to_string(), community.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn mark_read(&self, id: NotificationId, recipient: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2;",
            params![id.to_string(), recipient.to_string()],
        )?;
        ensure_changed(changed, "notification", id)
    }

    fn mark_all_read(&self, recipient: Uuid, community: Uuid) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1
             WHERE recipient_id = ?1 AND community_id = ?2 AND is_read = 0;",
            params![recipient.to_string(), community.to_string()],
        )?;
        Ok(changed)
    }

    fn mark_read_for_content(&self, recipient: Uuid, content: ContentRef) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1
             WHERE recipient_id = ?1 AND object_type = ?2 AND object_id = ?3 AND is_read = 0;",
            params![
                recipient.to_string(),
                content.content_type.as_str(),
                content.object_id.to_string()
            ],
        )?;
        Ok(changed)
    }

    fn delete_notification(&self, id: NotificationId, recipient: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND recipient_id = ?2;",
            params![id.to_string(), recipient.to_string()],
        )?;
        ensure_changed(changed, "notification", id)
    }

    fn delete_for_content(&self, content: ContentRef) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM notifications WHERE object_type = ?1 AND object_id = ?2;",
            params![content.content_type.as_str(), content.object_id.to_string()],
        )?;
        Ok(changed)
    }

    fn add_subscription(&self, subscription: &PushSubscription) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO push_subscriptions (id, user_id, community_id, endpoint, auth, p256dh)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                subscription.id.to_string(),
                subscription.user_id.to_string(),
                subscription.community_id.to_string(),
                subscription.endpoint.as_str(),
                subscription.auth.as_str(),
                subscription.p256dh.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn subscriptions_for(&self, user: Uuid, community: Uuid) -> RepoResult<Vec<PushSubscription>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, community_id, endpoint, auth, p256dh
             FROM push_subscriptions
             WHERE user_id = ?1 AND community_id = ?2
             ORDER BY id;",
        )?;
        let mut rows = stmt.query(params![user.to_string(), community.to_string()])?;
        let mut subscriptions = Vec::new();
        while let Some(row) = rows.next()? {
            subscriptions.push(PushSubscription {
                id: get_uuid(row, "id")?,
                user_id: get_uuid(row, "user_id")?,
                community_id: get_uuid(row, "community_id")?,
                endpoint: row.get("endpoint")?,
                auth: row.get("auth")?,
                p256dh: row.get("p256dh")?,
            });
        }
        Ok(subscriptions)
    }

    fn remove_subscription(&self, id: Uuid) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM push_subscriptions WHERE id = ?1;",
            [id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn remove_subscription_by_keys(
        &self,
        user: Uuid,
        community: Uuid,
        auth: &str,
        p256dh: &str,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM push_subscriptions
             WHERE user_id = ?1 AND community_id = ?2 AND auth = ?3 AND p256dh = ?4;",
            params![user.to_string(), community.to_string(), auth, p256dh],
        )?;
        Ok(changed > 0)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let verb_text: String = row.get("verb")?;
    let verb = Verb::parse(&verb_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid verb `{verb_text}` in notifications.verb"))
    })?;
    Ok(Notification {
        id: get_uuid(row, "id")?,
        community_id: get_uuid(row, "community_id")?,
        actor_id: get_uuid(row, "actor_id")?,
        recipient_id: get_uuid(row, "recipient_id")?,
        content: get_content_ref(row)?,
        verb,
        is_read: get_bool(row, "is_read")?,
        created: row.get("created")?,
    })
}
