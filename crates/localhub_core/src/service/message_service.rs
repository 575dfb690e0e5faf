//! Private message use-cases.

use super::{found, notify, viewer_for, ServiceResult};
use crate::model::content::{ContentRef, ContentType};
use crate::model::message::{Message, MessageId};
use crate::model::notification::Verb;
use crate::notifications::{Dispatcher, FanOut};
use crate::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use crate::repo::message_repo::{MessageDeletion, MessageRepository, SqliteMessageRepository};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::rules::{message as rules, require, Viewer};
use rusqlite::Connection;
use uuid::Uuid;

pub struct MessageService<'a> {
    conn: &'a Connection,
    dispatcher: &'a Dispatcher,
}

impl<'a> MessageService<'a> {
    pub fn new(conn: &'a Connection, dispatcher: &'a Dispatcher) -> Self {
        Self { conn, dispatcher }
    }

    fn repo(&self) -> SqliteMessageRepository<'a> {
        SqliteMessageRepository::new(self.conn)
    }

    fn load(&self, id: MessageId) -> ServiceResult<Message> {
        found(self.repo().get_message(id)?, "message", id)
    }

    /// Whether `viewer` may address `recipient` in `community` at all.
    fn can_reach(&self, viewer: &Viewer, recipient: Uuid, community: Uuid) -> ServiceResult<bool> {
        let Some(sender) = viewer.user_id else {
            return Ok(false);
        };
        let recipient_is_member = SqliteCommunityRepository::new(self.conn)
            .role_of(recipient, community)?
            .is_some();
        let blocked = SqliteUserRepository::new(self.conn).is_blocked_either_way(sender, recipient)?;
        Ok(rules::can_send(viewer, recipient, recipient_is_member, blocked))
    }

    fn deliver(&self, message: Message, verb: Verb) -> ServiceResult<Message> {
        self.repo().create_message(&message)?;
        log::info!(
            "event=message_send module=service status=ok id={} verb={}",
            message.id,
            verb
        );
        let notifications = FanOut::new(self.conn).message_sent(&message, verb)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(message)
    }

    pub fn send(
        &self,
        actor: Uuid,
        community: Uuid,
        recipient: Uuid,
        text: impl Into<String>,
    ) -> ServiceResult<Message> {
        let viewer = viewer_for(self.conn, actor, community)?;
        require(self.can_reach(&viewer, recipient, community)?, "send message")?;
        self.deliver(Message::new(community, actor, recipient, text), Verb::Message)
    }

    /// Answers a received message.
    pub fn reply(&self, actor: Uuid, parent: MessageId, text: impl Into<String>) -> ServiceResult<Message> {
        let parent = self.load(parent)?;
        let viewer = viewer_for(self.conn, actor, parent.community_id)?;
        require(
            rules::can_reply(&viewer, &parent)
                && self.can_reach(&viewer, parent.sender_id, parent.community_id)?,
            "reply to message",
        )?;
        let mut message = Message::new(parent.community_id, actor, parent.sender_id, text);
        message.parent_id = Some(parent.id);
        self.deliver(message, Verb::Reply)
    }

    /// Adds to a sent message before the recipient answered.
    pub fn follow_up(
        &self,
        actor: Uuid,
        parent: MessageId,
        text: impl Into<String>,
    ) -> ServiceResult<Message> {
        let parent = self.load(parent)?;
        let viewer = viewer_for(self.conn, actor, parent.community_id)?;
        require(
            rules::can_follow_up(&viewer, &parent)
                && self.can_reach(&viewer, parent.recipient_id, parent.community_id)?,
            "follow up message",
        )?;
        let mut message = Message::new(parent.community_id, actor, parent.recipient_id, text);
        message.parent_id = Some(parent.id);
        self.deliver(message, Verb::FollowUp)
    }

    pub fn inbox(&self, actor: Uuid, community: Uuid) -> ServiceResult<Vec<Message>> {
        Ok(self.repo().inbox(actor, community)?)
    }

    pub fn outbox(&self, actor: Uuid, community: Uuid) -> ServiceResult<Vec<Message>> {
        Ok(self.repo().outbox(actor, community)?)
    }

    pub fn conversation(&self, actor: Uuid, other: Uuid, community: Uuid) -> ServiceResult<Vec<Message>> {
        Ok(self.repo().between(actor, other, community)?)
    }

    pub fn thread(&self, actor: Uuid, root: MessageId) -> ServiceResult<Vec<Message>> {
        let root_message = self.load(root)?;
        require(root_message.is_visible_to(actor), "view message")?;
        Ok(self.repo().thread(root, actor)?)
    }

    pub fn unread_count(&self, actor: Uuid, community: Uuid) -> ServiceResult<i64> {
        Ok(self.repo().unread_count(actor, community)?)
    }

    /// Marks a received message read, along with its notifications.
    pub fn mark_read(&self, actor: Uuid, id: MessageId) -> ServiceResult<bool> {
        let marked = self.repo().mark_read(id, actor)?;
        SqliteNotificationRepository::new(self.conn)
            .mark_read_for_content(actor, ContentRef::new(ContentType::Message, id))?;
        Ok(marked)
    }

    /// Marks every received message of a thread read; returns their ids.
    pub fn mark_thread_read(&self, actor: Uuid, root: MessageId) -> ServiceResult<Vec<MessageId>> {
        let ids = self.repo().mark_thread_read(root, actor)?;
        let notifications = SqliteNotificationRepository::new(self.conn);
        for id in &ids {
            notifications.mark_read_for_content(actor, ContentRef::new(ContentType::Message, *id))?;
        }
        Ok(ids)
    }

    pub fn delete(&self, actor: Uuid, id: MessageId) -> ServiceResult<MessageDeletion> {
        let message = self.load(id)?;
        require(
            rules::can_delete(&Viewer::new(actor, None), &message),
            "delete message",
        )?;
        Ok(self.repo().delete_for(id, actor)?)
    }
}
