//! Private message persistence.
//!
//! # Invariants
//! - Listings for a user never include messages that user deleted.
//! - A message deleted by both sides is removed from storage.

use super::{ensure_changed, get_opt_uuid, get_uuid, RepoResult};
use crate::model::message::{Message, MessageId};
use crate::model::now_ms;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id,
    community_id,
    sender_id,
    recipient_id,
    message,
    parent_id,
    read,
    sender_deleted,
    recipient_deleted,
    created";

/// Outcome of deleting one side of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDeletion {
    /// Hidden for the deleting user only.
    Hidden,
    /// Both sides deleted, row removed.
    Removed,
}

pub trait MessageRepository {
    fn create_message(&self, message: &Message) -> RepoResult<MessageId>;
    fn get_message(&self, id: MessageId) -> RepoResult<Option<Message>>;
    /// Received messages, newest first.
    fn inbox(&self, recipient: Uuid, community: Uuid) -> RepoResult<Vec<Message>>;
    /// Sent messages, newest first.
    fn outbox(&self, sender: Uuid, community: Uuid) -> RepoResult<Vec<Message>>;
    /// Messages exchanged between `user` and `other` that `user` can see, oldest first.
    fn between(&self, user: Uuid, other: Uuid, community: Uuid) -> RepoResult<Vec<Message>>;
    /// `root` and all replies below it that `user` can see, oldest first.
    fn thread(&self, root: MessageId, user: Uuid) -> RepoResult<Vec<Message>>;
    fn unread_count(&self, recipient: Uuid, community: Uuid) -> RepoResult<i64>;
    fn mark_read(&self, id: MessageId, recipient: Uuid) -> RepoResult<bool>;
    /// Marks read every unread message addressed to `recipient` in the thread of `root`.
    fn mark_thread_read(&self, root: MessageId, recipient: Uuid) -> RepoResult<Vec<MessageId>>;
    fn delete_for(&self, id: MessageId, user: Uuid) -> RepoResult<MessageDeletion>;
}

pub struct SqliteMessageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMessageRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, values: impl rusqlite::Params) -> RepoResult<Vec<Message>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(values)?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(parse_message_row(row)?);
        }
        Ok(messages)
    }
}

impl MessageRepository for SqliteMessageRepository<'_> {
    fn create_message(&self, message: &Message) -> RepoResult<MessageId> {
        message.validate()?;
        self.conn.execute(
            &format!(
                "INSERT INTO messages ({MESSAGE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);"
            ),
            params![
                message.id.to_string(),
                message.community_id.to_string(),
                message.sender_id.to_string(),
                message.recipient_id.to_string(),
                message.message.as_str(),
                message.parent_id.map(|id| id.to_string()),
                message.read,
                message.sender_deleted,
                message.recipient_deleted,
                message.created,
            ],
        )?;
        Ok(message.id)
    }

    fn get_message(&self, id: MessageId) -> RepoResult<Option<Message>> {
        Ok(self
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn inbox(&self, recipient: Uuid, community: Uuid) -> RepoResult<Vec<Message>> {
        self.query(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE recipient_id = ?1 AND community_id = ?2 AND recipient_deleted IS NULL
                 ORDER BY created DESC, id;"
            ),
            params![recipient.to_string(), community.to_string()],
        )
    }

    fn outbox(&self, sender: Uuid, community: Uuid) -> RepoResult<Vec<Message>> {
        self.query(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE sender_id = ?1 AND community_id = ?2 AND sender_deleted IS NULL
                 ORDER BY created DESC, id;"
            ),
            params![sender.to_string(), community.to_string()],
        )
    }

    fn between(&self, user: Uuid, other: Uuid, community: Uuid) -> RepoResult<Vec<Message>> {
        self.query(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE community_id = ?3
                   AND ((sender_id = ?1 AND recipient_id = ?2 AND sender_deleted IS NULL)
                     OR (sender_id = ?2 AND recipient_id = ?1 AND recipient_deleted IS NULL))
                 ORDER BY created, id;"
            ),
            params![user.to_string(), other.to_string(), community.to_string()],
        )
    }

    fn thread(&self, root: MessageId, user: Uuid) -> RepoResult<Vec<Message>> {
        self.query(
            &format!(
                "WITH RECURSIVE thread(id) AS (
                    SELECT id FROM messages WHERE id = ?1
                    UNION
                    SELECT m.id FROM messages m JOIN thread t ON m.parent_id = t.id
                 )
                 SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE id IN (SELECT id FROM thread)
                   AND ((sender_id = ?2 AND sender_deleted IS NULL)
                     OR (recipient_id = ?2 AND recipient_deleted IS NULL))
                 ORDER BY created, id;"
            ),
            params![root.to_string(), user.to_string()],
        )
    }

    fn unread_count(&self, recipient: Uuid, community: Uuid) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE recipient_id = ?1 AND community_id = ?2
               AND read IS NULL AND recipient_deleted IS NULL;",
            params![recipient.to_string(), community.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn mark_read(&self, id: MessageId, recipient: Uuid) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE messages SET read = ?1 WHERE id = ?2 AND recipient_id = ?3 AND read IS NULL;",
            params![now_ms(), id.to_string(), recipient.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn mark_thread_read(&self, root: MessageId, recipient: Uuid) -> RepoResult<Vec<MessageId>> {
        let unread: Vec<MessageId> = self
            .thread(root, recipient)?
            .into_iter()
            .filter(|message| message.recipient_id == recipient && message.read.is_none())
            .map(|message| message.id)
            .collect();
        let tx = self.conn.unchecked_transaction()?;
        let now = now_ms();
        for id in &unread {
            tx.execute(
                "UPDATE messages SET read = ?1 WHERE id = ?2;",
                params![now, id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(unread)
    }

    fn delete_for(&self, id: MessageId, user: Uuid) -> RepoResult<MessageDeletion> {
        let now = now_ms();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE messages
             SET
                sender_deleted = CASE WHEN sender_id = ?2 THEN ?1 ELSE sender_deleted END,
                recipient_deleted = CASE WHEN recipient_id = ?2 THEN ?1 ELSE recipient_deleted END
             WHERE id = ?3 AND (sender_id = ?2 OR recipient_id = ?2);",
            params![now, user.to_string(), id.to_string()],
        )?;
        ensure_changed(changed, "message", id)?;
        let removed = tx.execute(
            "DELETE FROM messages
             WHERE id = ?1 AND sender_deleted IS NOT NULL AND recipient_deleted IS NOT NULL;",
            [id.to_string()],
        )?;
        if removed > 0 {
            tx.execute(
                "DELETE FROM notifications WHERE object_type = 'message' AND object_id = ?1;",
                [id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(if removed > 0 {
            MessageDeletion::Removed
        } else {
            MessageDeletion::Hidden
        })
    }
}

fn parse_message_row(row: &Row<'_>) -> RepoResult<Message> {
    Ok(Message {
        id: get_uuid(row, "id")?,
        community_id: get_uuid(row, "community_id")?,
        sender_id: get_uuid(row, "sender_id")?,
        recipient_id: get_uuid(row, "recipient_id")?,
        message: row.get("message")?,
        parent_id: get_opt_uuid(row, "parent_id")?,
        read: row.get("read")?,
        sender_deleted: row.get("sender_deleted")?,
        recipient_deleted: row.get("recipient_deleted")?,
        created: row.get("created")?,
    })
}
