//! Likes, flags and bookmarks.

use super::{get_content_ref, get_opt_uuid, get_uuid, RepoError, RepoResult};
use crate::model::content::ContentRef;
use crate::model::interaction::{Bookmark, Flag, FlagReason, Like};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub trait InteractionRepository {
    fn like(&self, like: &Like) -> RepoResult<()>;
    /// Returns whether a like was removed.
    fn unlike(&self, user: Uuid, content: ContentRef) -> RepoResult<bool>;
    fn has_liked(&self, user: Uuid, content: ContentRef) -> RepoResult<bool>;
    fn like_count(&self, content: ContentRef) -> RepoResult<i64>;

    fn flag(&self, flag: &Flag) -> RepoResult<()>;
    fn flags_for(&self, content: ContentRef) -> RepoResult<Vec<Flag>>;
    fn has_flagged(&self, user: Uuid, content: ContentRef) -> RepoResult<bool>;
    /// Records `moderator` as reviewer on every flag of `content`.
    fn mark_flags_reviewed(&self, content: ContentRef, moderator: Uuid) -> RepoResult<usize>;
    fn delete_flags_for(&self, content: ContentRef) -> RepoResult<usize>;

    fn bookmark(&self, bookmark: &Bookmark) -> RepoResult<()>;
    fn unbookmark(&self, user: Uuid, content: ContentRef) -> RepoResult<bool>;
    fn has_bookmarked(&self, user: Uuid, content: ContentRef) -> RepoResult<bool>;
}

pub struct SqliteInteractionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInteractionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn exists(&self, table: &str, user: Uuid, content: ContentRef) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {table}
                     WHERE user_id = ?1 AND object_type = ?2 AND object_id = ?3;"
                ),
                params![
                    user.to_string(),
                    content.content_type.as_str(),
                    content.object_id.to_string()
                ],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn remove(&self, table: &str, user: Uuid, content: ContentRef) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "DELETE FROM {table} WHERE user_id = ?1 AND object_type = ?2 AND object_id = ?3;"
            ),
            params![
                user.to_string(),
                content.content_type.as_str(),
                content.object_id.to_string()
            ],
        )?;
        Ok(changed > 0)
    }
}

impl InteractionRepository for SqliteInteractionRepository<'_> {
    fn like(&self, like: &Like) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO likes (id, user_id, recipient_id, community_id, object_type, object_id, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                like.id.to_string(),
                like.user_id.to_string(),
                like.recipient_id.to_string(),
                like.community_id.to_string(),
                like.content.content_type.as_str(),
                like.content.object_id.to_string(),
                like.created,
            ],
        )?;
        Ok(())
    }

    fn unlike(&self, user: Uuid, content: ContentRef) -> RepoResult<bool> {
        self.remove("likes", user, content)
    }

    fn has_liked(&self, user: Uuid, content: ContentRef) -> RepoResult<bool> {
        self.exists("likes", user, content)
    }

    fn like_count(&self, content: ContentRef) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE object_type = ?1 AND object_id = ?2;",
            params![content.content_type.as_str(), content.object_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn flag(&self, flag: &Flag) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO flags (id, user_id, community_id, object_type, object_id, reason, moderator_id, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                flag.id.to_string(),
                flag.user_id.to_string(),
                flag.community_id.to_string(),
                flag.content.content_type.as_str(),
                flag.content.object_id.to_string(),
                flag.reason.as_str(),
                flag.moderator_id.map(|id| id.to_string()),
                flag.created,
            ],
        )?;
        Ok(())
    }

    fn flags_for(&self, content: ContentRef) -> RepoResult<Vec<Flag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, community_id, object_type, object_id, reason, moderator_id, created
             FROM flags
             WHERE object_type = ?1 AND object_id = ?2
             ORDER BY created DESC, id;",
        )?;
        let mut rows = stmt.query(params![
            content.content_type.as_str(),
            content.object_id.to_string()
        ])?;
        let mut flags = Vec::new();
        while let Some(row) = rows.next()? {
            flags.push(parse_flag_row(row)?);
        }
        Ok(flags)
    }

    fn has_flagged(&self, user: Uuid, content: ContentRef) -> RepoResult<bool> {
        self.exists("flags", user, content)
    }

    fn mark_flags_reviewed(&self, content: ContentRef, moderator: Uuid) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE flags SET moderator_id = ?1 WHERE object_type = ?2 AND object_id = ?3;",
            params![
                moderator.to_string(),
                content.content_type.as_str(),
                content.object_id.to_string()
            ],
        )?;
        Ok(changed)
    }

    fn delete_flags_for(&self, content: ContentRef) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM flags WHERE object_type = ?1 AND object_id = ?2;",
            params![content.content_type.as_str(), content.object_id.to_string()],
        )?;
        Ok(changed)
    }

    fn bookmark(&self, bookmark: &Bookmark) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO bookmarks (id, user_id, community_id, object_type, object_id, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                bookmark.id.to_string(),
                bookmark.user_id.to_string(),
                bookmark.community_id.to_string(),
                bookmark.content.content_type.as_str(),
                bookmark.content.object_id.to_string(),
                bookmark.created,
            ],
        )?;
        Ok(())
    }

    fn unbookmark(&self, user: Uuid, content: ContentRef) -> RepoResult<bool> {
        self.remove("bookmarks", user, content)
    }

    fn has_bookmarked(&self, user: Uuid, content: ContentRef) -> RepoResult<bool> {
        self.exists("bookmarks", user, content)
    }
}

fn parse_flag_row(row: &Row<'_>) -> RepoResult<Flag> {
    let reason_text: String = row.get("reason")?;
    let reason = FlagReason::parse(&reason_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid reason `{reason_text}` in flags.reason"))
    })?;
    Ok(Flag {
        id: get_uuid(row, "id")?,
        user_id: get_uuid(row, "user_id")?,
        community_id: get_uuid(row, "community_id")?,
        content: get_content_ref(row)?,
        reason,
        moderator_id: get_opt_uuid(row, "moderator_id")?,
        created: row.get("created")?,
    })
}
