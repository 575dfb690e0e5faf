//! Comment persistence.

use super::{ensure_changed, get_content_ref, get_opt_uuid, get_uuid, RepoResult};
use crate::model::comment::{Comment, CommentId};
use crate::model::content::ContentRef;
use crate::model::now_ms;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const COMMENT_SELECT_SQL: &str = "SELECT
    id,
    community_id,
    owner_id,
    editor_id,
    object_type,
    object_id,
    parent_id,
    content,
    deleted,
    edited,
    created,
    updated
FROM comments";

pub trait CommentRepository {
    fn create_comment(&self, comment: &Comment) -> RepoResult<CommentId>;
    fn update_comment(&self, comment: &Comment) -> RepoResult<()>;
    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>>;
    /// Removes the comment and its likes, flags, bookmarks and notifications.
    fn delete_comment(&self, id: CommentId) -> RepoResult<()>;
    fn soft_delete_comment(&self, id: CommentId) -> RepoResult<()>;
    /// Comments on `content`, oldest first.
    fn comments_for(&self, content: ContentRef, include_deleted: bool)
        -> RepoResult<Vec<Comment>>;
    /// Distinct owners of non-deleted comments on `content`.
    fn commenters(&self, content: ContentRef) -> RepoResult<Vec<Uuid>>;
}

pub struct SqliteCommentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CommentRepository for SqliteCommentRepository<'_> {
    fn create_comment(&self, comment: &Comment) -> RepoResult<CommentId> {
        comment.validate()?;
        self.conn.execute(
            "INSERT INTO comments (
                id,
                community_id,
                owner_id,
                editor_id,
                object_type,
                object_id,
                parent_id,
                content,
                deleted,
                edited,
                created,
                updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                comment.id.to_string(),
                comment.community_id.to_string(),
                comment.owner_id.to_string(),
                comment.editor_id.map(|id| id.to_string()),
                comment.content_object.content_type.as_str(),
                comment.content_object.object_id.to_string(),
                comment.parent_id.map(|id| id.to_string()),
                comment.content.as_str(),
                comment.deleted,
                comment.edited,
                comment.created,
                comment.updated,
            ],
        )?;
        Ok(comment.id)
    }

    fn update_comment(&self, comment: &Comment) -> RepoResult<()> {
        comment.validate()?;
        let changed = self.conn.execute(
            "UPDATE comments
             SET
                editor_id = ?1,
                content = ?2,
                deleted = ?3,
                edited = ?4,
                updated = ?5
             WHERE id = ?6;",
            params![
                comment.editor_id.map(|id| id.to_string()),
                comment.content.as_str(),
                comment.deleted,
                comment.edited,
                now_ms(),
                comment.id.to_string(),
            ],
        )?;
        ensure_changed(changed, "comment", comment.id)
    }

    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_comment_row(row)?)),
            None => Ok(None),
        }
    }

    fn delete_comment(&self, id: CommentId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for table in ["likes", "flags", "bookmarks", "notifications"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE object_type = 'comment' AND object_id = ?1;"),
                [id.to_string()],
            )?;
        }
        let changed = tx.execute("DELETE FROM comments WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, "comment", id)?;
        tx.commit()?;
        Ok(())
    }

    fn soft_delete_comment(&self, id: CommentId) -> RepoResult<()> {
        let now = now_ms();
        let changed = self.conn.execute(
            "UPDATE comments SET deleted = ?1, updated = ?1 WHERE id = ?2;",
            params![now, id.to_string()],
        )?;
        ensure_changed(changed, "comment", id)
    }

    fn comments_for(
        &self,
        content: ContentRef,
        include_deleted: bool,
    ) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE object_type = ?1 AND object_id = ?2
               AND (?3 = 1 OR deleted IS NULL)
             ORDER BY created, id;"
        ))?;
        let mut rows = stmt.query(params![
            content.content_type.as_str(),
            content.object_id.to_string(),
            i64::from(include_deleted),
        ])?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }

    fn commenters(&self, content: ContentRef) -> RepoResult<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT owner_id
             FROM comments
             WHERE object_type = ?1 AND object_id = ?2 AND deleted IS NULL
             ORDER BY owner_id;",
        )?;
        let mut rows = stmt.query(params![
            content.content_type.as_str(),
            content.object_id.to_string()
        ])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(get_uuid(row, "owner_id")?);
        }
        Ok(ids)
    }
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    Ok(Comment {
        id: get_uuid(row, "id")?,
        community_id: get_uuid(row, "community_id")?,
        owner_id: get_uuid(row, "owner_id")?,
        editor_id: get_opt_uuid(row, "editor_id")?,
        content_object: get_content_ref(row)?,
        parent_id: get_opt_uuid(row, "parent_id")?,
        content: row.get("content")?,
        deleted: row.get("deleted")?,
        edited: row.get("edited")?,
        created: row.get("created")?,
        updated: row.get("updated")?,
    })
}
