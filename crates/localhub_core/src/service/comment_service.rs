//! Comment use-cases.

use super::activity_service::Removal;
use super::{found, notify, viewer_for, ServiceError, ServiceResult};
use crate::model::activity::{ActivityKind, AnyActivity};
use crate::model::comment::{Comment, CommentId};
use crate::model::content::{ContentRef, ContentType};
use crate::model::interaction::{Bookmark, Flag, FlagReason, Like};
use crate::model::now_ms;
use crate::notifications::{Dispatcher, FanOut};
use crate::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use crate::repo::comment_repo::{CommentRepository, SqliteCommentRepository};
use crate::repo::interaction_repo::{InteractionRepository, SqliteInteractionRepository};
use crate::rules::{activity as activity_rules, comment as rules, require};
use rusqlite::Connection;
use uuid::Uuid;

pub struct CommentService<'a> {
    conn: &'a Connection,
    dispatcher: &'a Dispatcher,
}

impl<'a> CommentService<'a> {
    pub fn new(conn: &'a Connection, dispatcher: &'a Dispatcher) -> Self {
        Self { conn, dispatcher }
    }

    fn repo(&self) -> SqliteCommentRepository<'a> {
        SqliteCommentRepository::new(self.conn)
    }

    fn load(&self, id: CommentId) -> ServiceResult<Comment> {
        found(self.repo().get_comment(id)?, "comment", id)
    }

    fn commented_activity(&self, content: ContentRef) -> ServiceResult<AnyActivity> {
        let kind = ActivityKind::from_content_type(content.content_type).ok_or_else(|| {
            ServiceError::InvalidInput(format!("{} does not accept comments", content.content_type))
        })?;
        found(
            SqliteActivityRepository::new(self.conn).get_any(kind, content.object_id)?,
            kind.as_str(),
            content.object_id,
        )
    }

    /// Comments on an activity, or replies to `parent` when given.
    pub fn create(
        &self,
        actor: Uuid,
        content: ContentRef,
        text: impl Into<String>,
        parent: Option<CommentId>,
    ) -> ServiceResult<Comment> {
        let activity = self.commented_activity(content)?;
        let core = activity.core();
        let viewer = viewer_for(self.conn, actor, core.community_id)?;

        match parent {
            Some(parent_id) => {
                let parent = self.load(parent_id)?;
                if parent.content_object != content {
                    return Err(ServiceError::InvalidInput(format!(
                        "comment {parent_id} belongs to another object"
                    )));
                }
                let accepts = core.allow_comments && core.is_published();
                require(rules::can_reply(&viewer, &parent, accepts), "reply to comment")?;
            }
            None => require(activity_rules::can_comment(&viewer, core), "comment")?,
        }

        let mut comment = Comment::new(core.community_id, actor, content, text);
        comment.parent_id = parent;
        self.repo().create_comment(&comment)?;
        log::info!(
            "event=comment_create module=service status=ok id={} content={}",
            comment.id,
            content
        );
        let notifications = FanOut::new(self.conn).comment_created(&comment)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(comment)
    }

    pub fn update(&self, actor: Uuid, id: CommentId, text: impl Into<String>) -> ServiceResult<Comment> {
        let mut comment = self.load(id)?;
        let viewer = viewer_for(self.conn, actor, comment.community_id)?;
        require(
            rules::can_change(&viewer, &comment) || rules::can_moderate_edit(&viewer, &comment),
            "change comment",
        )?;

        let text = text.into();
        let changed = comment.content != text;
        comment.content = text;
        comment.editor_id = Some(actor);
        comment.edited = Some(now_ms());
        self.repo().update_comment(&comment)?;
        let notifications = FanOut::new(self.conn).comment_updated(&comment, changed)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(comment)
    }

    /// Owners delete for good; moderators hide the comment and notify the owner.
    pub fn delete(&self, actor: Uuid, id: CommentId) -> ServiceResult<Removal> {
        let comment = self.load(id)?;
        let viewer = viewer_for(self.conn, actor, comment.community_id)?;
        require(rules::can_delete(&viewer, &comment), "delete comment")?;

        if comment.owner_id == actor {
            self.repo().delete_comment(id)?;
            return Ok(Removal::Deleted);
        }
        self.repo().soft_delete_comment(id)?;
        let notifications = FanOut::new(self.conn).comment_deleted_by_moderator(&comment, actor)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(Removal::Hidden)
    }

    pub fn like(&self, actor: Uuid, id: CommentId) -> ServiceResult<()> {
        let comment = self.load(id)?;
        let viewer = viewer_for(self.conn, actor, comment.community_id)?;
        require(rules::can_like(&viewer, &comment), "like comment")?;

        let like = Like::new(
            actor,
            comment.owner_id,
            comment.community_id,
            ContentRef::new(ContentType::Comment, id),
        );
        SqliteInteractionRepository::new(self.conn).like(&like)?;
        let notifications = FanOut::new(self.conn).liked(&like)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(())
    }

    pub fn dislike(&self, actor: Uuid, id: CommentId) -> ServiceResult<bool> {
        Ok(SqliteInteractionRepository::new(self.conn)
            .unlike(actor, ContentRef::new(ContentType::Comment, id))?)
    }

    pub fn flag(&self, actor: Uuid, id: CommentId, reason: FlagReason) -> ServiceResult<()> {
        let comment = self.load(id)?;
        let viewer = viewer_for(self.conn, actor, comment.community_id)?;
        require(rules::can_flag(&viewer, &comment), "flag comment")?;

        let flag = Flag::new(
            actor,
            comment.community_id,
            ContentRef::new(ContentType::Comment, id),
            reason,
        );
        SqliteInteractionRepository::new(self.conn).flag(&flag)?;
        let notifications = FanOut::new(self.conn).flagged(&flag)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(())
    }

    pub fn bookmark(&self, actor: Uuid, id: CommentId) -> ServiceResult<()> {
        let comment = self.load(id)?;
        let viewer = viewer_for(self.conn, actor, comment.community_id)?;
        require(viewer.is_member() && !comment.is_deleted(), "bookmark comment")?;
        SqliteInteractionRepository::new(self.conn).bookmark(&Bookmark::new(
            actor,
            comment.community_id,
            ContentRef::new(ContentType::Comment, id),
        ))?;
        Ok(())
    }

    pub fn unbookmark(&self, actor: Uuid, id: CommentId) -> ServiceResult<bool> {
        Ok(SqliteInteractionRepository::new(self.conn)
            .unbookmark(actor, ContentRef::new(ContentType::Comment, id))?)
    }

    /// Visible comments on `content`, oldest first. Moderators also see hidden ones.
    pub fn comments_for(&self, actor: Uuid, content: ContentRef) -> ServiceResult<Vec<Comment>> {
        let activity = self.commented_activity(content)?;
        let viewer = viewer_for(self.conn, actor, activity.core().community_id)?;
        Ok(self.repo().comments_for(content, viewer.is_moderator())?)
    }
}
