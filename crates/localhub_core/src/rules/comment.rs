//! Comment rules.

use super::Viewer;
use crate::model::comment::Comment;

pub fn can_change(viewer: &Viewer, comment: &Comment) -> bool {
    viewer.is(comment.owner_id) && !comment.is_deleted()
}

/// Moderators may edit comments of other members.
pub fn can_moderate_edit(viewer: &Viewer, comment: &Comment) -> bool {
    viewer.is_moderator() && !viewer.is(comment.owner_id) && !comment.is_deleted()
}

pub fn can_delete(viewer: &Viewer, comment: &Comment) -> bool {
    viewer.is(comment.owner_id) || (viewer.is_moderator() && !comment.is_deleted())
}

pub fn can_like(viewer: &Viewer, comment: &Comment) -> bool {
    viewer.is_member() && !viewer.is(comment.owner_id) && !comment.is_deleted()
}

pub fn can_flag(viewer: &Viewer, comment: &Comment) -> bool {
    viewer.is_member() && !viewer.is(comment.owner_id) && !comment.is_deleted()
}

/// `activity_accepts_comments` is the comment rule of the parent activity.
pub fn can_reply(viewer: &Viewer, comment: &Comment, activity_accepts_comments: bool) -> bool {
    viewer.is_member() && !comment.is_deleted() && activity_accepts_comments
}
