//! Activity, event and poll rules.
//!
//! `parent_owner` is the owner of the original activity when the one being
//! checked is a reshare.

use super::Viewer;
use crate::model::activity::{ActivityCore, Poll};
use crate::model::event::Event;
use uuid::Uuid;

fn is_owner(viewer: &Viewer, activity: &ActivityCore) -> bool {
    viewer.is(activity.owner_id)
}

fn is_parent_owner(viewer: &Viewer, parent_owner: Option<Uuid>) -> bool {
    parent_owner.is_some_and(|owner| viewer.is(owner))
}

pub fn can_create(viewer: &Viewer) -> bool {
    viewer.is_member()
}

pub fn can_change(viewer: &Viewer, activity: &ActivityCore) -> bool {
    is_owner(viewer, activity) && !activity.is_reshare && !activity.is_deleted()
}

pub fn can_delete(viewer: &Viewer, activity: &ActivityCore) -> bool {
    is_owner(viewer, activity) || (viewer.is_moderator() && !activity.is_deleted())
}

/// Moderators may edit published content of other members.
pub fn can_moderate_edit(viewer: &Viewer, activity: &ActivityCore) -> bool {
    viewer.is_moderator()
        && !is_owner(viewer, activity)
        && activity.is_published()
        && !activity.is_reshare
        && !activity.is_deleted()
}

pub fn can_bookmark(viewer: &Viewer, activity: &ActivityCore) -> bool {
    viewer.is_member()
        && (activity.is_published() || is_owner(viewer, activity))
        && !activity.is_deleted()
}

pub fn can_flag(viewer: &Viewer, activity: &ActivityCore, parent_owner: Option<Uuid>) -> bool {
    viewer.is_member()
        && !is_owner(viewer, activity)
        && !is_parent_owner(viewer, parent_owner)
        && activity.is_published()
}

pub fn can_like(viewer: &Viewer, activity: &ActivityCore) -> bool {
    viewer.is_member() && !is_owner(viewer, activity) && activity.is_published()
}

pub fn can_pin(viewer: &Viewer, activity: &ActivityCore) -> bool {
    viewer.is_moderator() && activity.is_published() && !activity.is_reshare
}

pub fn can_reshare(viewer: &Viewer, activity: &ActivityCore, parent_owner: Option<Uuid>) -> bool {
    viewer.is_member()
        && !is_owner(viewer, activity)
        && !is_parent_owner(viewer, parent_owner)
        && activity.is_published()
}

pub fn can_comment(viewer: &Viewer, activity: &ActivityCore) -> bool {
    viewer.is_member() && activity.allow_comments && activity.is_published()
}

/// Moderators can retag content of other members.
pub fn can_change_tags(viewer: &Viewer, activity: &ActivityCore) -> bool {
    viewer.is_moderator()
        && activity.is_published()
        && !activity.is_deleted()
        && !is_owner(viewer, activity)
        && !activity.is_reshare
}

pub fn can_attend(viewer: &Viewer, event: &Event, now: i64) -> bool {
    viewer.is_member() && event.is_attendable(now)
}

pub fn can_cancel(viewer: &Viewer, event: &Event) -> bool {
    (is_owner(viewer, &event.core) || viewer.is_moderator())
        && !event.is_canceled()
        && !event.core.is_deleted()
}

pub fn can_vote(viewer: &Viewer, poll: &Poll, has_voted: bool) -> bool {
    viewer.is_member() && poll.core.is_published() && poll.allow_voting && !has_voted
}
