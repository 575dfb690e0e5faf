//! Private message rules.

use super::Viewer;
use crate::model::message::Message;
use uuid::Uuid;

/// `recipient_is_member` and `blocked` describe the recipient's side.
pub fn can_send(viewer: &Viewer, recipient: Uuid, recipient_is_member: bool, blocked: bool) -> bool {
    viewer.is_member() && recipient_is_member && !viewer.is(recipient) && !blocked
}

pub fn can_reply(viewer: &Viewer, message: &Message) -> bool {
    viewer.is(message.recipient_id) && message.recipient_deleted.is_none()
}

pub fn can_follow_up(viewer: &Viewer, message: &Message) -> bool {
    viewer.is(message.sender_id) && message.sender_deleted.is_none()
}

pub fn can_delete(viewer: &Viewer, message: &Message) -> bool {
    viewer
        .user_id
        .is_some_and(|user| message.is_visible_to(user))
}
