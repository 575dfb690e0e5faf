//! Community and membership rules.

use super::Viewer;
use uuid::Uuid;

pub fn can_view(viewer: &Viewer) -> bool {
    viewer.is_member()
}

pub fn can_manage(viewer: &Viewer) -> bool {
    viewer.is_admin()
}

pub fn can_moderate(viewer: &Viewer) -> bool {
    viewer.is_moderator()
}

/// Admins can change roles and activation of other members.
pub fn can_change_membership(viewer: &Viewer, member: Uuid) -> bool {
    viewer.is_admin() && !viewer.is(member)
}

/// Admins can remove anyone; members can leave.
pub fn can_delete_membership(viewer: &Viewer, member: Uuid) -> bool {
    viewer.is_admin() || (viewer.is_member() && viewer.is(member))
}
