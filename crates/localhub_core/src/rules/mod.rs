//! Permission predicates.
//!
//! Every predicate is a pure function of a [`Viewer`] and the records
//! involved. Callers look up the viewer's role once per request.
//! Anonymous viewers fail every predicate that needs membership.

use crate::model::community::Role;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod activity;
pub mod comment;
pub mod community;
pub mod message;

/// The acting user and their role in the community at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewer {
    pub user_id: Option<Uuid>,
    /// Role of an active membership; `None` for non-members.
    pub role: Option<Role>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(user_id: Uuid, role: Option<Role>) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn is(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.user_id.is_some() && self.role.is_some_and(|own| own.includes(role))
    }

    pub fn is_member(&self) -> bool {
        self.has_role(Role::Member)
    }

    pub fn is_moderator(&self) -> bool {
        self.has_role(Role::Moderator)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// A rule rejected the action named in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDenied(pub &'static str);

impl Display for PermissionDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "permission denied: {}", self.0)
    }
}

impl Error for PermissionDenied {}

/// Turns a predicate result into a `Result` naming the action.
pub fn require(allowed: bool, action: &'static str) -> Result<(), PermissionDenied> {
    if allowed {
        Ok(())
    } else {
        Err(PermissionDenied(action))
    }
}
