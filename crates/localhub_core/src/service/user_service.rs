//! Account, follow, block and preference use-cases.

use super::{found, notify, viewer_for, ServiceError, ServiceResult};
use crate::model::notification::Verb;
use crate::model::user::{StreamFilter, User, UserId};
use crate::notifications::{Dispatcher, FanOut};
use crate::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::rules::require;
use rusqlite::Connection;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub language: Option<String>,
    pub email: Option<String>,
}

pub struct UserService<'a> {
    conn: &'a Connection,
    dispatcher: &'a Dispatcher,
}

impl<'a> UserService<'a> {
    pub fn new(conn: &'a Connection, dispatcher: &'a Dispatcher) -> Self {
        Self { conn, dispatcher }
    }

    fn repo(&self) -> SqliteUserRepository<'a> {
        SqliteUserRepository::new(self.conn)
    }

    fn load(&self, id: UserId) -> ServiceResult<User> {
        found(self.repo().get_user(id)?, "user", id)
    }

    pub fn register(&self, user: User) -> ServiceResult<User> {
        self.repo().create_user(&user)?;
        log::info!(
            "event=user_register module=service status=ok id={} username={}",
            user.id,
            user.username
        );
        Ok(user)
    }

    /// Follows `target` from within `community`; both must be members there.
    pub fn follow(&self, actor: UserId, target: UserId, community: Uuid) -> ServiceResult<bool> {
        let viewer = viewer_for(self.conn, actor, community)?;
        let target_is_member = SqliteCommunityRepository::new(self.conn)
            .role_of(target, community)?
            .is_some();
        let repo = self.repo();
        require(
            viewer.is_member()
                && target_is_member
                && actor != target
                && !repo.is_blocked_either_way(actor, target)?,
            "follow user",
        )?;
        let added = repo.follow(actor, target)?;
        if added {
            let notifications = FanOut::new(self.conn).followed(actor, target, community)?;
            notify(self.conn, self.dispatcher, notifications)?;
        }
        Ok(added)
    }

    pub fn unfollow(&self, actor: UserId, target: UserId) -> ServiceResult<bool> {
        Ok(self.repo().unfollow(actor, target)?)
    }

    pub fn block(&self, actor: UserId, target: UserId) -> ServiceResult<bool> {
        if actor == target {
            return Err(ServiceError::InvalidInput("cannot block yourself".to_string()));
        }
        self.load(target)?;
        Ok(self.repo().block(actor, target)?)
    }

    pub fn unblock(&self, actor: UserId, target: UserId) -> ServiceResult<bool> {
        Ok(self.repo().unblock(actor, target)?)
    }

    pub fn follow_tag(&self, actor: UserId, tag: &str) -> ServiceResult<bool> {
        Ok(self.repo().follow_tag(actor, &normalize_tag(tag)?)?)
    }

    pub fn unfollow_tag(&self, actor: UserId, tag: &str) -> ServiceResult<bool> {
        Ok(self.repo().unfollow_tag(actor, &normalize_tag(tag)?)?)
    }

    pub fn block_tag(&self, actor: UserId, tag: &str) -> ServiceResult<bool> {
        Ok(self.repo().block_tag(actor, &normalize_tag(tag)?)?)
    }

    pub fn unblock_tag(&self, actor: UserId, tag: &str) -> ServiceResult<bool> {
        Ok(self.repo().unblock_tag(actor, &normalize_tag(tag)?)?)
    }

    /// Applies profile edits and tells followers in every shared community.
    pub fn update_profile(&self, actor: UserId, changes: ProfileChanges) -> ServiceResult<User> {
        let mut user = self.load(actor)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(language) = changes.language {
            user.language = language;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        self.repo().update_user(&user)?;
        let notifications = FanOut::new(self.conn).profile_updated(actor)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(user)
    }

    pub fn update_preferences(
        &self,
        actor: UserId,
        send_email_notifications: bool,
        notification_prefs: BTreeSet<Verb>,
        activity_stream_filters: BTreeSet<StreamFilter>,
    ) -> ServiceResult<User> {
        let mut user = self.load(actor)?;
        user.send_email_notifications = send_email_notifications;
        user.notification_prefs = notification_prefs
            .into_iter()
            .filter(|verb| verb.is_preference())
            .collect();
        user.activity_stream_filters = activity_stream_filters;
        self.repo().update_user(&user)?;
        Ok(user)
    }
}

/// Lowercased tag without its leading `#`.
fn normalize_tag(tag: &str) -> ServiceResult<String> {
    let normalized = tag.trim().trim_start_matches('#').to_lowercase();
    if normalized.is_empty() {
        return Err(ServiceError::InvalidInput(format!("invalid tag: `{tag}`")));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::normalize_tag;

    #[test]
    fn normalize_tag_strips_hash_and_case() {
        assert_eq!(normalize_tag(" #Rust ").expect("tag"), "rust");
        assert!(normalize_tag("#").is_err());
    }
}
