//! Recipient selection for every notifying use case.
//!
//! # Invariants
//! - The actor never notifies themself.
//! - Recipients must be active, accept the verb and not block the actor.
//! - Recipients must hold an active membership, except for join request
//!   decisions and invites, which target outsiders.
//! - Each recipient receives at most one notification per event: the first
//!   one collected wins.

use crate::model::activity::{ActivityCore, ActivityKind, ActivityRecord};
use crate::model::comment::Comment;
use crate::model::community::Role;
use crate::model::content::{ContentRef, ContentType};
use crate::model::event::Event;
use crate::model::interaction::{Flag, Like};
use crate::model::invite::Invite;
use crate::model::join_request::JoinRequest;
use crate::model::message::Message;
use crate::model::notification::{take_first_per_recipient, Notification, Verb};
use crate::model::user::{User, UserId};
use crate::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use crate::repo::comment_repo::{CommentRepository, SqliteCommentRepository};
use crate::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use crate::text::extract_mentions;
use rusqlite::Connection;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Candidate recipients for one content object, in priority order.
struct Recipients {
    content: ContentRef,
    community_id: Uuid,
    actor_id: Uuid,
    candidates: Vec<(Uuid, Verb)>,
}

impl Recipients {
    fn new(content: ContentRef, community_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            content,
            community_id,
            actor_id,
            candidates: Vec::new(),
        }
    }

    fn add<I>(&mut self, users: I, verb: Verb, exclude: &[Option<Uuid>])
    where
        I: IntoIterator<Item = Uuid>,
    {
        for user in users {
            if !exclude.contains(&Some(user)) {
                self.candidates.push((user, verb));
            }
        }
    }
}

pub struct FanOut<'conn> {
    conn: &'conn Connection,
}

impl<'conn> FanOut<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn users(&self) -> SqliteUserRepository<'conn> {
        SqliteUserRepository::new(self.conn)
    }

    fn communities(&self) -> SqliteCommunityRepository<'conn> {
        SqliteCommunityRepository::new(self.conn)
    }

    fn mentioned(&self, text: &str) -> RepoResult<Vec<UserId>> {
        let usernames = extract_mentions(text);
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .users()
            .find_by_usernames(&usernames)?
            .into_iter()
            .map(|user| user.id)
            .collect())
    }

    fn moderators(&self, community: Uuid) -> RepoResult<Vec<UserId>> {
        self.communities().members_with_role(community, Role::Moderator)
    }

    fn parent_owner(&self, kind: ActivityKind, core: &ActivityCore) -> RepoResult<Option<UserId>> {
        let Some(parent_id) = core.parent_id else {
            return Ok(None);
        };
        let parent = SqliteActivityRepository::new(self.conn).get_any(kind, parent_id)?;
        Ok(parent.map(|parent| parent.core().owner_id))
    }

    /// Mentions and tag followers, both triggered by the activity text.
    fn add_text_recipients(
        &self,
        recipients: &mut Recipients,
        core: &ActivityCore,
        exclude: &[Option<Uuid>],
    ) -> RepoResult<()> {
        recipients.add(self.mentioned(&core.description)?, Verb::Mention, exclude);
        let tags = core.extract_tags();
        if !tags.is_empty() {
            recipients.add(
                self.users().tag_followers(&tags)?,
                Verb::NewFollowedTagPost,
                exclude,
            );
        }
        Ok(())
    }

    pub fn activity_created<A: ActivityRecord>(&self, activity: &A) -> RepoResult<Vec<Notification>> {
        let core = activity.core();
        let parent_owner = self.parent_owner(A::KIND, core)?;
        let mut recipients =
            Recipients::new(activity.content_ref(), core.community_id, core.owner_id);
        let exclude = [Some(core.owner_id), core.editor_id, parent_owner];

        self.add_text_recipients(&mut recipients, core, &exclude)?;
        recipients.add(
            self.users().followers(core.owner_id)?,
            Verb::NewFollowedUserPost,
            &[core.editor_id],
        );
        if core.is_reshare {
            recipients.add(parent_owner, Verb::Reshare, &[]);
        }
        if !core.is_edited_by_moderator() {
            recipients.add(
                self.moderators(core.community_id)?,
                Verb::ModeratorReviewRequest,
                &[Some(core.owner_id), parent_owner],
            );
        }
        self.finish(recipients)
    }

    /// `text_changed` reports whether title or description were edited.
    pub fn activity_updated<A: ActivityRecord>(
        &self,
        activity: &A,
        text_changed: bool,
    ) -> RepoResult<Vec<Notification>> {
        let core = activity.core();
        let actor = core.editor_id.unwrap_or(core.owner_id);
        let mut recipients = Recipients::new(activity.content_ref(), core.community_id, actor);

        let parent_owner = self.parent_owner(A::KIND, core)?;
        if text_changed {
            let exclude = [Some(core.owner_id), core.editor_id, parent_owner];
            self.add_text_recipients(&mut recipients, core, &exclude)?;
        }
        if core.is_edited_by_moderator() {
            recipients.add([core.owner_id], Verb::ModeratorEdit, &[]);
        } else {
            recipients.add(
                self.moderators(core.community_id)?,
                Verb::ModeratorReviewRequest,
                &[Some(core.owner_id), parent_owner],
            );
        }
        self.finish(recipients)
    }

    pub fn activity_deleted_by_moderator(
        &self,
        content: ContentRef,
        core: &ActivityCore,
        moderator: Uuid,
    ) -> RepoResult<Vec<Notification>> {
        let mut recipients = Recipients::new(content, core.community_id, moderator);
        recipients.add([core.owner_id], Verb::ModeratorDelete, &[]);
        self.finish(recipients)
    }

    pub fn comment_created(&self, comment: &Comment) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::Comment, comment.id);
        let owner = comment.owner_id;
        let mut recipients = Recipients::new(content, comment.community_id, owner);
        let exclude = [Some(owner)];

        recipients.add(self.mentioned(&comment.content)?, Verb::Mention, &exclude);
        recipients.add(
            self.moderators(comment.community_id)?,
            Verb::ModeratorReviewRequest,
            &exclude,
        );
        if let Some(kind) = ActivityKind::from_content_type(comment.content_object.content_type) {
            let activity = SqliteActivityRepository::new(self.conn)
                .get_any(kind, comment.content_object.object_id)?;
            recipients.add(
                activity.map(|activity| activity.core().owner_id),
                Verb::NewComment,
                &exclude,
            );
        }
        if let Some(parent_id) = comment.parent_id {
            let parent = SqliteCommentRepository::new(self.conn).get_comment(parent_id)?;
            recipients.add(
                parent.map(|parent| parent.owner_id),
                Verb::RepliedToComment,
                &exclude,
            );
        }
        recipients.add(
            SqliteCommentRepository::new(self.conn).commenters(comment.content_object)?,
            Verb::NewSiblingComment,
            &exclude,
        );
        recipients.add(
            self.users().followers(owner)?,
            Verb::NewFollowedUserComment,
            &exclude,
        );
        self.finish(recipients)
    }

    pub fn comment_updated(
        &self,
        comment: &Comment,
        content_changed: bool,
    ) -> RepoResult<Vec<Notification>> {
        if !content_changed {
            return Ok(Vec::new());
        }
        let content = ContentRef::new(ContentType::Comment, comment.id);
        let actor = comment.editor_id.unwrap_or(comment.owner_id);
        let mut recipients = Recipients::new(content, comment.community_id, actor);
        let exclude = [Some(comment.owner_id), comment.editor_id];

        recipients.add(self.mentioned(&comment.content)?, Verb::Mention, &exclude);
        if comment.is_edited_by_moderator() {
            recipients.add([comment.owner_id], Verb::ModeratorEdit, &[]);
        } else {
            recipients.add(
                self.moderators(comment.community_id)?,
                Verb::ModeratorReviewRequest,
                &exclude,
            );
        }
        self.finish(recipients)
    }

    pub fn comment_deleted_by_moderator(
        &self,
        comment: &Comment,
        moderator: Uuid,
    ) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::Comment, comment.id);
        let mut recipients = Recipients::new(content, comment.community_id, moderator);
        recipients.add([comment.owner_id], Verb::ModeratorDelete, &[]);
        self.finish(recipients)
    }

    pub fn liked(&self, like: &Like) -> RepoResult<Vec<Notification>> {
        let mut recipients = Recipients::new(like.content, like.community_id, like.user_id);
        recipients.add([like.recipient_id], Verb::Like, &[]);
        self.finish(recipients)
    }

    pub fn flagged(&self, flag: &Flag) -> RepoResult<Vec<Notification>> {
        let mut recipients = Recipients::new(flag.content, flag.community_id, flag.user_id);
        recipients.add(self.moderators(flag.community_id)?, Verb::Flag, &[]);
        self.finish(recipients)
    }

    /// `verb` is one of `message`, `reply` or `follow_up`.
    pub fn message_sent(&self, message: &Message, verb: Verb) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::Message, message.id);
        let mut recipients = Recipients::new(content, message.community_id, message.sender_id);
        recipients.add([message.recipient_id], verb, &[]);
        self.finish(recipients)
    }

    pub fn followed(
        &self,
        follower: UserId,
        followed: UserId,
        community: Uuid,
    ) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::User, follower);
        let mut recipients = Recipients::new(content, community, follower);
        recipients.add([followed], Verb::NewFollower, &[]);
        self.finish(recipients)
    }

    pub fn member_joined(&self, user: UserId, community: Uuid) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::User, user);
        let mut recipients = Recipients::new(content, community, user);
        recipients.add(
            self.communities().members_with_role(community, Role::Member)?,
            Verb::NewMember,
            &[],
        );
        self.finish(recipients)
    }

    /// Followers hear about the update once, in the first shared community.
    pub fn profile_updated(&self, user: UserId) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::User, user);
        let followers = self.users().followers(user)?;
        let mut notifications = Vec::new();
        for community in self.communities().communities_for_user(user)? {
            let mut recipients = Recipients::new(content, community, user);
            recipients.add(followers.iter().copied(), Verb::Update, &[]);
            notifications.extend(self.finish(recipients)?);
        }
        Ok(take_first_per_recipient(notifications))
    }

    pub fn event_attended(&self, event: &Event, attendee: UserId) -> RepoResult<Vec<Notification>> {
        let core = event.core();
        let mut recipients = Recipients::new(event.content_ref(), core.community_id, attendee);
        recipients.add([core.owner_id], Verb::Attend, &[]);
        self.finish(recipients)
    }

    pub fn event_canceled(&self, event: &Event, actor: UserId) -> RepoResult<Vec<Notification>> {
        let core = event.core();
        let mut recipients = Recipients::new(event.content_ref(), core.community_id, actor);
        recipients.add(
            SqliteActivityRepository::new(self.conn).attendees(core.id)?,
            Verb::Cancel,
            &[],
        );
        recipients.add([core.owner_id], Verb::Cancel, &[]);
        self.finish(recipients)
    }

    pub fn join_requested(&self, request: &JoinRequest) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::JoinRequest, request.id);
        let mut recipients = Recipients::new(content, request.community_id, request.sender_id);
        recipients.add(
            self.communities()
                .members_with_role(request.community_id, Role::Admin)?,
            Verb::Request,
            &[],
        );
        self.finish(recipients)
    }

    pub fn join_request_decided(
        &self,
        request: &JoinRequest,
        admin: UserId,
        accepted: bool,
    ) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::JoinRequest, request.id);
        let verb = if accepted { Verb::Accept } else { Verb::Reject };
        let mut recipients = Recipients::new(content, request.community_id, admin);
        recipients.add([request.sender_id], verb, &[]);
        self.finish(recipients)
    }

    /// Only invites to addresses of registered users produce a notification.
    pub fn invited(&self, invite: &Invite) -> RepoResult<Vec<Notification>> {
        let content = ContentRef::new(ContentType::Invite, invite.id);
        let mut recipients = Recipients::new(content, invite.community_id, invite.sender_id);
        let invitee = self.users().get_user_by_email(&invite.email)?;
        recipients.add(invitee.map(|user| user.id), Verb::Invite, &[]);
        self.finish(recipients)
    }

    fn finish(&self, recipients: Recipients) -> RepoResult<Vec<Notification>> {
        let Recipients {
            content,
            community_id,
            actor_id,
            candidates,
        } = recipients;
        let mut cache: BTreeMap<Uuid, Option<Candidate>> = BTreeMap::new();
        let mut notifications = Vec::new();
        for (recipient, verb) in candidates {
            if recipient == actor_id {
                continue;
            }
            let candidate = match cache.get(&recipient) {
                Some(candidate) => candidate.clone(),
                None => {
                    let candidate = self.candidate(recipient, actor_id, community_id)?;
                    cache.insert(recipient, candidate.clone());
                    candidate
                }
            };
            if !candidate.is_some_and(|candidate| candidate.accepts(verb)) {
                continue;
            }
            notifications.push(Notification::new(
                content,
                community_id,
                actor_id,
                recipient,
                verb,
            ));
        }
        let notifications = take_first_per_recipient(notifications);
        log::debug!(
            "event=notification_fanout module=notifications status=ok content={} count={}",
            content,
            notifications.len()
        );
        Ok(notifications)
    }

    /// Loads the verb-independent facts about `recipient`; `None` when the
    /// recipient is inactive, missing or blocks `actor`.
    fn candidate(
        &self,
        recipient: UserId,
        actor: UserId,
        community: Uuid,
    ) -> RepoResult<Option<Candidate>> {
        let Some(user) = self.users().get_user(recipient)? else {
            return Ok(None);
        };
        if !user.is_active || self.users().blocked_users(recipient)?.contains(&actor) {
            return Ok(None);
        }
        let is_member = self.communities().role_of(recipient, community)?.is_some();
        Ok(Some(Candidate { user, is_member }))
    }
}

#[derive(Clone)]
struct Candidate {
    user: User,
    is_member: bool,
}

impl Candidate {
    fn accepts(&self, verb: Verb) -> bool {
        let outsider_verb = matches!(verb, Verb::Accept | Verb::Reject | Verb::Invite);
        (self.is_member || outsider_verb) && self.user.accepts(verb)
    }
}
