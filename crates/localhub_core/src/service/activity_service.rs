//! Activity use-cases shared by posts, photos, events and polls.
//!
//! # Invariants
//! - Tags are re-derived from title and description whenever the text changes.
//! - Reshares always point at the original activity, never at another reshare.
//! - At most one activity per community is pinned.

use super::{found, notify, viewer_for, ServiceError, ServiceResult};
use crate::model::activity::{ActivityCore, ActivityId, ActivityKind, AnyActivity};
use crate::model::interaction::{Bookmark, Flag, FlagReason, Like};
use crate::model::notification::Notification;
use crate::model::now_ms;
use crate::notifications::{Dispatcher, FanOut};
use crate::repo::activity_repo::{ActivityRepository, SqliteActivityRepository, StoredActivity};
use crate::repo::interaction_repo::{InteractionRepository, SqliteInteractionRepository};
use crate::repo::RepoResult;
use crate::rules::{activity as rules, require};
use crate::stream::{ActivityStream, Page, StreamItem, StreamQuery};
use rusqlite::Connection;
use std::collections::BTreeSet;
use uuid::Uuid;

/// How a delete request was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The owner removed the record and its relations.
    Deleted,
    /// A moderator hid the record; it stays for review.
    Hidden,
}

pub struct ActivityService<'a> {
    conn: &'a Connection,
    dispatcher: &'a Dispatcher,
}

impl<'a> ActivityService<'a> {
    pub fn new(conn: &'a Connection, dispatcher: &'a Dispatcher) -> Self {
        Self { conn, dispatcher }
    }

    fn repo(&self) -> SqliteActivityRepository<'a> {
        SqliteActivityRepository::new(self.conn)
    }

    fn interactions(&self) -> SqliteInteractionRepository<'a> {
        SqliteInteractionRepository::new(self.conn)
    }

    fn load_any(&self, kind: ActivityKind, id: ActivityId) -> ServiceResult<AnyActivity> {
        found(self.repo().get_any(kind, id)?, kind.as_str(), id)
    }

    fn parent_owner(&self, kind: ActivityKind, core: &ActivityCore) -> ServiceResult<Option<Uuid>> {
        let Some(parent_id) = core.parent_id else {
            return Ok(None);
        };
        Ok(self
            .repo()
            .get_any(kind, parent_id)?
            .map(|parent| parent.core().owner_id))
    }

    /// Stores a new activity owned by `actor`, published now or kept as draft.
    pub fn create<A: StoredActivity>(
        &self,
        actor: Uuid,
        mut activity: A,
        publish: bool,
    ) -> ServiceResult<A> {
        let viewer = viewer_for(self.conn, actor, activity.core().community_id)?;
        require(rules::can_create(&viewer), "create activity")?;

        let core = activity.core_mut();
        core.owner_id = actor;
        core.editor_id = None;
        core.is_reshare = false;
        core.parent_id = None;
        core.is_pinned = false;
        core.deleted = None;
        core.published = publish.then(now_ms);

        let repo = self.repo();
        repo.create(&activity)?;
        repo.set_tags(activity.content_ref(), &activity.core().extract_tags())?;
        log::info!(
            "event=activity_create module=service status=ok kind={} id={} published={}",
            A::KIND,
            activity.core().id,
            publish
        );
        if publish {
            let notifications = FanOut::new(self.conn).activity_created(&activity)?;
            notify(self.conn, self.dispatcher, notifications)?;
        }
        Ok(activity)
    }

    /// Saves edits made by the owner or by a moderator.
    ///
    /// Identity, ownership and lifecycle fields are kept from the stored
    /// record; only content fields are taken from `changes`.
    pub fn update<A: StoredActivity>(&self, actor: Uuid, changes: A) -> ServiceResult<A> {
        let id = changes.core().id;
        let existing = found(self.repo().get::<A>(id)?, A::KIND.as_str(), id)?;
        let viewer = viewer_for(self.conn, actor, existing.core().community_id)?;
        require(
            rules::can_change(&viewer, existing.core())
                || rules::can_moderate_edit(&viewer, existing.core()),
            "change activity",
        )?;

        let text_changed = existing.core().title != changes.core().title
            || existing.core().description != changes.core().description;
        let mut activity = changes;
        {
            let stored = existing.core();
            let now = now_ms();
            let core = activity.core_mut();
            core.community_id = stored.community_id;
            core.owner_id = stored.owner_id;
            core.is_reshare = stored.is_reshare;
            core.parent_id = stored.parent_id;
            core.is_pinned = stored.is_pinned;
            core.published = stored.published;
            core.deleted = stored.deleted;
            core.created = stored.created;
            core.editor_id = Some(actor);
            core.edited = Some(now);
            core.updated = now;
        }

        let repo = self.repo();
        repo.update(&activity)?;
        if text_changed {
            repo.set_tags(activity.content_ref(), &activity.core().extract_tags())?;
        }
        let synced = repo.sync_reshares(&activity)?;
        log::info!(
            "event=activity_update module=service status=ok kind={} id={} reshares_synced={}",
            A::KIND,
            id,
            synced
        );
        if activity.core().is_published() {
            let notifications =
                FanOut::new(self.conn).activity_updated(&activity, text_changed)?;
            notify(self.conn, self.dispatcher, notifications)?;
        }
        Ok(activity)
    }

    /// Publishes a draft owned by `actor`.
    pub fn publish(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<AnyActivity> {
        let draft = self.load_any(kind, id)?;
        require(
            draft.core().owner_id == actor && !draft.core().is_deleted(),
            "publish activity",
        )?;
        if draft.core().is_published() {
            return Err(ServiceError::InvalidInput(format!("{kind} {id} is already published")));
        }
        self.repo().publish(kind, id)?;
        let published = self.load_any(kind, id)?;
        let notifications = fan_out_created(&FanOut::new(self.conn), &published)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(published)
    }

    /// Owners delete for good; moderators hide the activity and notify the owner.
    pub fn delete(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<Removal> {
        let activity = self.load_any(kind, id)?;
        let core = activity.core();
        let viewer = viewer_for(self.conn, actor, core.community_id)?;
        require(rules::can_delete(&viewer, core), "delete activity")?;

        if core.owner_id == actor {
            self.repo().delete(kind, id)?;
            log::info!("event=activity_delete module=service status=ok kind={kind} id={id}");
            return Ok(Removal::Deleted);
        }
        self.repo().soft_delete(kind, id)?;
        log::info!(
            "event=activity_delete module=service status=hidden kind={kind} id={id} moderator_id={actor}"
        );
        let notifications = FanOut::new(self.conn).activity_deleted_by_moderator(
            activity.content_ref(),
            core,
            actor,
        )?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(Removal::Hidden)
    }

    /// Reshares the original behind `id` on behalf of `actor`.
    pub fn reshare<A: StoredActivity>(&self, actor: Uuid, id: ActivityId) -> ServiceResult<A> {
        let repo = self.repo();
        let mut original = found(repo.get::<A>(id)?, A::KIND.as_str(), id)?;
        if let Some(parent_id) = original.core().parent_id {
            original = found(repo.get::<A>(parent_id)?, A::KIND.as_str(), parent_id)?;
        }
        let viewer = viewer_for(self.conn, actor, original.core().community_id)?;
        require(
            rules::can_reshare(&viewer, original.core(), None) && !original.core().is_deleted(),
            "reshare activity",
        )?;
        if repo.has_reshared(A::KIND, original.core().id, actor)? {
            return Err(ServiceError::InvalidInput(format!(
                "{} {} already reshared",
                A::KIND,
                original.core().id
            )));
        }

        let reshare = original.reshare(actor);
        repo.create(&reshare)?;
        repo.set_tags(reshare.content_ref(), &reshare.core().extract_tags())?;
        log::info!(
            "event=activity_reshare module=service status=ok kind={} id={} parent_id={}",
            A::KIND,
            reshare.core().id,
            original.core().id
        );
        let notifications = FanOut::new(self.conn).activity_created(&reshare)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(reshare)
    }

    /// Pins `id`, unpinning whatever was pinned in the community before.
    pub fn pin(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<()> {
        let activity = self.load_any(kind, id)?;
        let core = activity.core();
        let viewer = viewer_for(self.conn, actor, core.community_id)?;
        require(rules::can_pin(&viewer, core), "pin activity")?;

        let repo = self.repo();
        repo.unpin_all(core.community_id)?;
        repo.set_pinned(kind, id, true)?;
        Ok(())
    }

    pub fn unpin(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<()> {
        let activity = self.load_any(kind, id)?;
        let viewer = viewer_for(self.conn, actor, activity.core().community_id)?;
        require(viewer.is_moderator(), "unpin activity")?;
        self.repo().set_pinned(kind, id, false)?;
        Ok(())
    }

    pub fn like(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<()> {
        let activity = self.load_any(kind, id)?;
        let core = activity.core();
        let viewer = viewer_for(self.conn, actor, core.community_id)?;
        require(rules::can_like(&viewer, core), "like activity")?;

        let like = Like::new(actor, core.owner_id, core.community_id, activity.content_ref());
        self.interactions().like(&like)?;
        let notifications = FanOut::new(self.conn).liked(&like)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(())
    }

    /// Removes a like; returns whether one existed.
    pub fn dislike(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<bool> {
        let activity = self.load_any(kind, id)?;
        Ok(self.interactions().unlike(actor, activity.content_ref())?)
    }

    pub fn flag(
        &self,
        actor: Uuid,
        kind: ActivityKind,
        id: ActivityId,
        reason: FlagReason,
    ) -> ServiceResult<()> {
        let activity = self.load_any(kind, id)?;
        let core = activity.core();
        let viewer = viewer_for(self.conn, actor, core.community_id)?;
        let parent_owner = self.parent_owner(kind, core)?;
        require(rules::can_flag(&viewer, core, parent_owner), "flag activity")?;

        let flag = Flag::new(actor, core.community_id, activity.content_ref(), reason);
        self.interactions().flag(&flag)?;
        let notifications = FanOut::new(self.conn).flagged(&flag)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(())
    }

    pub fn bookmark(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<()> {
        let activity = self.load_any(kind, id)?;
        let core = activity.core();
        let viewer = viewer_for(self.conn, actor, core.community_id)?;
        require(rules::can_bookmark(&viewer, core), "bookmark activity")?;
        self.interactions()
            .bookmark(&Bookmark::new(actor, core.community_id, activity.content_ref()))?;
        Ok(())
    }

    pub fn unbookmark(&self, actor: Uuid, kind: ActivityKind, id: ActivityId) -> ServiceResult<bool> {
        let activity = self.load_any(kind, id)?;
        Ok(self.interactions().unbookmark(actor, activity.content_ref())?)
    }

    /// Replaces the tags of another member's activity.
    pub fn change_tags(
        &self,
        actor: Uuid,
        kind: ActivityKind,
        id: ActivityId,
        tags: &BTreeSet<String>,
    ) -> ServiceResult<BTreeSet<String>> {
        let activity = self.load_any(kind, id)?;
        let viewer = viewer_for(self.conn, actor, activity.core().community_id)?;
        require(rules::can_change_tags(&viewer, activity.core()), "change tags")?;
        let repo = self.repo();
        repo.set_tags(activity.content_ref(), tags)?;
        Ok(repo.tags(activity.content_ref())?)
    }

    /// One page of the combined stream, hydrated into full records.
    pub fn stream(&self, query: &StreamQuery) -> ServiceResult<(Page<StreamItem>, Vec<AnyActivity>)> {
        let stream = ActivityStream::new(self.conn);
        let page = stream.query(query)?;
        let objects = stream.load_objects(&page.items)?;
        Ok((page, objects))
    }
}

fn fan_out_created(fanout: &FanOut<'_>, activity: &AnyActivity) -> RepoResult<Vec<Notification>> {
    match activity {
        AnyActivity::Post(post) => fanout.activity_created(post),
        AnyActivity::Photo(photo) => fanout.activity_created(photo),
        AnyActivity::Event(event) => fanout.activity_created(event),
        AnyActivity::Poll(poll) => fanout.activity_created(poll),
    }
}
