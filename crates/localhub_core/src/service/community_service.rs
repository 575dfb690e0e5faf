//! Community, membership, join request and invite use-cases.
//!
//! # Invariants
//! - A new community always starts with its creator as admin.
//! - Accepting a join request or invite writes the membership and the status
//!   change in one transaction.
//! - Join requests from blacklisted addresses are stored already rejected.

use super::{found, notify, viewer_for, ServiceError, ServiceResult};
use crate::model::community::{Community, CommunityId, Membership, Role};
use crate::model::invite::Invite;
use crate::model::join_request::{JoinRequest, RequestStatus};
use crate::model::now_ms;
use crate::model::user::User;
use crate::notifications::{Dispatcher, FanOut};
use crate::repo::community_repo::{
    CommunityRepository, CommunitySummary, SqliteCommunityRepository,
};
use crate::repo::invite_repo::{InviteRepository, SqliteInviteRepository};
use crate::repo::join_request_repo::{JoinRequestRepository, SqliteJoinRequestRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::rules::{community as rules, require};
use rusqlite::Connection;
use uuid::Uuid;

pub struct CommunityService<'a> {
    conn: &'a Connection,
    dispatcher: &'a Dispatcher,
}

impl<'a> CommunityService<'a> {
    pub fn new(conn: &'a Connection, dispatcher: &'a Dispatcher) -> Self {
        Self { conn, dispatcher }
    }

    fn repo(&self) -> SqliteCommunityRepository<'a> {
        SqliteCommunityRepository::new(self.conn)
    }

    fn load(&self, id: CommunityId) -> ServiceResult<Community> {
        found(self.repo().get_community(id)?, "community", id)
    }

    fn load_user(&self, id: Uuid) -> ServiceResult<User> {
        found(SqliteUserRepository::new(self.conn).get_user(id)?, "user", id)
    }

    /// Creates `community` with `admin` as its first member.
    pub fn create_community(&self, admin: Uuid, mut community: Community) -> ServiceResult<Community> {
        self.load_user(admin)?;
        community.admin_id = Some(admin);
        community.validate().map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

        let tx = self.conn.unchecked_transaction()?;
        let repo = SqliteCommunityRepository::new(&tx);
        repo.create_community(&community)?;
        repo.add_membership(&Membership::new(admin, community.id, Role::Admin))?;
        tx.commit()?;
        log::info!(
            "event=community_create module=service status=ok id={} domain={}",
            community.id,
            community.domain
        );
        Ok(community)
    }

    pub fn update_community(&self, actor: Uuid, community: Community) -> ServiceResult<Community> {
        let stored = self.load(community.id)?;
        let viewer = viewer_for(self.conn, actor, stored.id)?;
        require(rules::can_manage(&viewer), "manage community")?;
        self.repo().update_community(&community)?;
        self.load(community.id)
    }

    /// Communities listed for `user`: public ones plus those they belong to.
    pub fn available(&self, user: Option<Uuid>) -> ServiceResult<Vec<CommunitySummary>> {
        Ok(self.repo().list_available(user)?)
    }

    /// Joins a public community directly.
    pub fn join(&self, actor: Uuid, community_id: CommunityId) -> ServiceResult<Membership> {
        let community = self.load(community_id)?;
        require(community.public && community.active, "join community")?;
        if self.repo().get_membership(actor, community_id)?.is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "already a member of {}",
                community.name
            )));
        }
        let membership = Membership::new(actor, community_id, Role::Member);
        self.repo().add_membership(&membership)?;
        let notifications = FanOut::new(self.conn).member_joined(actor, community_id)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(membership)
    }

    pub fn leave(&self, actor: Uuid, community_id: CommunityId) -> ServiceResult<()> {
        self.remove_member(actor, community_id, actor)
    }

    pub fn remove_member(
        &self,
        actor: Uuid,
        community_id: CommunityId,
        member: Uuid,
    ) -> ServiceResult<()> {
        let viewer = viewer_for(self.conn, actor, community_id)?;
        require(rules::can_delete_membership(&viewer, member), "delete membership")?;
        self.repo().remove_membership(member, community_id)?;
        Ok(())
    }

    pub fn change_role(
        &self,
        actor: Uuid,
        community_id: CommunityId,
        member: Uuid,
        role: Role,
    ) -> ServiceResult<()> {
        let viewer = viewer_for(self.conn, actor, community_id)?;
        require(rules::can_change_membership(&viewer, member), "change membership")?;
        self.repo().set_role(member, community_id, role)?;
        Ok(())
    }

    /// Suspends or restores a membership without deleting it.
    pub fn set_member_active(
        &self,
        actor: Uuid,
        community_id: CommunityId,
        member: Uuid,
        active: bool,
    ) -> ServiceResult<()> {
        let viewer = viewer_for(self.conn, actor, community_id)?;
        require(rules::can_change_membership(&viewer, member), "change membership")?;
        self.repo().set_membership_active(member, community_id, active)?;
        Ok(())
    }

    pub fn request_to_join(
        &self,
        actor: Uuid,
        community_id: CommunityId,
        intro: impl Into<String>,
    ) -> ServiceResult<JoinRequest> {
        let community = self.load(community_id)?;
        let user = self.load_user(actor)?;
        if self.repo().get_membership(actor, community_id)?.is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "already a member of {}",
                community.name
            )));
        }

        let mut request = JoinRequest::new(community_id, actor, intro);
        let blacklisted = community.is_email_blacklisted(&user.email);
        if blacklisted {
            request.status = RequestStatus::Rejected;
        }
        SqliteJoinRequestRepository::new(self.conn).create_join_request(&request)?;
        log::info!(
            "event=join_request_create module=service status={} id={}",
            request.status.as_str(),
            request.id
        );
        if !blacklisted {
            let notifications = FanOut::new(self.conn).join_requested(&request)?;
            notify(self.conn, self.dispatcher, notifications)?;
        }
        Ok(request)
    }

    pub fn accept_join_request(&self, actor: Uuid, request_id: Uuid) -> ServiceResult<Membership> {
        let request = self.pending_request(actor, request_id)?;
        let membership = Membership::new(request.sender_id, request.community_id, Role::Member);

        let tx = self.conn.unchecked_transaction()?;
        SqliteCommunityRepository::new(&tx).add_membership(&membership)?;
        SqliteJoinRequestRepository::new(&tx)
            .set_join_request_status(request_id, RequestStatus::Accepted)?;
        tx.commit()?;

        let fanout = FanOut::new(self.conn);
        let mut notifications = fanout.join_request_decided(&request, actor, true)?;
        notifications.extend(fanout.member_joined(request.sender_id, request.community_id)?);
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(membership)
    }

    pub fn reject_join_request(&self, actor: Uuid, request_id: Uuid) -> ServiceResult<()> {
        let request = self.pending_request(actor, request_id)?;
        SqliteJoinRequestRepository::new(self.conn)
            .set_join_request_status(request_id, RequestStatus::Rejected)?;
        let notifications = FanOut::new(self.conn).join_request_decided(&request, actor, false)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(())
    }

    pub fn pending_join_requests(
        &self,
        actor: Uuid,
        community_id: CommunityId,
    ) -> ServiceResult<Vec<JoinRequest>> {
        let viewer = viewer_for(self.conn, actor, community_id)?;
        require(rules::can_manage(&viewer), "manage community")?;
        Ok(SqliteJoinRequestRepository::new(self.conn).pending_join_requests(community_id)?)
    }

    fn pending_request(&self, actor: Uuid, request_id: Uuid) -> ServiceResult<JoinRequest> {
        let request = found(
            SqliteJoinRequestRepository::new(self.conn).get_join_request(request_id)?,
            "join request",
            request_id,
        )?;
        let viewer = viewer_for(self.conn, actor, request.community_id)?;
        require(rules::can_manage(&viewer), "manage community")?;
        if !request.is_pending() {
            return Err(ServiceError::InvalidInput(format!(
                "join request {request_id} is already {}",
                request.status.as_str()
            )));
        }
        Ok(request)
    }

    pub fn send_invite(
        &self,
        actor: Uuid,
        community_id: CommunityId,
        email: &str,
    ) -> ServiceResult<Invite> {
        let community = self.load(community_id)?;
        let viewer = viewer_for(self.conn, actor, community_id)?;
        require(rules::can_manage(&viewer), "invite to community")?;

        let mut invite = Invite::new(community_id, actor, email);
        invite.validate().map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
        if community.is_email_blacklisted(&invite.email) {
            return Err(ServiceError::InvalidInput(format!(
                "{} is blacklisted",
                invite.email
            )));
        }
        let repo = SqliteInviteRepository::new(self.conn);
        repo.create_invite(&invite)?;
        let sent = now_ms();
        repo.mark_invite_sent(invite.id, sent)?;
        invite.sent = Some(sent);

        let notifications = FanOut::new(self.conn).invited(&invite)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(invite)
    }

    pub fn accept_invite(&self, actor: Uuid, invite_id: Uuid) -> ServiceResult<Membership> {
        let invite = self.pending_invite(actor, invite_id)?;
        let membership = Membership::new(actor, invite.community_id, Role::Member);

        let tx = self.conn.unchecked_transaction()?;
        SqliteCommunityRepository::new(&tx).add_membership(&membership)?;
        SqliteInviteRepository::new(&tx).set_invite_status(invite_id, RequestStatus::Accepted)?;
        tx.commit()?;

        let notifications = FanOut::new(self.conn).member_joined(actor, invite.community_id)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(membership)
    }

    pub fn reject_invite(&self, actor: Uuid, invite_id: Uuid) -> ServiceResult<()> {
        self.pending_invite(actor, invite_id)?;
        SqliteInviteRepository::new(self.conn)
            .set_invite_status(invite_id, RequestStatus::Rejected)?;
        Ok(())
    }

    /// Pending invite addressed to `actor`'s email.
    fn pending_invite(&self, actor: Uuid, invite_id: Uuid) -> ServiceResult<Invite> {
        let invite = found(
            SqliteInviteRepository::new(self.conn).get_invite(invite_id)?,
            "invite",
            invite_id,
        )?;
        let user = self.load_user(actor)?;
        require(
            user.email.trim().eq_ignore_ascii_case(&invite.email),
            "respond to invite",
        )?;
        if !invite.is_pending() {
            return Err(ServiceError::InvalidInput(format!(
                "invite {invite_id} is already {}",
                invite.status.as_str()
            )));
        }
        Ok(invite)
    }
}
