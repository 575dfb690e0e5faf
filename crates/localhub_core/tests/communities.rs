mod common;

use common::{create_user, Fixture};
use localhub_core::model::join_request::RequestStatus;
use localhub_core::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use localhub_core::repo::invite_repo::{InviteRepository, SqliteInviteRepository};
use localhub_core::service::CommunityService;
use localhub_core::{Community, Role, ServiceError, Verb};

#[test]
fn creating_community_makes_creator_admin() {
    let fixture = Fixture::new();
    let repo = SqliteCommunityRepository::new(&fixture.conn);

    assert_eq!(fixture.community.admin_id, Some(fixture.admin.id));
    assert_eq!(
        repo.role_of(fixture.admin.id, fixture.community.id).unwrap(),
        Some(Role::Admin)
    );
    assert_eq!(
        repo.get_community_by_domain("DEMO.localhub.social")
            .unwrap()
            .map(|community| community.id),
        Some(fixture.community.id)
    );

    let err = CommunityService::new(&fixture.conn, &fixture.dispatcher)
        .create_community(fixture.admin.id, Community::new("not a domain", "Broken"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[test]
fn joining_public_community_notifies_members() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let newcomer = fixture.outsider("newcomer");
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);

    service.join(newcomer.id, fixture.community.id).unwrap();
    assert_eq!(fixture.notifications_for(alice.id)[0].verb, Verb::NewMember);
    assert_eq!(fixture.notifications_for(fixture.admin.id)[0].verb, Verb::NewMember);

    let err = service.join(newcomer.id, fixture.community.id).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    service.leave(newcomer.id, fixture.community.id).unwrap();
    assert_eq!(
        SqliteCommunityRepository::new(&fixture.conn)
            .role_of(newcomer.id, fixture.community.id)
            .unwrap(),
        None
    );
}

#[test]
fn private_communities_cannot_be_joined_directly() {
    let fixture = Fixture::new();
    let mut community = fixture.community.clone();
    community.public = false;
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);
    service
        .update_community(fixture.admin.id, community)
        .unwrap();
    let newcomer = fixture.outsider("newcomer");

    let err = service.join(newcomer.id, fixture.community.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn only_admins_manage_memberships() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);
    let repo = SqliteCommunityRepository::new(&fixture.conn);
    let community = fixture.community.id;

    let err = service
        .change_role(alice.id, community, bob.id, Role::Moderator)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    service
        .change_role(fixture.admin.id, community, bob.id, Role::Moderator)
        .unwrap();
    assert_eq!(repo.role_of(bob.id, community).unwrap(), Some(Role::Moderator));

    let err = service
        .change_role(fixture.admin.id, community, fixture.admin.id, Role::Member)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    service
        .set_member_active(fixture.admin.id, community, alice.id, false)
        .unwrap();
    assert_eq!(repo.role_of(alice.id, community).unwrap(), None);

    let err = service.remove_member(bob.id, community, fixture.admin.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
    service.remove_member(fixture.admin.id, community, bob.id).unwrap();
    assert!(repo.get_membership(bob.id, community).unwrap().is_none());
}

#[test]
fn join_requests_are_decided_by_admins() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let applicant = fixture.outsider("applicant");
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);
    let community = fixture.community.id;

    let request = service
        .request_to_join(applicant.id, community, "I live nearby")
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(fixture.notifications_for(fixture.admin.id)[0].verb, Verb::Request);

    let err = service.pending_join_requests(alice.id, community).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
    assert_eq!(
        service
            .pending_join_requests(fixture.admin.id, community)
            .unwrap()
            .len(),
        1
    );

    let err = service.accept_join_request(alice.id, request.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let membership = service
        .accept_join_request(fixture.admin.id, request.id)
        .unwrap();
    assert_eq!(membership.role, Role::Member);
    assert!(fixture
        .notifications_for(applicant.id)
        .iter()
        .any(|notification| notification.verb == Verb::Accept));
    assert!(fixture
        .notifications_for(alice.id)
        .iter()
        .any(|notification| notification.verb == Verb::NewMember));

    let err = service
        .reject_join_request(fixture.admin.id, request.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[test]
fn rejected_applicants_are_told_but_stay_outside() {
    let fixture = Fixture::new();
    let applicant = fixture.outsider("applicant");
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);

    let request = service
        .request_to_join(applicant.id, fixture.community.id, "")
        .unwrap();
    service
        .reject_join_request(fixture.admin.id, request.id)
        .unwrap();

    let notes = fixture.notifications_for(applicant.id);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].verb, Verb::Reject);
    assert_eq!(
        SqliteCommunityRepository::new(&fixture.conn)
            .role_of(applicant.id, fixture.community.id)
            .unwrap(),
        None
    );
}

#[test]
fn blacklisted_applicants_are_rejected_silently() {
    let fixture = Fixture::new();
    let mut community = fixture.community.clone();
    community.blacklisted_email_domains = "spam.example".to_string();
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);
    service
        .update_community(fixture.admin.id, community)
        .unwrap();

    let spammer = localhub_core::User::new("spammer", "spammer@spam.example");
    localhub_core::service::UserService::new(&fixture.conn, &fixture.dispatcher)
        .register(spammer.clone())
        .unwrap();

    let request = service
        .request_to_join(spammer.id, fixture.community.id, "buy now")
        .unwrap();
    assert_eq!(request.status, RequestStatus::Rejected);
    assert!(fixture.notifications_for(fixture.admin.id).is_empty());

    let err = service
        .send_invite(fixture.admin.id, fixture.community.id, "other@spam.example")
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[test]
fn invites_notify_registered_users_and_grant_membership() {
    let fixture = Fixture::new();
    let friend = create_user(&fixture.conn, "friend");
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);
    let community = fixture.community.id;

    let invite = service
        .send_invite(fixture.admin.id, community, "FRIEND@example.com")
        .unwrap();
    assert!(invite.sent.is_some());
    let notes = fixture.notifications_for(friend.id);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].verb, Verb::Invite);

    let impostor = fixture.outsider("impostor");
    let err = service.accept_invite(impostor.id, invite.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let membership = service.accept_invite(friend.id, invite.id).unwrap();
    assert_eq!(membership.community_id, community);
    assert_eq!(
        SqliteInviteRepository::new(&fixture.conn)
            .get_invite(invite.id)
            .unwrap()
            .unwrap()
            .status,
        RequestStatus::Accepted
    );

    let second = service
        .send_invite(fixture.admin.id, community, "nobody@example.com")
        .unwrap();
    assert!(SqliteInviteRepository::new(&fixture.conn)
        .pending_invites(community)
        .unwrap()
        .iter()
        .any(|invite| invite.id == second.id));
}

#[test]
fn available_lists_public_and_joined_communities() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let service = CommunityService::new(&fixture.conn, &fixture.dispatcher);

    let mut private = Community::new("private.localhub.social", "Private");
    private.public = false;
    service.create_community(alice.id, private).unwrap();

    let anonymous = service.available(None).unwrap();
    assert_eq!(anonymous.len(), 1);
    assert_eq!(anonymous[0].community.id, fixture.community.id);

    let for_alice = service.available(Some(alice.id)).unwrap();
    assert_eq!(for_alice.len(), 2);
    assert!(for_alice.iter().all(|summary| summary.is_member));
}
