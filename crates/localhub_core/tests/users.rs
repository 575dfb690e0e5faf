mod common;

use common::Fixture;
use localhub_core::model::user::StreamFilter;
use localhub_core::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use localhub_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use localhub_core::service::user_service::ProfileChanges;
use localhub_core::service::UserService;
use localhub_core::{Community, Membership, Role, ServiceError, User, Verb};
use std::collections::BTreeSet;

#[test]
fn following_a_member_notifies_them_once() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let service = UserService::new(&fixture.conn, &fixture.dispatcher);
    let community = fixture.community.id;

    assert!(service.follow(alice.id, bob.id, community).unwrap());
    assert!(!service.follow(alice.id, bob.id, community).unwrap());
    let notes = fixture.notifications_for(bob.id);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].verb, Verb::NewFollower);

    assert!(service.unfollow(alice.id, bob.id).unwrap());
    assert!(SqliteUserRepository::new(&fixture.conn)
        .followers(bob.id)
        .unwrap()
        .is_empty());

    let err = service.follow(alice.id, alice.id, community).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn blocking_drops_follows_and_prevents_new_ones() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let service = UserService::new(&fixture.conn, &fixture.dispatcher);
    let community = fixture.community.id;

    service.follow(alice.id, bob.id, community).unwrap();
    assert!(service.block(bob.id, alice.id).unwrap());
    assert!(SqliteUserRepository::new(&fixture.conn)
        .followers(bob.id)
        .unwrap()
        .is_empty());

    let err = service.follow(alice.id, bob.id, community).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let err = service.block(bob.id, bob.id).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    assert!(service.unblock(bob.id, alice.id).unwrap());
    assert!(service.follow(alice.id, bob.id, community).unwrap());
}

#[test]
fn tags_are_normalized_before_storage() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let service = UserService::new(&fixture.conn, &fixture.dispatcher);
    let repo = SqliteUserRepository::new(&fixture.conn);

    assert!(service.follow_tag(alice.id, "#Gardening").unwrap());
    assert!(!service.follow_tag(alice.id, "gardening").unwrap());
    assert_eq!(
        repo.followed_tags(alice.id).unwrap(),
        BTreeSet::from(["gardening".to_string()])
    );
    assert!(service.unfollow_tag(alice.id, "GARDENING").unwrap());

    assert!(service.block_tag(alice.id, " #Politics ").unwrap());
    assert_eq!(
        repo.blocked_tags(alice.id).unwrap(),
        BTreeSet::from(["politics".to_string()])
    );
    assert!(service.unblock_tag(alice.id, "politics").unwrap());

    let err = service.follow_tag(alice.id, "#").unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[test]
fn profile_update_notifies_each_follower_once() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);

    let other = Community::new("other.localhub.social", "Other");
    let communities = SqliteCommunityRepository::new(&fixture.conn);
    communities.create_community(&other).unwrap();
    for user in [alice.id, bob.id] {
        communities
            .add_membership(&Membership::new(user, other.id, Role::Member))
            .unwrap();
    }
    SqliteUserRepository::new(&fixture.conn)
        .follow(bob.id, alice.id)
        .unwrap();

    let service = UserService::new(&fixture.conn, &fixture.dispatcher);
    let updated = service
        .update_profile(
            alice.id,
            ProfileChanges {
                name: Some("Alice Liddell".to_string()),
                ..ProfileChanges::default()
            },
        )
        .unwrap();
    assert_eq!(updated.display_name(), "Alice Liddell");

    let total: usize = [fixture.community.id, other.id]
        .into_iter()
        .map(|community| {
            localhub_core::service::NotificationService::new(&fixture.conn)
                .list(bob.id, community, false)
                .unwrap()
                .into_iter()
                .filter(|notification| notification.verb == Verb::Update)
                .count()
        })
        .sum();
    assert_eq!(total, 1);
}

#[test]
fn preferences_keep_only_optional_verbs() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let service = UserService::new(&fixture.conn, &fixture.dispatcher);

    let updated = service
        .update_preferences(
            alice.id,
            false,
            BTreeSet::from([Verb::Mention, Verb::Message]),
            BTreeSet::from([StreamFilter::Tags]),
        )
        .unwrap();

    assert!(!updated.send_email_notifications);
    assert_eq!(updated.notification_prefs, BTreeSet::from([Verb::Mention]));
    assert!(updated.accepts(Verb::Message));
    assert!(!updated.accepts(Verb::Like));

    let stored = fixture.user(alice.id);
    assert_eq!(stored, updated);
}

#[test]
fn registration_validates_users() {
    let fixture = Fixture::new();
    let service = UserService::new(&fixture.conn, &fixture.dispatcher);

    let err = service
        .register(User::new("broken", "not-an-email"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    service
        .register(User::new("newbie", "newbie@example.com"))
        .unwrap();
    let err = service
        .register(User::new("newbie", "other@example.com"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Repo(_)));
}
