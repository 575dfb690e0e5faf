mod common;

use common::Fixture;
use localhub_core::model::interaction::FlagReason;
use localhub_core::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use localhub_core::repo::comment_repo::{CommentRepository, SqliteCommentRepository};
use localhub_core::repo::interaction_repo::{InteractionRepository, SqliteInteractionRepository};
use localhub_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use localhub_core::service::activity_service::Removal;
use localhub_core::service::{ActivityService, CommentService};
use localhub_core::{ActivityKind, ActivityRecord, ContentRef, ContentType, Post, Role, ServiceError, Verb};
use std::collections::BTreeSet;

fn post(fixture: &Fixture, owner: uuid::Uuid, title: &str, description: &str) -> Post {
    let mut post = Post::new(fixture.community.id, owner, title);
    post.core.description = description.to_string();
    post
}

#[test]
fn publishing_post_notifies_mentions_followers_and_moderators() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let dave = fixture.member("dave", Role::Member);
    let carol = fixture.member("carol", Role::Moderator);
    SqliteUserRepository::new(&fixture.conn)
        .follow(dave.id, alice.id)
        .unwrap();

    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);
    let created = service
        .create(alice.id, post(&fixture, alice.id, "Hello", "hi @bob #Rust"), true)
        .unwrap();

    assert!(created.core.is_published());
    let bob_notes = fixture.notifications_for(bob.id);
    assert_eq!(bob_notes.len(), 1);
    assert_eq!(bob_notes[0].verb, Verb::Mention);
    assert_eq!(bob_notes[0].content, ContentRef::new(ContentType::Post, created.core.id));
    assert_eq!(fixture.notifications_for(dave.id)[0].verb, Verb::NewFollowedUserPost);
    assert_eq!(fixture.notifications_for(carol.id)[0].verb, Verb::ModeratorReviewRequest);
    assert_eq!(fixture.notifications_for(fixture.admin.id)[0].verb, Verb::ModeratorReviewRequest);
    assert!(fixture.notifications_for(alice.id).is_empty());

    let tags = SqliteActivityRepository::new(&fixture.conn)
        .tags(created.content_ref())
        .unwrap();
    assert_eq!(tags, BTreeSet::from(["rust".to_string()]));

    let emails = fixture.email.sent();
    assert_eq!(emails.len(), 4);
    assert!(emails.iter().all(|email| email.subject.starts_with("Demo | ")));
    assert!(emails.iter().any(|email| email.to == "bob@example.com"));
}

#[test]
fn drafts_notify_only_when_published() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let draft = service
        .create(alice.id, post(&fixture, alice.id, "Draft", "for @bob"), false)
        .unwrap();
    assert!(!draft.core.is_published());
    assert!(fixture.notifications_for(bob.id).is_empty());

    let err = service
        .publish(bob.id, ActivityKind::Post, draft.core.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let published = service
        .publish(alice.id, ActivityKind::Post, draft.core.id)
        .unwrap();
    assert!(published.core().is_published());
    assert_eq!(fixture.notifications_for(bob.id)[0].verb, Verb::Mention);

    let err = service
        .publish(alice.id, ActivityKind::Post, draft.core.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[test]
fn non_members_cannot_create_activities() {
    let fixture = Fixture::new();
    let stranger = fixture.outsider("stranger");
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let err = service
        .create(stranger.id, post(&fixture, stranger.id, "Spam", ""), true)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn owner_delete_removes_and_moderator_delete_hides() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let carol = fixture.member("carol", Role::Moderator);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);
    let repo = SqliteActivityRepository::new(&fixture.conn);

    let first = service
        .create(alice.id, post(&fixture, alice.id, "First", ""), true)
        .unwrap();
    let removal = service
        .delete(alice.id, ActivityKind::Post, first.core.id)
        .unwrap();
    assert_eq!(removal, Removal::Deleted);
    assert!(repo.get::<Post>(first.core.id).unwrap().is_none());

    let second = service
        .create(alice.id, post(&fixture, alice.id, "Second", ""), true)
        .unwrap();
    let removal = service
        .delete(carol.id, ActivityKind::Post, second.core.id)
        .unwrap();
    assert_eq!(removal, Removal::Hidden);
    let hidden = repo.get::<Post>(second.core.id).unwrap().unwrap();
    assert!(hidden.core.is_deleted());
    let alice_notes = fixture.notifications_for(alice.id);
    assert_eq!(alice_notes[0].verb, Verb::ModeratorDelete);
    assert_eq!(alice_notes[0].actor_id, carol.id);
}

#[test]
fn moderator_delete_unpublishes_and_clears_relations() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let carol = fixture.member("carol", Role::Moderator);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);
    let comments = CommentService::new(&fixture.conn, &fixture.dispatcher);
    let interactions = SqliteInteractionRepository::new(&fixture.conn);

    let created = service
        .create(alice.id, post(&fixture, alice.id, "Sale", "ask @bob"), true)
        .unwrap();
    let id = created.core.id;
    service.like(carol.id, ActivityKind::Post, id).unwrap();
    service.bookmark(carol.id, ActivityKind::Post, id).unwrap();
    comments
        .create(bob.id, created.content_ref(), "how much?", None)
        .unwrap();
    assert!(!fixture.notifications_for(bob.id).is_empty());

    let removal = service.delete(carol.id, ActivityKind::Post, id).unwrap();
    assert_eq!(removal, Removal::Hidden);

    let hidden = SqliteActivityRepository::new(&fixture.conn)
        .get::<Post>(id)
        .unwrap()
        .unwrap();
    assert!(hidden.core.is_deleted());
    assert!(!hidden.core.is_published());
    assert!(!interactions.has_liked(carol.id, created.content_ref()).unwrap());
    assert!(!interactions.has_bookmarked(carol.id, created.content_ref()).unwrap());
    assert!(SqliteCommentRepository::new(&fixture.conn)
        .comments_for(created.content_ref(), true)
        .unwrap()
        .is_empty());
    assert!(fixture.notifications_for(bob.id).is_empty());
    let alice_verbs: Vec<_> = fixture
        .notifications_for(alice.id)
        .iter()
        .map(|notification| notification.verb)
        .collect();
    assert_eq!(alice_verbs, [Verb::ModeratorDelete]);

    let denied = |result: Result<(), ServiceError>| {
        assert!(matches!(result, Err(ServiceError::PermissionDenied(_))));
    };
    denied(service.like(bob.id, ActivityKind::Post, id));
    denied(service.flag(bob.id, ActivityKind::Post, id, FlagReason::Spam));
    denied(service.pin(carol.id, ActivityKind::Post, id));
    denied(
        comments
            .create(bob.id, created.content_ref(), "still there?", None)
            .map(|_| ()),
    );
    denied(
        service
            .publish(alice.id, ActivityKind::Post, id)
            .map(|_| ()),
    );
}

#[test]
fn members_cannot_delete_others_activities() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let created = service
        .create(alice.id, post(&fixture, alice.id, "Mine", ""), true)
        .unwrap();
    let err = service
        .delete(bob.id, ActivityKind::Post, created.core.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn reshares_point_at_original_and_notify_its_owner() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let dave = fixture.member("dave", Role::Member);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let original = service
        .create(alice.id, post(&fixture, alice.id, "Original", ""), true)
        .unwrap();
    let reshare: Post = service.reshare(bob.id, original.core.id).unwrap();
    assert!(reshare.core.is_reshare);
    assert_eq!(reshare.core.parent_id, Some(original.core.id));
    assert_eq!(reshare.core.owner_id, bob.id);
    assert_eq!(fixture.notifications_for(alice.id)[0].verb, Verb::Reshare);

    let second: Post = service.reshare(dave.id, reshare.core.id).unwrap();
    assert_eq!(second.core.parent_id, Some(original.core.id));

    let err = service.reshare::<Post>(bob.id, original.core.id).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let err = service.reshare::<Post>(alice.id, original.core.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn owner_update_retags_and_syncs_reshares() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);
    let repo = SqliteActivityRepository::new(&fixture.conn);

    let original = service
        .create(alice.id, post(&fixture, alice.id, "Original", "#dogs"), true)
        .unwrap();
    let reshare: Post = service.reshare(bob.id, original.core.id).unwrap();

    let mut changes = original.clone();
    changes.core.title = "Renamed".to_string();
    changes.core.description = "now about #cats".to_string();
    let updated = service.update(alice.id, changes).unwrap();

    assert_eq!(updated.core.editor_id, Some(alice.id));
    assert!(updated.core.edited.is_some());
    assert!(!updated.core.is_edited_by_moderator());
    assert_eq!(
        repo.tags(updated.content_ref()).unwrap(),
        BTreeSet::from(["cats".to_string()])
    );
    let synced = repo.get::<Post>(reshare.core.id).unwrap().unwrap();
    assert_eq!(synced.core.title, "Renamed");

    let mut hijack = updated.clone();
    hijack.core.title = "Hijacked".to_string();
    let err = service.update(bob.id, hijack).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn moderator_edit_notifies_owner() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let carol = fixture.member("carol", Role::Moderator);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let original = service
        .create(alice.id, post(&fixture, alice.id, "Rude title", ""), true)
        .unwrap();
    let mut changes = original.clone();
    changes.core.title = "Polite title".to_string();
    changes.core.owner_id = carol.id;
    let updated = service.update(carol.id, changes).unwrap();

    assert_eq!(updated.core.owner_id, alice.id);
    assert_eq!(updated.core.editor_id, Some(carol.id));
    assert!(updated.core.is_edited_by_moderator());
    let alice_notes = fixture.notifications_for(alice.id);
    assert_eq!(alice_notes[0].verb, Verb::ModeratorEdit);
}

#[test]
fn pinning_keeps_one_pinned_activity_per_community() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);
    let repo = SqliteActivityRepository::new(&fixture.conn);

    let first = service
        .create(alice.id, post(&fixture, alice.id, "First", ""), true)
        .unwrap();
    let second = service
        .create(alice.id, post(&fixture, alice.id, "Second", ""), true)
        .unwrap();

    let err = service
        .pin(alice.id, ActivityKind::Post, first.core.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    service
        .pin(fixture.admin.id, ActivityKind::Post, first.core.id)
        .unwrap();
    service
        .pin(fixture.admin.id, ActivityKind::Post, second.core.id)
        .unwrap();

    assert!(!repo.get::<Post>(first.core.id).unwrap().unwrap().core.is_pinned);
    assert!(repo.get::<Post>(second.core.id).unwrap().unwrap().core.is_pinned);

    service
        .unpin(fixture.admin.id, ActivityKind::Post, second.core.id)
        .unwrap();
    assert!(!repo.get::<Post>(second.core.id).unwrap().unwrap().core.is_pinned);
}

#[test]
fn likes_flags_and_bookmarks_follow_the_rules() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let carol = fixture.member("carol", Role::Moderator);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let created = service
        .create(alice.id, post(&fixture, alice.id, "Likeable", ""), true)
        .unwrap();
    let id = created.core.id;

    let err = service.like(alice.id, ActivityKind::Post, id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    service.like(bob.id, ActivityKind::Post, id).unwrap();
    assert_eq!(fixture.notifications_for(alice.id)[0].verb, Verb::Like);
    assert!(service.dislike(bob.id, ActivityKind::Post, id).unwrap());
    assert!(!service.dislike(bob.id, ActivityKind::Post, id).unwrap());

    service
        .flag(bob.id, ActivityKind::Post, id, FlagReason::Spam)
        .unwrap();
    assert!(fixture
        .notifications_for(carol.id)
        .iter()
        .any(|notification| notification.verb == Verb::Flag));

    service.bookmark(bob.id, ActivityKind::Post, id).unwrap();
    assert!(service.unbookmark(bob.id, ActivityKind::Post, id).unwrap());
}

#[test]
fn moderators_change_tags_of_other_members() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let created = service
        .create(alice.id, post(&fixture, alice.id, "Tagged", "#old"), true)
        .unwrap();
    let tags = BTreeSet::from(["new".to_string(), "other".to_string()]);

    let err = service
        .change_tags(alice.id, ActivityKind::Post, created.core.id, &tags)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let stored = service
        .change_tags(fixture.admin.id, ActivityKind::Post, created.core.id, &tags)
        .unwrap();
    assert_eq!(stored, tags);
}

#[test]
fn missing_activity_is_not_found() {
    let fixture = Fixture::new();
    let service = ActivityService::new(&fixture.conn, &fixture.dispatcher);

    let err = service
        .like(fixture.admin.id, ActivityKind::Photo, uuid::Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}
