mod common;

use common::Fixture;
use localhub_core::model::interaction::FlagReason;
use localhub_core::service::activity_service::Removal;
use localhub_core::service::{ActivityService, CommentService};
use localhub_core::{ActivityRecord, Post, Role, ServiceError, Verb};

fn publish(fixture: &Fixture, owner: uuid::Uuid) -> Post {
    ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(owner, Post::new(fixture.community.id, owner, "Notice"), true)
        .unwrap()
}

#[test]
fn replies_must_target_the_same_object() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let stranger = fixture.outsider("stranger");
    let first = publish(&fixture, alice.id);
    let second = publish(&fixture, alice.id);
    let service = CommentService::new(&fixture.conn, &fixture.dispatcher);

    let comment = service
        .create(bob.id, first.content_ref(), "nice", None)
        .unwrap();
    let reply = service
        .create(alice.id, first.content_ref(), "thanks", Some(comment.id))
        .unwrap();
    assert_eq!(reply.parent_id, Some(comment.id));

    let err = service
        .create(alice.id, second.content_ref(), "wrong place", Some(comment.id))
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let err = service
        .create(stranger.id, first.content_ref(), "let me in", None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn closed_activities_reject_comments() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let mut post = Post::new(fixture.community.id, alice.id, "Quiet");
    post.core.allow_comments = false;
    let post = ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(alice.id, post, true)
        .unwrap();

    let err = CommentService::new(&fixture.conn, &fixture.dispatcher)
        .create(bob.id, post.content_ref(), "hello?", None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn moderator_edits_and_deletes_notify_the_owner() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let post = publish(&fixture, alice.id);
    let service = CommentService::new(&fixture.conn, &fixture.dispatcher);
    let comment = service
        .create(bob.id, post.content_ref(), "rude words", None)
        .unwrap();

    let err = service.update(alice.id, comment.id, "censored").unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let edited = service
        .update(fixture.admin.id, comment.id, "kind words")
        .unwrap();
    assert!(edited.is_edited_by_moderator());
    assert!(fixture
        .notifications_for(bob.id)
        .iter()
        .any(|notification| notification.verb == Verb::ModeratorEdit));

    assert_eq!(
        service.delete(fixture.admin.id, comment.id).unwrap(),
        Removal::Hidden
    );
    assert!(fixture
        .notifications_for(bob.id)
        .iter()
        .any(|notification| notification.verb == Verb::ModeratorDelete));

    assert!(service
        .comments_for(alice.id, post.content_ref())
        .unwrap()
        .is_empty());
    let for_moderator = service
        .comments_for(fixture.admin.id, post.content_ref())
        .unwrap();
    assert_eq!(for_moderator.len(), 1);
    assert!(for_moderator[0].is_deleted());
}

#[test]
fn owners_delete_their_comments_for_good() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let post = publish(&fixture, alice.id);
    let service = CommentService::new(&fixture.conn, &fixture.dispatcher);
    let comment = service
        .create(bob.id, post.content_ref(), "oops", None)
        .unwrap();

    let err = service.delete(alice.id, comment.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    assert_eq!(service.delete(bob.id, comment.id).unwrap(), Removal::Deleted);
    assert!(service
        .comments_for(fixture.admin.id, post.content_ref())
        .unwrap()
        .is_empty());
    let err = service.update(bob.id, comment.id, "again").unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[test]
fn likes_and_flags_reach_owner_and_moderators() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let post = publish(&fixture, alice.id);
    let service = CommentService::new(&fixture.conn, &fixture.dispatcher);
    let comment = service
        .create(bob.id, post.content_ref(), "hot take", None)
        .unwrap();

    let err = service.like(bob.id, comment.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    service.like(alice.id, comment.id).unwrap();
    assert!(fixture
        .notifications_for(bob.id)
        .iter()
        .any(|notification| notification.verb == Verb::Like));
    assert!(service.dislike(alice.id, comment.id).unwrap());
    assert!(!service.dislike(alice.id, comment.id).unwrap());

    service.flag(alice.id, comment.id, FlagReason::Spam).unwrap();
    assert!(fixture
        .notifications_for(fixture.admin.id)
        .iter()
        .any(|notification| notification.verb == Verb::Flag));

    service.bookmark(alice.id, comment.id).unwrap();
    assert!(service.unbookmark(alice.id, comment.id).unwrap());
}
