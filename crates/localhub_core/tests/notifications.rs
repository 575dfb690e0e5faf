mod common;

use common::Fixture;
use localhub_core::model::comment::Comment;
use localhub_core::notifications::FanOut;
use localhub_core::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use localhub_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use localhub_core::service::{ActivityService, CommentService, NotificationService};
use localhub_core::{
    ActivityRecord, ContentRef, ContentType, Notification, Post, Role, ServiceError, Verb,
};
use serde_json::Value;

const SUBSCRIPTION: &str =
    r#"{"endpoint": "https://push.example/bob", "keys": {"auth": "auth-1", "p256dh": "key-1"}}"#;

fn publish(fixture: &Fixture, owner: uuid::Uuid, description: &str) -> Post {
    let mut post = Post::new(fixture.community.id, owner, "Notice");
    post.core.description = description.to_string();
    ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(owner, post, true)
        .unwrap()
}

#[test]
fn blocked_inactive_and_outside_users_are_skipped() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let mut carol = fixture.member("carol", Role::Member);
    let stranger = fixture.outsider("stranger");

    SqliteUserRepository::new(&fixture.conn)
        .block(bob.id, alice.id)
        .unwrap();
    carol.is_active = false;
    fixture.save_user(&carol);

    let post = publish(&fixture, alice.id, "hey @bob @carol @stranger");
    let notifications = FanOut::new(&fixture.conn).activity_created(&post).unwrap();

    let recipients: Vec<_> = notifications.iter().map(|n| n.recipient_id).collect();
    assert!(!recipients.contains(&bob.id));
    assert!(!recipients.contains(&carol.id));
    assert!(!recipients.contains(&stranger.id));
    assert!(!recipients.contains(&alice.id));
    assert!(recipients.contains(&fixture.admin.id));
}

#[test]
fn disabled_preference_falls_through_to_next_verb() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let mut bob = fixture.member("bob", Role::Member);
    SqliteUserRepository::new(&fixture.conn)
        .follow(bob.id, alice.id)
        .unwrap();
    bob.notification_prefs.remove(&Verb::Mention);
    fixture.save_user(&bob);

    publish(&fixture, alice.id, "thanks @bob");

    let bob_notes = fixture.notifications_for(bob.id);
    assert_eq!(bob_notes.len(), 1);
    assert_eq!(bob_notes[0].verb, Verb::NewFollowedUserPost);
}

#[test]
fn each_recipient_gets_one_notification_per_event() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let carol = fixture.member("carol", Role::Moderator);
    let users = SqliteUserRepository::new(&fixture.conn);
    users.follow(carol.id, alice.id).unwrap();
    users.follow_tag(carol.id, "bikes").unwrap();

    publish(&fixture, alice.id, "@carol look #bikes");

    let carol_notes = fixture.notifications_for(carol.id);
    assert_eq!(carol_notes.len(), 1);
    assert_eq!(carol_notes[0].verb, Verb::Mention);
}

#[test]
fn comments_notify_owner_parent_author_and_siblings() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let dave = fixture.member("dave", Role::Member);
    let erin = fixture.member("erin", Role::Member);
    let post = publish(&fixture, alice.id, "");
    let comments = CommentService::new(&fixture.conn, &fixture.dispatcher);

    let first = comments
        .create(bob.id, post.content_ref(), "first!", None)
        .unwrap();
    comments
        .create(dave.id, post.content_ref(), "me too", None)
        .unwrap();

    let reply = Comment {
        parent_id: Some(first.id),
        ..Comment::new(fixture.community.id, erin.id, post.content_ref(), "agreed")
    };
    let notifications = FanOut::new(&fixture.conn).comment_created(&reply).unwrap();
    let verb_for = |user: uuid::Uuid| {
        notifications
            .iter()
            .find(|notification| notification.recipient_id == user)
            .map(|notification| notification.verb)
    };
    assert_eq!(verb_for(alice.id), Some(Verb::NewComment));
    assert_eq!(verb_for(bob.id), Some(Verb::RepliedToComment));
    assert_eq!(verb_for(dave.id), Some(Verb::NewSiblingComment));
    assert_eq!(verb_for(fixture.admin.id), Some(Verb::ModeratorReviewRequest));
    assert_eq!(verb_for(erin.id), None);
    assert!(notifications
        .iter()
        .all(|notification| notification.content == ContentRef::new(ContentType::Comment, reply.id)));
}

#[test]
fn reshare_updates_skip_original_owner_in_review_requests() {
    let fixture = Fixture::new();
    let carol = fixture.member("carol", Role::Moderator);
    let bob = fixture.member("bob", Role::Member);
    let original = publish(&fixture, carol.id, "");
    let reshare = ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .reshare::<Post>(bob.id, original.core.id)
        .unwrap();

    let notifications = FanOut::new(&fixture.conn)
        .activity_updated(&reshare, false)
        .unwrap();
    let recipients: Vec<_> = notifications.iter().map(|n| n.recipient_id).collect();
    assert!(recipients.contains(&fixture.admin.id));
    assert!(!recipients.contains(&carol.id));
    assert!(!recipients.contains(&bob.id));
}

#[test]
fn dispatch_pushes_payload_and_drops_gone_subscriptions() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let inbox = NotificationService::new(&fixture.conn);
    assert!(inbox
        .subscribe(bob.id, fixture.community.id, SUBSCRIPTION)
        .unwrap());
    assert!(!inbox
        .subscribe(bob.id, fixture.community.id, SUBSCRIPTION)
        .unwrap());

    let post = publish(&fixture, alice.id, "ping @bob");

    let pushed = fixture.push.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].subscription.endpoint, "https://push.example/bob");
    let payload: Value = serde_json::from_str(&pushed[0].payload).unwrap();
    assert_eq!(
        payload["url"],
        format!("http://demo.localhub.social/posts/{}/", post.core.id)
    );

    fixture.push.mark_gone("https://push.example/bob");
    let again = vec![Notification::new(
        post.content_ref(),
        fixture.community.id,
        alice.id,
        bob.id,
        Verb::Mention,
    )];
    let report = fixture.dispatcher.dispatch(&fixture.conn, again).unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.pushed, 0);
    assert_eq!(report.subscriptions_removed, 1);
    assert!(SqliteNotificationRepository::new(&fixture.conn)
        .subscriptions_for(bob.id, fixture.community.id)
        .unwrap()
        .is_empty());
}

#[test]
fn disallowed_verbs_are_stored_but_not_delivered() {
    let fixture = Fixture::new();
    let bob = fixture.member("bob", Role::Member);
    let notification = Notification::new(
        ContentRef::new(ContentType::Community, fixture.community.id),
        fixture.community.id,
        fixture.admin.id,
        bob.id,
        Verb::Mention,
    );

    let report = fixture
        .dispatcher
        .dispatch(&fixture.conn, vec![notification])
        .unwrap();

    assert_eq!(report.stored, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.emailed, 0);
    assert!(fixture.email.sent().is_empty());
    assert_eq!(fixture.notifications_for(bob.id).len(), 1);
}

#[test]
fn email_opt_out_skips_email_only() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let mut bob = fixture.member("bob", Role::Member);
    bob.send_email_notifications = false;
    fixture.save_user(&bob);

    publish(&fixture, alice.id, "hi @bob");

    assert_eq!(fixture.notifications_for(bob.id).len(), 1);
    assert!(fixture
        .email
        .sent()
        .iter()
        .all(|email| email.to != "bob@example.com"));
}

#[test]
fn email_carries_template_candidates_and_sender() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    fixture.member("bob", Role::Member);

    publish(&fixture, alice.id, "hi @bob");

    let email = fixture
        .email
        .sent()
        .into_iter()
        .find(|email| email.to == "bob@example.com")
        .unwrap();
    assert_eq!(email.from, "no-reply@demo.localhub.social");
    assert_eq!(email.plain_templates[0], "activities/emails/notifications/mention_post.txt");
    assert_eq!(email.html_templates.len(), 4);
}

#[test]
fn inbox_marks_notifications_read() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    publish(&fixture, alice.id, "one @bob");
    publish(&fixture, alice.id, "two @bob");
    let inbox = NotificationService::new(&fixture.conn);
    let community = fixture.community.id;

    assert_eq!(inbox.unread_count(bob.id, community).unwrap(), 2);
    let listed = inbox.list(bob.id, community, true).unwrap();
    inbox.mark_read(bob.id, listed[0].id).unwrap();
    assert_eq!(inbox.unread_count(bob.id, community).unwrap(), 1);

    assert_eq!(inbox.mark_all_read(bob.id, community).unwrap(), 1);
    assert!(inbox.list(bob.id, community, true).unwrap().is_empty());
    assert_eq!(inbox.list(bob.id, community, false).unwrap().len(), 2);

    inbox.delete(bob.id, listed[1].id).unwrap();
    assert_eq!(inbox.list(bob.id, community, false).unwrap().len(), 1);
}

#[test]
fn notifications_from_blocked_actors_are_hidden() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    publish(&fixture, alice.id, "hello @bob");
    assert_eq!(fixture.notifications_for(bob.id).len(), 1);

    SqliteUserRepository::new(&fixture.conn)
        .block(bob.id, alice.id)
        .unwrap();
    assert!(fixture.notifications_for(bob.id).is_empty());
}

#[test]
fn outsiders_cannot_subscribe_to_push() {
    let fixture = Fixture::new();
    let stranger = fixture.outsider("stranger");

    let err = NotificationService::new(&fixture.conn)
        .subscribe(stranger.id, fixture.community.id, SUBSCRIPTION)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}
