mod common;

use common::Fixture;
use localhub_core::model::now_ms;
use localhub_core::service::{ActivityService, EventService, PollService};
use localhub_core::{ActivityKind, Event, Poll, Repeats, Role, ServiceError, Verb};

const DAY_MS: i64 = 86_400_000;

fn publish_event(fixture: &Fixture, owner: uuid::Uuid, starts: i64) -> Event {
    let mut event = Event::new(fixture.community.id, owner, "Picnic", starts);
    event.timezone = "Europe/Helsinki".to_string();
    event.venue = "Kaivopuisto".to_string();
    event.locality = "Helsinki".to_string();
    ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(owner, event, true)
        .unwrap()
}

#[test]
fn attending_notifies_owner_once() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let event = publish_event(&fixture, alice.id, now_ms() + 7 * DAY_MS);
    let service = EventService::new(&fixture.conn, &fixture.dispatcher);

    assert!(service.attend(bob.id, event.core.id).unwrap());
    assert!(!service.attend(bob.id, event.core.id).unwrap());
    assert_eq!(service.attendees(event.core.id).unwrap(), vec![bob.id]);

    let alice_notes = fixture.notifications_for(alice.id);
    assert_eq!(alice_notes.len(), 1);
    assert_eq!(alice_notes[0].verb, Verb::Attend);

    assert!(service.unattend(bob.id, event.core.id).unwrap());
    assert!(service.attendees(event.core.id).unwrap().is_empty());
}

#[test]
fn past_events_only_accept_attendees_while_repeating() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let service = EventService::new(&fixture.conn, &fixture.dispatcher);

    let past = publish_event(&fixture, alice.id, now_ms() - DAY_MS);
    let err = service.attend(bob.id, past.core.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let mut weekly = Event::new(fixture.community.id, alice.id, "Run club", now_ms() - 30 * DAY_MS);
    weekly.repeats = Some(Repeats::Week);
    let weekly = ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(alice.id, weekly, true)
        .unwrap();
    assert!(service.attend(bob.id, weekly.core.id).unwrap());
}

#[test]
fn cancel_notifies_attendees_and_marks_calendar() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let carol = fixture.member("carol", Role::Member);
    let event = publish_event(&fixture, alice.id, now_ms() + 7 * DAY_MS);
    let service = EventService::new(&fixture.conn, &fixture.dispatcher);
    service.attend(bob.id, event.core.id).unwrap();

    let err = service.cancel(carol.id, event.core.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let canceled = service.cancel(alice.id, event.core.id).unwrap();
    assert!(canceled.is_canceled());
    assert!(fixture
        .notifications_for(bob.id)
        .iter()
        .any(|notification| notification.verb == Verb::Cancel));

    let err = service.attend(carol.id, event.core.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let ical = service.export_ical(event.core.id).unwrap();
    assert!(ical.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(ical.contains(&format!("UID:{}\r\n", event.core.id)));
    assert!(ical.contains("DTSTART;TZID=Europe/Helsinki:"));
    assert!(ical.contains("SUMMARY:Picnic\r\n"));
    assert!(ical.contains("LOCATION:Kaivopuisto\\, Helsinki\r\n"));
    assert!(ical.contains("STATUS:CANCELLED\r\n"));
    assert!(ical.trim_end().ends_with("END:VCALENDAR"));
}

#[test]
fn drafts_and_deleted_events_are_not_exported() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let draft = ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(
            alice.id,
            Event::new(fixture.community.id, alice.id, "Secret", now_ms() + DAY_MS),
            false,
        )
        .unwrap();
    let service = EventService::new(&fixture.conn, &fixture.dispatcher);

    let err = service.export_ical(draft.core.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let published = publish_event(&fixture, alice.id, now_ms() + DAY_MS);
    ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .delete(fixture.admin.id, ActivityKind::Event, published.core.id)
        .unwrap();
    let err = service.export_ical(published.core.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[test]
fn members_vote_once_and_results_count_votes() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let carol = fixture.member("carol", Role::Member);
    let stranger = fixture.outsider("stranger");
    let poll = ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(
            alice.id,
            Poll::new(fixture.community.id, alice.id, "Lunch?", &["Pizza", "Sushi", "Salad"]),
            true,
        )
        .unwrap();
    let service = PollService::new(&fixture.conn);
    let sushi = poll.answers[1].id;

    let results = service.vote(bob.id, poll.core.id, sushi).unwrap();
    assert_eq!(results.answers[1].num_votes, 1);
    service.vote(carol.id, poll.core.id, sushi).unwrap();

    let err = service.vote(bob.id, poll.core.id, poll.answers[0].id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let err = service.vote(stranger.id, poll.core.id, sushi).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let err = service
        .vote(alice.id, poll.core.id, uuid::Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let results = service.results(poll.core.id).unwrap();
    let descriptions: Vec<_> = results
        .answers
        .iter()
        .map(|answer| answer.description.as_str())
        .collect();
    assert_eq!(descriptions, ["Pizza", "Sushi", "Salad"]);
    assert_eq!(results.total_votes(), 2);
}

#[test]
fn closed_polls_reject_votes() {
    let fixture = Fixture::new();
    let alice = fixture.member("alice", Role::Member);
    let bob = fixture.member("bob", Role::Member);
    let mut poll = Poll::new(fixture.community.id, alice.id, "Closed", &["A", "B"]);
    poll.allow_voting = false;
    let poll = ActivityService::new(&fixture.conn, &fixture.dispatcher)
        .create(alice.id, poll, true)
        .unwrap();

    let err = PollService::new(&fixture.conn)
        .vote(bob.id, poll.core.id, poll.answers[0].id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}
