//! Event attendance, cancellation and calendar export.

use super::{found, notify, viewer_for, ServiceResult};
use crate::model::activity::{ActivityId, ActivityRecord};
use crate::model::event::Event;
use crate::model::now_ms;
use crate::notifications::{Dispatcher, FanOut};
use crate::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use crate::rules::{activity as rules, require};
use rusqlite::Connection;
use uuid::Uuid;

pub struct EventService<'a> {
    conn: &'a Connection,
    dispatcher: &'a Dispatcher,
}

impl<'a> EventService<'a> {
    pub fn new(conn: &'a Connection, dispatcher: &'a Dispatcher) -> Self {
        Self { conn, dispatcher }
    }

    fn repo(&self) -> SqliteActivityRepository<'a> {
        SqliteActivityRepository::new(self.conn)
    }

    fn load(&self, id: ActivityId) -> ServiceResult<Event> {
        found(self.repo().get::<Event>(id)?, "event", id)
    }

    /// Returns whether `actor` was newly added.
    pub fn attend(&self, actor: Uuid, id: ActivityId) -> ServiceResult<bool> {
        let event = self.load(id)?;
        let viewer = viewer_for(self.conn, actor, event.core().community_id)?;
        require(rules::can_attend(&viewer, &event, now_ms()), "attend event")?;

        let added = self.repo().add_attendee(id, actor)?;
        if added {
            let notifications = FanOut::new(self.conn).event_attended(&event, actor)?;
            notify(self.conn, self.dispatcher, notifications)?;
        }
        Ok(added)
    }

    pub fn unattend(&self, actor: Uuid, id: ActivityId) -> ServiceResult<bool> {
        self.load(id)?;
        Ok(self.repo().remove_attendee(id, actor)?)
    }

    pub fn attendees(&self, id: ActivityId) -> ServiceResult<Vec<Uuid>> {
        Ok(self.repo().attendees(id)?)
    }

    pub fn cancel(&self, actor: Uuid, id: ActivityId) -> ServiceResult<Event> {
        let mut event = self.load(id)?;
        let viewer = viewer_for(self.conn, actor, event.core().community_id)?;
        require(rules::can_cancel(&viewer, &event), "cancel event")?;

        let canceled = now_ms();
        self.repo().set_canceled(id, Some(canceled))?;
        event.canceled = Some(canceled);
        log::info!("event=event_cancel module=service status=ok id={id} actor_id={actor}");
        let notifications = FanOut::new(self.conn).event_canceled(&event, actor)?;
        notify(self.conn, self.dispatcher, notifications)?;
        Ok(event)
    }

    /// iCalendar text of a published event.
    pub fn export_ical(&self, id: ActivityId) -> ServiceResult<String> {
        let event = self.load(id)?;
        if !event.core.is_published() || event.core.is_deleted() {
            return Err(super::ServiceError::NotFound { entity: "event", id });
        }
        Ok(event.to_ical(now_ms())?)
    }
}
