//! Poll voting and results.

use super::{found, viewer_for, ServiceError, ServiceResult};
use crate::model::activity::{ActivityId, Poll};
use crate::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use crate::rules::{activity as rules, require};
use rusqlite::Connection;
use uuid::Uuid;

pub struct PollService<'a> {
    conn: &'a Connection,
}

impl<'a> PollService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Records one vote per member and returns the updated poll.
    pub fn vote(&self, actor: Uuid, poll_id: ActivityId, answer: Uuid) -> ServiceResult<Poll> {
        let repo = SqliteActivityRepository::new(self.conn);
        let poll = found(repo.get::<Poll>(poll_id)?, "poll", poll_id)?;
        let viewer = viewer_for(self.conn, actor, poll.core.community_id)?;
        let has_voted = repo.has_voted(poll_id, actor)?;
        require(rules::can_vote(&viewer, &poll, has_voted), "vote")?;
        if !poll.answers.iter().any(|candidate| candidate.id == answer) {
            return Err(ServiceError::NotFound {
                entity: "poll answer",
                id: answer,
            });
        }
        repo.vote(poll_id, answer, actor)?;
        self.results(poll_id)
    }

    /// The poll with answers in position order and current vote counts.
    pub fn results(&self, poll_id: ActivityId) -> ServiceResult<Poll> {
        found(
            SqliteActivityRepository::new(self.conn).get::<Poll>(poll_id)?,
            "poll",
            poll_id,
        )
    }
}
