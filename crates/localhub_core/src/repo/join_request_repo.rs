//! Join request persistence.

use super::{ensure_changed, get_uuid, RepoError, RepoResult};
use crate::model::join_request::{JoinRequest, RequestStatus};
use crate::model::now_ms;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const JOIN_REQUEST_SELECT_SQL: &str = "SELECT
    id,
    community_id,
    sender_id,
    status,
    status_changed,
    intro,
    created
FROM join_requests";

pub trait JoinRequestRepository {
    fn create_join_request(&self, request: &JoinRequest) -> RepoResult<Uuid>;
    fn get_join_request(&self, id: Uuid) -> RepoResult<Option<JoinRequest>>;
    fn find_join_request(&self, community: Uuid, sender: Uuid) -> RepoResult<Option<JoinRequest>>;
    /// Pending requests of a community, oldest first.
    fn pending_join_requests(&self, community: Uuid) -> RepoResult<Vec<JoinRequest>>;
    fn set_join_request_status(&self, id: Uuid, status: RequestStatus) -> RepoResult<()>;
}

pub struct SqliteJoinRequestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteJoinRequestRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, values: impl rusqlite::Params) -> RepoResult<Vec<JoinRequest>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(values)?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next()? {
            requests.push(parse_join_request_row(row)?);
        }
        Ok(requests)
    }
}

impl JoinRequestRepository for SqliteJoinRequestRepository<'_> {
    fn create_join_request(&self, request: &JoinRequest) -> RepoResult<Uuid> {
        self.conn.execute(
            "INSERT INTO join_requests (id, community_id, sender_id, status, status_changed, intro, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                request.id.to_string(),
                request.community_id.to_string(),
                request.sender_id.to_string(),
                request.status.as_str(),
                request.status_changed,
                request.intro.as_str(),
                request.created,
            ],
        )?;
        Ok(request.id)
    }

    fn get_join_request(&self, id: Uuid) -> RepoResult<Option<JoinRequest>> {
        Ok(self
            .query(
                &format!("{JOIN_REQUEST_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn find_join_request(&self, community: Uuid, sender: Uuid) -> RepoResult<Option<JoinRequest>> {
        Ok(self
            .query(
                &format!("{JOIN_REQUEST_SELECT_SQL} WHERE community_id = ?1 AND sender_id = ?2;"),
                params![community.to_string(), sender.to_string()],
            )?
            .into_iter()
            .next())
    }

    fn pending_join_requests(&self, community: Uuid) -> RepoResult<Vec<JoinRequest>> {
        self.query(
            &format!(
                "{JOIN_REQUEST_SELECT_SQL}
                 WHERE community_id = ?1 AND status = 'pending'
                 ORDER BY created, id;"
            ),
            [community.to_string()],
        )
    }

    fn set_join_request_status(&self, id: Uuid, status: RequestStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE join_requests SET status = ?1, status_changed = ?2 WHERE id = ?3;",
            params![status.as_str(), now_ms(), id.to_string()],
        )?;
        ensure_changed(changed, "join request", id)
    }
}

fn parse_join_request_row(row: &Row<'_>) -> RepoResult<JoinRequest> {
    let status_text: String = row.get("status")?;
    let status = RequestStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in join_requests.status"
        ))
    })?;
    Ok(JoinRequest {
        id: get_uuid(row, "id")?,
        community_id: get_uuid(row, "community_id")?,
        sender_id: get_uuid(row, "sender_id")?,
        status,
        status_changed: row.get("status_changed")?,
        intro: row.get("intro")?,
        created: row.get("created")?,
    })
}
