//! Invite persistence.

use super::{ensure_changed, get_uuid, RepoError, RepoResult};
use crate::model::invite::Invite;
use crate::model::join_request::RequestStatus;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const INVITE_SELECT_SQL: &str = "SELECT
    id,
    community_id,
    sender_id,
    email,
    status,
    sent,
    created
FROM invites";

pub trait InviteRepository {
    fn create_invite(&self, invite: &Invite) -> RepoResult<Uuid>;
    fn get_invite(&self, id: Uuid) -> RepoResult<Option<Invite>>;
    fn pending_invites(&self, community: Uuid) -> RepoResult<Vec<Invite>>;
    /// Pending invites addressed to `email` in any community, ignoring case.
    fn pending_invites_for_email(&self, email: &str) -> RepoResult<Vec<Invite>>;
    fn set_invite_status(&self, id: Uuid, status: RequestStatus) -> RepoResult<()>;
    fn mark_invite_sent(&self, id: Uuid, sent: i64) -> RepoResult<()>;
}

pub struct SqliteInviteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInviteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, values: impl rusqlite::Params) -> RepoResult<Vec<Invite>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(values)?;
        let mut invites = Vec::new();
        while let Some(row) = rows.next()? {
            invites.push(parse_invite_row(row)?);
        }
        Ok(invites)
    }
}

impl InviteRepository for SqliteInviteRepository<'_> {
    fn create_invite(&self, invite: &Invite) -> RepoResult<Uuid> {
        invite.validate()?;
        self.conn.execute(
            "INSERT INTO invites (id, community_id, sender_id, email, status, sent, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                invite.id.to_string(),
                invite.community_id.to_string(),
                invite.sender_id.to_string(),
                invite.email.as_str(),
                invite.status.as_str(),
                invite.sent,
                invite.created,
            ],
        )?;
        Ok(invite.id)
    }

    fn get_invite(&self, id: Uuid) -> RepoResult<Option<Invite>> {
        Ok(self
            .query(&format!("{INVITE_SELECT_SQL} WHERE id = ?1;"), [id.to_string()])?
            .into_iter()
            .next())
    }

    fn pending_invites(&self, community: Uuid) -> RepoResult<Vec<Invite>> {
        self.query(
            &format!(
                "{INVITE_SELECT_SQL}
                 WHERE community_id = ?1 AND status = 'pending'
                 ORDER BY created, id;"
            ),
            [community.to_string()],
        )
    }

    fn pending_invites_for_email(&self, email: &str) -> RepoResult<Vec<Invite>> {
        self.query(
            &format!(
                "{INVITE_SELECT_SQL}
                 WHERE lower(email) = lower(?1) AND status = 'pending'
                 ORDER BY created, id;"
            ),
            [email.trim().to_string()],
        )
    }

    fn set_invite_status(&self, id: Uuid, status: RequestStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invites SET status = ?1 WHERE id = ?2;",
            params![status.as_str(), id.to_string()],
        )?;
        ensure_changed(changed, "invite", id)
    }

    fn mark_invite_sent(&self, id: Uuid, sent: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invites SET sent = ?1 WHERE id = ?2;",
            params![sent, id.to_string()],
        )?;
        ensure_changed(changed, "invite", id)
    }
}

fn parse_invite_row(row: &Row<'_>) -> RepoResult<Invite> {
    let status_text: String = row.get("status")?;
    let status = RequestStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in invites.status"))
    })?;
    Ok(Invite {
        id: get_uuid(row, "id")?,
        community_id: get_uuid(row, "community_id")?,
        sender_id: get_uuid(row, "sender_id")?,
        email: row.get("email")?,
        status,
        sent: row.get("sent")?,
        created: row.get("created")?,
    })
}
