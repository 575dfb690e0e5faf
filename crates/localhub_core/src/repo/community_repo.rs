//! Communities and memberships.

use super::{bool_to_int, ensure_changed, get_bool, get_opt_uuid, get_uuid, RepoError, RepoResult};
use crate::model::community::{Community, CommunityId, Membership, Role};
use crate::model::now_ms;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const COMMUNITY_SELECT_SQL: &str = "SELECT
    c.id,
    c.domain,
    c.name,
    c.tagline,
    c.description,
    c.terms,
    c.content_warning_tags,
    c.email_domain,
    c.public,
    c.active,
    c.admin_id,
    c.blacklisted_email_domains,
    c.blacklisted_email_addresses,
    c.created,
    c.updated
FROM communities c";

const MEMBERSHIP_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    community_id,
    role,
    active,
    created
FROM memberships";

/// Community listing row with viewer-relative data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunitySummary {
    pub community: Community,
    pub member_count: i64,
    pub is_member: bool,
}

pub trait CommunityRepository {
    fn create_community(&self, community: &Community) -> RepoResult<CommunityId>;
    fn update_community(&self, community: &Community) -> RepoResult<()>;
    fn get_community(&self, id: CommunityId) -> RepoResult<Option<Community>>;
    /// Active community for a domain, ignoring case.
    fn get_community_by_domain(&self, domain: &str) -> RepoResult<Option<Community>>;
    /// Active communities that are public or where `user` is an active member.
    fn list_available(&self, user: Option<Uuid>) -> RepoResult<Vec<CommunitySummary>>;
    fn list_all(&self) -> RepoResult<Vec<CommunitySummary>>;

    fn add_membership(&self, membership: &Membership) -> RepoResult<Uuid>;
    fn get_membership(&self, user: Uuid, community: CommunityId) -> RepoResult<Option<Membership>>;
    fn set_role(&self, user: Uuid, community: CommunityId, role: Role) -> RepoResult<()>;
    fn set_membership_active(&self, user: Uuid, community: CommunityId, active: bool)
        -> RepoResult<()>;
    fn remove_membership(&self, user: Uuid, community: CommunityId) -> RepoResult<()>;
    /// Role of an active member of an active community, if any.
    fn role_of(&self, user: Uuid, community: CommunityId) -> RepoResult<Option<Role>>;
    /// Active users holding at least `role`.
    fn members_with_role(&self, community: CommunityId, role: Role) -> RepoResult<Vec<Uuid>>;
    /// Active communities where `user` has an active membership.
    fn communities_for_user(&self, user: Uuid) -> RepoResult<Vec<CommunityId>>;
}

pub struct SqliteCommunityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommunityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, sql: &str, value: String) -> RepoResult<Option<Community>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([value])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_community_row(row)?)),
            None => Ok(None),
        }
    }

    fn query_summaries(&self, filter: &str, user: Option<Uuid>) -> RepoResult<Vec<CommunitySummary>> {
        let sql = format!(
            "SELECT
                c.*,
                (SELECT COUNT(*) FROM memberships m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.community_id = c.id AND m.active = 1 AND u.is_active = 1) AS member_count,
                EXISTS (SELECT 1 FROM memberships m
                 WHERE m.community_id = c.id AND m.active = 1 AND m.user_id = ?1) AS is_member
             FROM communities c
             WHERE {filter}
             ORDER BY c.name COLLATE NOCASE, c.id;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([user.map(|id| id.to_string())])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(CommunitySummary {
                community: parse_community_row(row)?,
                member_count: row.get("member_count")?,
                is_member: get_bool(row, "is_member")?,
            });
        }
        Ok(summaries)
    }
}

impl CommunityRepository for SqliteCommunityRepository<'_> {
    fn create_community(&self, community: &Community) -> RepoResult<CommunityId> {
        community.validate()?;
        self.conn.execute(
            "INSERT INTO communities (
                id,
                domain,
                name,
                tagline,
                description,
                terms,
                content_warning_tags,
                email_domain,
                public,
                active,
                admin_id,
                blacklisted_email_domains,
                blacklisted_email_addresses,
                created,
                updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                community.id.to_string(),
                community.domain.trim().to_lowercase(),
                community.name.trim(),
                community.tagline.as_str(),
                community.description.as_str(),
                community.terms.as_str(),
                community.content_warning_tags.as_str(),
                community.email_domain.as_deref(),
                bool_to_int(community.public),
                bool_to_int(community.active),
                community.admin_id.map(|id| id.to_string()),
                community.blacklisted_email_domains.as_str(),
                community.blacklisted_email_addresses.as_str(),
                community.created,
                community.updated,
            ],
        )?;
        Ok(community.id)
    }

    fn update_community(&self, community: &Community) -> RepoResult<()> {
        community.validate()?;
        let changed = self.conn.execute(
            "UPDATE communities
             SET
                domain = ?1,
                name = ?2,
                tagline = ?3,
                description = ?4,
                terms = ?5,
                content_warning_tags = ?6,
                email_domain = ?7,
                public = ?8,
                active = ?9,
                admin_id = ?10,
                blacklisted_email_domains = ?11,
                blacklisted_email_addresses = ?12,
                updated = ?13
             WHERE id = ?14;",
            params![
                community.domain.trim().to_lowercase(),
                community.name.trim(),
                community.tagline.as_str(),
                community.description.as_str(),
                community.terms.as_str(),
                community.content_warning_tags.as_str(),
                community.email_domain.as_deref(),
                bool_to_int(community.public),
                bool_to_int(community.active),
                community.admin_id.map(|id| id.to_string()),
                community.blacklisted_email_domains.as_str(),
                community.blacklisted_email_addresses.as_str(),
                now_ms(),
                community.id.to_string(),
            ],
        )?;
        ensure_changed(changed, "community", community.id)
    }

    fn get_community(&self, id: CommunityId) -> RepoResult<Option<Community>> {
        self.query_one(
            &format!("{COMMUNITY_SELECT_SQL} WHERE c.id = ?1;"),
            id.to_string(),
        )
    }

    fn get_community_by_domain(&self, domain: &str) -> RepoResult<Option<Community>> {
        self.query_one(
            &format!("{COMMUNITY_SELECT_SQL} WHERE c.domain = ?1 AND c.active = 1;"),
            domain.trim().to_lowercase(),
        )
    }

    fn list_available(&self, user: Option<Uuid>) -> RepoResult<Vec<CommunitySummary>> {
        self.query_summaries(
            "c.active = 1 AND (c.public = 1 OR EXISTS (
                SELECT 1 FROM memberships m
                WHERE m.community_id = c.id AND m.active = 1 AND m.user_id = ?1))",
            user,
        )
    }

    fn list_all(&self) -> RepoResult<Vec<CommunitySummary>> {
        self.query_summaries("1 = 1", None)
    }

    fn add_membership(&self, membership: &Membership) -> RepoResult<Uuid> {
        self.conn.execute(
            "INSERT INTO memberships (id, user_id, community_id, role, active, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                membership.id.to_string(),
                membership.user_id.to_string(),
                membership.community_id.to_string(),
                membership.role.as_str(),
                bool_to_int(membership.active),
                membership.created,
            ],
        )?;
        Ok(membership.id)
    }

    fn get_membership(&self, user: Uuid, community: CommunityId) -> RepoResult<Option<Membership>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBERSHIP_SELECT_SQL} WHERE user_id = ?1 AND community_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![user.to_string(), community.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_membership_row(row)?)),
            None => Ok(None),
        }
    }

    fn set_role(&self, user: Uuid, community: CommunityId, role: Role) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE memberships SET role = ?1 WHERE user_id = ?2 AND community_id = ?3;",
            params![role.as_str(), user.to_string(), community.to_string()],
        )?;
        ensure_changed(changed, "membership", user)
    }

    fn set_membership_active(
        &self,
        user: Uuid,
        community: CommunityId,
        active: bool,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE memberships SET active = ?1 WHERE user_id = ?2 AND community_id = ?3;",
            params![bool_to_int(active), user.to_string(), community.to_string()],
        )?;
        ensure_changed(changed, "membership", user)
    }

    fn remove_membership(&self, user: Uuid, community: CommunityId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM memberships WHERE user_id = ?1 AND community_id = ?2;",
            params![user.to_string(), community.to_string()],
        )?;
        ensure_changed(changed, "membership", user)
    }

    fn role_of(&self, user: Uuid, community: CommunityId) -> RepoResult<Option<Role>> {
        let role = self
            .conn
            .query_row(
                "SELECT m.role
                 FROM memberships m
                 JOIN communities c ON c.id = m.community_id
                 JOIN users u ON u.id = m.user_id
                 WHERE m.user_id = ?1 AND m.community_id = ?2
                   AND m.active = 1 AND c.active = 1 AND u.is_active = 1;",
                params![user.to_string(), community.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        role.map(|value| {
            Role::parse(&value).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid role `{value}` in memberships.role"))
            })
        })
        .transpose()
    }

    fn members_with_role(&self, community: CommunityId, role: Role) -> RepoResult<Vec<Uuid>> {
        let roles: Vec<&str> = [Role::Member, Role::Moderator, Role::Admin]
            .into_iter()
            .filter(|candidate| candidate.includes(role))
            .map(Role::as_str)
            .collect();
        let sql = format!(
            "SELECT m.user_id
             FROM memberships m
             JOIN users u ON u.id = m.user_id
             WHERE m.community_id = ? AND m.active = 1 AND u.is_active = 1
               AND m.role IN ({})
             ORDER BY u.username;",
            super::placeholders(roles.len())
        );
        let mut values = vec![community.to_string()];
        values.extend(roles.into_iter().map(str::to_string));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(values))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(get_uuid(row, "user_id")?);
        }
        Ok(ids)
    }

    fn communities_for_user(&self, user: Uuid) -> RepoResult<Vec<CommunityId>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.community_id
             FROM memberships m
             JOIN communities c ON c.id = m.community_id
             WHERE m.user_id = ?1 AND m.active = 1 AND c.active = 1
             ORDER BY c.name;",
        )?;
        let mut rows = stmt.query([user.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(get_uuid(row, "community_id")?);
        }
        Ok(ids)
    }
}

fn parse_community_row(row: &Row<'_>) -> RepoResult<Community> {
    Ok(Community {
        id: get_uuid(row, "id")?,
        domain: row.get("domain")?,
        name: row.get("name")?,
        tagline: row.get("tagline")?,
        description: row.get("description")?,
        terms: row.get("terms")?,
        content_warning_tags: row.get("content_warning_tags")?,
        email_domain: row.get("email_domain")?,
        public: get_bool(row, "public")?,
        active: get_bool(row, "active")?,
        admin_id: get_opt_uuid(row, "admin_id")?,
        blacklisted_email_domains: row.get("blacklisted_email_domains")?,
        blacklisted_email_addresses: row.get("blacklisted_email_addresses")?,
        created: row.get("created")?,
        updated: row.get("updated")?,
    })
}

fn parse_membership_row(row: &Row<'_>) -> RepoResult<Membership> {
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in memberships.role"))
    })?;
    Ok(Membership {
        id: get_uuid(row, "id")?,
        user_id: get_uuid(row, "user_id")?,
        community_id: get_uuid(row, "community_id")?,
        role,
        active: get_bool(row, "active")?,
        created: row.get("created")?,
    })
}
