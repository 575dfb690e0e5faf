//! User accounts, follows, blocks and tag preferences.

use super::{bool_to_int, get_bool, get_uuid, placeholders, ensure_changed, RepoError, RepoResult};
use crate::model::notification::Verb;
use crate::model::user::{StreamFilter, User, UserId};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    name,
    email,
    language,
    is_active,
    send_email_notifications,
    notification_prefs,
    activity_stream_filters,
    created
FROM users";

pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Active user registered with `email`, ignoring case.
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Active users whose usernames match any of `usernames`, ignoring case.
    fn find_by_usernames(&self, usernames: &BTreeSet<String>) -> RepoResult<Vec<User>>;
    fn get_users(&self, ids: &[UserId]) -> RepoResult<Vec<User>>;

    fn follow(&self, follower: UserId, followed: UserId) -> RepoResult<bool>;
    fn unfollow(&self, follower: UserId, followed: UserId) -> RepoResult<bool>;
    fn is_following(&self, follower: UserId, followed: UserId) -> RepoResult<bool>;
    fn followers(&self, user: UserId) -> RepoResult<Vec<UserId>>;
    fn following(&self, user: UserId) -> RepoResult<Vec<UserId>>;

    /// Blocks `blocked` and drops follow relations in both directions.
    fn block(&self, blocker: UserId, blocked: UserId) -> RepoResult<bool>;
    fn unblock(&self, blocker: UserId, blocked: UserId) -> RepoResult<bool>;
    fn blocked_users(&self, blocker: UserId) -> RepoResult<Vec<UserId>>;
    fn is_blocked_either_way(&self, first: UserId, second: UserId) -> RepoResult<bool>;

    fn follow_tag(&self, user: UserId, tag: &str) -> RepoResult<bool>;
    fn unfollow_tag(&self, user: UserId, tag: &str) -> RepoResult<bool>;
    fn followed_tags(&self, user: UserId) -> RepoResult<BTreeSet<String>>;
    fn block_tag(&self, user: UserId, tag: &str) -> RepoResult<bool>;
    fn unblock_tag(&self, user: UserId, tag: &str) -> RepoResult<bool>;
    fn blocked_tags(&self, user: UserId) -> RepoResult<BTreeSet<String>>;
    /// Users following any of `tags`.
    fn tag_followers(&self, tags: &BTreeSet<String>) -> RepoResult<Vec<UserId>>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_users(&self, sql: &str, values: Vec<String>) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn query_ids(&self, sql: &str, id: UserId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(get_uuid(row, "id")?);
        }
        Ok(ids)
    }

    fn query_tags(&self, table: &str, user: UserId) -> RepoResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT tag FROM {table} WHERE user_id = ?1 ORDER BY tag;"))?;
        let tags = stmt
            .query_map([user.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(tags)
    }

    fn insert_tag(&self, table: &str, user: UserId, tag: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!("INSERT OR IGNORE INTO {table} (user_id, tag) VALUES (?1, ?2);"),
            params![user.to_string(), normalize_tag(tag)],
        )?;
        Ok(changed > 0)
    }

    fn delete_tag(&self, table: &str, user: UserId, tag: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {table} WHERE user_id = ?1 AND tag = ?2;"),
            params![user.to_string(), normalize_tag(tag)],
        )?;
        Ok(changed > 0)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;
        self.conn.execute(
            "INSERT INTO users (
                id,
                username,
                name,
                email,
                language,
                is_active,
                send_email_notifications,
                notification_prefs,
                activity_stream_filters,
                created
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                user.id.to_string(),
                user.username.trim(),
                user.name.as_str(),
                user.email.trim(),
                user.language.as_str(),
                bool_to_int(user.is_active),
                bool_to_int(user.send_email_notifications),
                prefs_to_db(&user.notification_prefs),
                filters_to_db(&user.activity_stream_filters),
                user.created,
            ],
        )?;
        Ok(user.id)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        let changed = self.conn.execute(
            "UPDATE users
             SET
                username = ?1,
                name = ?2,
                email = ?3,
                language = ?4,
                is_active = ?5,
                send_email_notifications = ?6,
                notification_prefs = ?7,
                activity_stream_filters = ?8
             WHERE id = ?9;",
            params![
                user.username.trim(),
                user.name.as_str(),
                user.email.trim(),
                user.language.as_str(),
                bool_to_int(user.is_active),
                bool_to_int(user.send_email_notifications),
                prefs_to_db(&user.notification_prefs),
                filters_to_db(&user.activity_stream_filters),
                user.id.to_string(),
            ],
        )?;
        ensure_changed(changed, "user", user.id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE username = ?1;"))?;
        let mut rows = stmt.query([username.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let users = self.query_users(
            &format!("{USER_SELECT_SQL} WHERE lower(email) = lower(?1) AND is_active = 1 LIMIT 1;"),
            vec![email.trim().to_string()],
        )?;
        Ok(users.into_iter().next())
    }

    fn find_by_usernames(&self, usernames: &BTreeSet<String>) -> RepoResult<Vec<User>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{USER_SELECT_SQL} WHERE is_active = 1 AND lower(username) IN ({}) ORDER BY username;",
            placeholders(usernames.len())
        );
        self.query_users(&sql, usernames.iter().map(|name| name.to_lowercase()).collect())
    }

    fn get_users(&self, ids: &[UserId]) -> RepoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{USER_SELECT_SQL} WHERE id IN ({}) ORDER BY username;",
            placeholders(ids.len())
        );
        self.query_users(&sql, ids.iter().map(ToString::to_string).collect())
    }

    fn follow(&self, follower: UserId, followed: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO user_follows (follower_id, followed_id) VALUES (?1, ?2);",
            params![follower.to_string(), followed.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn unfollow(&self, follower: UserId, followed: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM user_follows WHERE follower_id = ?1 AND followed_id = ?2;",
            params![follower.to_string(), followed.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn is_following(&self, follower: UserId, followed: UserId) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM user_follows WHERE follower_id = ?1 AND followed_id = ?2;",
                params![follower.to_string(), followed.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn followers(&self, user: UserId) -> RepoResult<Vec<UserId>> {
        self.query_ids(
            "SELECT f.follower_id AS id
             FROM user_follows f
             JOIN users u ON u.id = f.follower_id
             WHERE f.followed_id = ?1 AND u.is_active = 1
             ORDER BY u.username;",
            user,
        )
    }

    fn following(&self, user: UserId) -> RepoResult<Vec<UserId>> {
        self.query_ids(
            "SELECT f.followed_id AS id
             FROM user_follows f
             JOIN users u ON u.id = f.followed_id
             WHERE f.follower_id = ?1 AND u.is_active = 1
             ORDER BY u.username;",
            user,
        )
    }

    fn block(&self, blocker: UserId, blocked: UserId) -> RepoResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "INSERT OR IGNORE INTO user_blocks (blocker_id, blocked_id) VALUES (?1, ?2);",
            params![blocker.to_string(), blocked.to_string()],
        )?;
        tx.execute(
            "DELETE FROM user_follows
             WHERE (follower_id = ?1 AND followed_id = ?2)
                OR (follower_id = ?2 AND followed_id = ?1);",
            params![blocker.to_string(), blocked.to_string()],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn unblock(&self, blocker: UserId, blocked: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM user_blocks WHERE blocker_id = ?1 AND blocked_id = ?2;",
            params![blocker.to_string(), blocked.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn blocked_users(&self, blocker: UserId) -> RepoResult<Vec<UserId>> {
        self.query_ids(
            "SELECT blocked_id AS id FROM user_blocks WHERE blocker_id = ?1 ORDER BY blocked_id;",
            blocker,
        )
    }

    fn is_blocked_either_way(&self, first: UserId, second: UserId) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM user_blocks
                 WHERE (blocker_id = ?1 AND blocked_id = ?2)
                    OR (blocker_id = ?2 AND blocked_id = ?1)
                 LIMIT 1;",
                params![first.to_string(), second.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn follow_tag(&self, user: UserId, tag: &str) -> RepoResult<bool> {
        self.insert_tag("user_tag_follows", user, tag)
    }

    fn unfollow_tag(&self, user: UserId, tag: &str) -> RepoResult<bool> {
        self.delete_tag("user_tag_follows", user, tag)
    }

    fn followed_tags(&self, user: UserId) -> RepoResult<BTreeSet<String>> {
        self.query_tags("user_tag_follows", user)
    }

    fn block_tag(&self, user: UserId, tag: &str) -> RepoResult<bool> {
        self.insert_tag("user_tag_blocks", user, tag)
    }

    fn unblock_tag(&self, user: UserId, tag: &str) -> RepoResult<bool> {
        self.delete_tag("user_tag_blocks", user, tag)
    }

    fn blocked_tags(&self, user: UserId) -> RepoResult<BTreeSet<String>> {
        self.query_tags("user_tag_blocks", user)
    }

    fn tag_followers(&self, tags: &BTreeSet<String>) -> RepoResult<Vec<UserId>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT t.user_id AS id
             FROM user_tag_follows t
             JOIN users u ON u.id = t.user_id
             WHERE u.is_active = 1 AND t.tag IN ({})
             ORDER BY u.username;",
            placeholders(tags.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(tags.iter().map(|tag| normalize_tag(tag))))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(get_uuid(row, "id")?);
        }
        Ok(ids)
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches(['#', '＃']).to_lowercase()
}

fn prefs_to_db(prefs: &BTreeSet<Verb>) -> String {
    prefs
        .iter()
        .map(|verb| verb.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn filters_to_db(filters: &BTreeSet<StreamFilter>) -> String {
    filters
        .iter()
        .map(|filter| filter.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let prefs_text: String = row.get("notification_prefs")?;
    let notification_prefs = prefs_text
        .split_whitespace()
        .map(|value| {
            Verb::parse(value).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid verb `{value}` in users.notification_prefs"))
            })
        })
        .collect::<RepoResult<BTreeSet<_>>>()?;

    let filters_text: String = row.get("activity_stream_filters")?;
    let activity_stream_filters = filters_text
        .split_whitespace()
        .map(|value| {
            StreamFilter::parse(value).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid filter `{value}` in users.activity_stream_filters"
                ))
            })
        })
        .collect::<RepoResult<BTreeSet<_>>>()?;

    Ok(User {
        id: get_uuid(row, "id")?,
        username: row.get("username")?,
        name: row.get("name")?,
        email: row.get("email")?,
        language: row.get("language")?,
        is_active: get_bool(row, "is_active")?,
        send_email_notifications: get_bool(row, "send_email_notifications")?,
        notification_prefs,
        activity_stream_filters,
        created: row.get("created")?,
    })
}
