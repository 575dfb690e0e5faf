//! Persistence for posts, photos, events and polls.
//!
//! # Responsibility
//! - Map each activity kind onto its own table sharing the core columns.
//! - Own tags, reshare syncing, pinning, attendees and poll votes.
//!
//! # Invariants
//! - Generic relations (`object_type`, `object_id`) have no SQL foreign key,
//!   so hard deletes clean up tags, comments, likes, flags, bookmarks and
//!   notifications in the same transaction.

use super::{
    bool_to_int, ensure_changed, get_bool, get_opt_uuid, get_uuid, placeholders, RepoError,
    RepoResult,
};
use crate::model::activity::{
    ActivityCore, ActivityId, ActivityKind, ActivityRecord, AnyActivity, Photo, Poll, PollAnswer,
    Post,
};
use crate::model::content::ContentRef;
use crate::model::event::{Event, Repeats};
use crate::model::now_ms;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use uuid::Uuid;

const CORE_COLUMNS: [&str; 15] = [
    "id",
    "community_id",
    "owner_id",
    "editor_id",
    "title",
    "description",
    "allow_comments",
    "is_reshare",
    "is_pinned",
    "parent_id",
    "published",
    "deleted",
    "edited",
    "created",
    "updated",
];

/// Column mapping for one activity table.
pub trait StoredActivity: ActivityRecord + Sized {
    /// Columns beyond [`CORE_COLUMNS`], in bind order.
    const EXTRA_COLUMNS: &'static [&'static str];

    fn extra_values(&self) -> Vec<Value>;
    fn from_row(core: ActivityCore, row: &Row<'_>) -> RepoResult<Self>;

    /// Writes rows owned by the activity in other tables.
    fn after_insert(&self, _conn: &Connection) -> RepoResult<()> {
        Ok(())
    }

    /// Loads rows owned by the activity from other tables.
    fn after_load(&mut self, _conn: &Connection) -> RepoResult<()> {
        Ok(())
    }
}

pub trait ActivityRepository {
    fn create<A: StoredActivity>(&self, activity: &A) -> RepoResult<ActivityId>;
    fn update<A: StoredActivity>(&self, activity: &A) -> RepoResult<()>;
    fn get<A: StoredActivity>(&self, id: ActivityId) -> RepoResult<Option<A>>;
    fn get_many<A: StoredActivity>(&self, ids: &[ActivityId]) -> RepoResult<Vec<A>>;
    fn get_any(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<Option<AnyActivity>>;
    /// Removes the row together with its generic relations.
    fn delete(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<()>;
    fn soft_delete(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<()>;
    fn publish(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<()>;

    /// Replaces the tag set of an activity.
    fn set_tags(&self, content: ContentRef, tags: &BTreeSet<String>) -> RepoResult<()>;
    fn tags(&self, content: ContentRef) -> RepoResult<BTreeSet<String>>;

    fn reshares<A: StoredActivity>(&self, parent: ActivityId) -> RepoResult<Vec<A>>;
    /// Copies resharable fields of `parent` onto every reshare; returns the count.
    fn sync_reshares<A: StoredActivity>(&self, parent: &A) -> RepoResult<usize>;
    fn has_reshared(&self, kind: ActivityKind, parent: ActivityId, user: Uuid)
        -> RepoResult<bool>;

    fn unpin_all(&self, community: Uuid) -> RepoResult<()>;
    fn set_pinned(&self, kind: ActivityKind, id: ActivityId, pinned: bool) -> RepoResult<()>;

    fn add_attendee(&self, event: ActivityId, user: Uuid) -> RepoResult<bool>;
    fn remove_attendee(&self, event: ActivityId, user: Uuid) -> RepoResult<bool>;
    fn attendees(&self, event: ActivityId) -> RepoResult<Vec<Uuid>>;
    fn is_attending(&self, event: ActivityId, user: Uuid) -> RepoResult<bool>;
    fn set_canceled(&self, event: ActivityId, canceled: Option<i64>) -> RepoResult<()>;

    fn poll_answers(&self, poll: ActivityId) -> RepoResult<Vec<PollAnswer>>;
    fn vote(&self, poll: ActivityId, answer: Uuid, user: Uuid) -> RepoResult<()>;
    fn has_voted(&self, poll: ActivityId, user: Uuid) -> RepoResult<bool>;
}

pub struct SqliteActivityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn select_sql<A: StoredActivity>(filter: &str) -> String {
        let columns = CORE_COLUMNS
            .iter()
            .chain(A::EXTRA_COLUMNS.iter())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {columns} FROM {} WHERE {filter}", A::KIND.table())
    }

    fn query<A: StoredActivity>(&self, sql: &str, values: Vec<Value>) -> RepoResult<Vec<A>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut activities = Vec::new();
        while let Some(row) = rows.next()? {
            let mut activity = A::from_row(parse_core(row)?, row)?;
            activity.after_load(self.conn)?;
            activities.push(activity);
        }
        Ok(activities)
    }
}

impl ActivityRepository for SqliteActivityRepository<'_> {
    fn create<A: StoredActivity>(&self, activity: &A) -> RepoResult<ActivityId> {
        activity.validate()?;
        let columns: Vec<&str> = CORE_COLUMNS
            .iter()
            .chain(A::EXTRA_COLUMNS.iter())
            .copied()
            .collect();
        let mut values = core_values(activity.core());
        values.extend(activity.extra_values());

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({});",
                A::KIND.table(),
                columns.join(", "),
                placeholders(columns.len())
            ),
            params_from_iter(values),
        )?;
        activity.after_insert(&tx)?;
        tx.commit()?;
        Ok(activity.core().id)
    }

    fn update<A: StoredActivity>(&self, activity: &A) -> RepoResult<()> {
        activity.validate()?;
        let core = activity.core();
        // id and created never change.
        let assignments = CORE_COLUMNS[1..]
            .iter()
            .filter(|column| **column != "created")
            .chain(A::EXTRA_COLUMNS.iter())
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut values: Vec<Value> = core_values(core)
            .into_iter()
            .enumerate()
            .filter(|(index, _)| *index != 0 && CORE_COLUMNS[*index] != "created")
            .map(|(_, value)| value)
            .collect();
        values.extend(activity.extra_values());
        values.push(Value::Text(core.id.to_string()));

        let changed = self.conn.execute(
            &format!("UPDATE {} SET {assignments} WHERE id = ?;", A::KIND.table()),
            params_from_iter(values),
        )?;
        ensure_changed(changed, A::KIND.as_str(), core.id)
    }

    fn get<A: StoredActivity>(&self, id: ActivityId) -> RepoResult<Option<A>> {
        let sql = Self::select_sql::<A>("id = ?");
        Ok(self
            .query::<A>(&sql, vec![Value::Text(id.to_string())])?
            .into_iter()
            .next())
    }

    fn get_many<A: StoredActivity>(&self, ids: &[ActivityId]) -> RepoResult<Vec<A>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = Self::select_sql::<A>(&format!("id IN ({})", placeholders(ids.len())));
        self.query::<A>(
            &sql,
            ids.iter().map(|id| Value::Text(id.to_string())).collect(),
        )
    }

    fn get_any(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<Option<AnyActivity>> {
        Ok(match kind {
            ActivityKind::Post => self.get::<Post>(id)?.map(AnyActivity::Post),
            ActivityKind::Photo => self.get::<Photo>(id)?.map(AnyActivity::Photo),
            ActivityKind::Event => self.get::<Event>(id)?.map(AnyActivity::Event),
            ActivityKind::Poll => self.get::<Poll>(id)?.map(AnyActivity::Poll),
        })
    }

    fn delete(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let object_type = kind.as_str();
        let object_id = id.to_string();
        tx.execute(
            "DELETE FROM activity_tags WHERE object_type = ?1 AND object_id = ?2;",
            params![object_type, object_id],
        )?;
        purge_relations(&tx, object_type, &object_id)?;
        let changed = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", kind.table()),
            [object_id.as_str()],
        )?;
        ensure_changed(changed, kind.as_str(), id)?;
        tx.commit()?;
        Ok(())
    }

    fn soft_delete(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_ms();
        let object_id = id.to_string();
        let changed = tx.execute(
            &format!(
                "UPDATE {} SET deleted = ?1, published = NULL, is_pinned = 0, updated = ?1
                 WHERE id = ?2;",
                kind.table()
            ),
            params![now, object_id],
        )?;
        ensure_changed(changed, kind.as_str(), id)?;
        purge_relations(&tx, kind.as_str(), &object_id)?;
        tx.commit()?;
        Ok(())
    }

    fn publish(&self, kind: ActivityKind, id: ActivityId) -> RepoResult<()> {
        let now = now_ms();
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET published = ?1, updated = ?1
                 WHERE id = ?2 AND published IS NULL AND deleted IS NULL;",
                kind.table()
            ),
            params![now, id.to_string()],
        )?;
        ensure_changed(changed, kind.as_str(), id)
    }

    fn set_tags(&self, content: ContentRef, tags: &BTreeSet<String>) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let object_type = content.content_type.as_str();
        let object_id = content.object_id.to_string();
        tx.execute(
            "DELETE FROM activity_tags WHERE object_type = ?1 AND object_id = ?2;",
            params![object_type, object_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO activity_tags (object_type, object_id, tag)
                 VALUES (?1, ?2, ?3);",
            )?;
            for tag in tags {
                let tag = tag.trim().to_lowercase();
                if !tag.is_empty() {
                    stmt.execute(params![object_type, object_id, tag])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn tags(&self, content: ContentRef) -> RepoResult<BTreeSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag FROM activity_tags WHERE object_type = ?1 AND object_id = ?2;",
        )?;
        let tags = stmt
            .query_map(
                params![content.content_type.as_str(), content.object_id.to_string()],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(tags)
    }

    fn reshares<A: StoredActivity>(&self, parent: ActivityId) -> RepoResult<Vec<A>> {
        let sql = Self::select_sql::<A>("parent_id = ? AND is_reshare = 1 ORDER BY created");
        self.query::<A>(&sql, vec![Value::Text(parent.to_string())])
    }

    fn sync_reshares<A: StoredActivity>(&self, parent: &A) -> RepoResult<usize> {
        let reshares = self.reshares::<A>(parent.core().id)?;
        let count = reshares.len();
        for mut reshare in reshares {
            reshare.sync_from(parent);
            self.update(&reshare)?;
        }
        Ok(count)
    }

    fn has_reshared(
        &self,
        kind: ActivityKind,
        parent: ActivityId,
        user: Uuid,
    ) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE parent_id = ?1 AND owner_id = ?2 AND is_reshare = 1
                     LIMIT 1;",
                    kind.table()
                ),
                params![parent.to_string(), user.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn unpin_all(&self, community: Uuid) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for kind in ActivityKind::ALL {
            tx.execute(
                &format!(
                    "UPDATE {} SET is_pinned = 0 WHERE community_id = ?1 AND is_pinned = 1;",
                    kind.table()
                ),
                [community.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn set_pinned(&self, kind: ActivityKind, id: ActivityId, pinned: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!("UPDATE {} SET is_pinned = ?1 WHERE id = ?2;", kind.table()),
            params![bool_to_int(pinned), id.to_string()],
        )?;
        ensure_changed(changed, kind.as_str(), id)
    }

    fn add_attendee(&self, event: ActivityId, user: Uuid) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO event_attendees (event_id, user_id) VALUES (?1, ?2);",
            params![event.to_string(), user.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn remove_attendee(&self, event: ActivityId, user: Uuid) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM event_attendees WHERE event_id = ?1 AND user_id = ?2;",
            params![event.to_string(), user.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn attendees(&self, event: ActivityId) -> RepoResult<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.user_id
             FROM event_attendees a
             JOIN users u ON u.id = a.user_id
             WHERE a.event_id = ?1
             ORDER BY u.username;",
        )?;
        let mut rows = stmt.query([event.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(get_uuid(row, "user_id")?);
        }
        Ok(ids)
    }

    fn is_attending(&self, event: ActivityId, user: Uuid) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM event_attendees WHERE event_id = ?1 AND user_id = ?2;",
                params![event.to_string(), user.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn set_canceled(&self, event: ActivityId, canceled: Option<i64>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE events SET canceled = ?1, updated = ?2 WHERE id = ?3;",
            params![canceled, now_ms(), event.to_string()],
        )?;
        ensure_changed(changed, "event", event)
    }

    fn poll_answers(&self, poll: ActivityId) -> RepoResult<Vec<PollAnswer>> {
        load_answers(self.conn, poll)
    }

    fn vote(&self, poll: ActivityId, answer: Uuid, user: Uuid) -> RepoResult<()> {
        let belongs = self
            .conn
            .query_row(
                "SELECT 1 FROM poll_answers WHERE id = ?1 AND poll_id = ?2;",
                params![answer.to_string(), poll.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        if belongs.is_none() {
            return Err(RepoError::NotFound {
                entity: "poll answer",
                id: answer,
            });
        }
        self.conn.execute(
            "INSERT INTO poll_votes (poll_id, answer_id, user_id) VALUES (?1, ?2, ?3);",
            params![poll.to_string(), answer.to_string(), user.to_string()],
        )?;
        Ok(())
    }

    fn has_voted(&self, poll: ActivityId, user: Uuid) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM poll_votes WHERE poll_id = ?1 AND user_id = ?2;",
                params![poll.to_string(), user.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl StoredActivity for Post {
    const EXTRA_COLUMNS: &'static [&'static str] = &[
        "url",
        "opengraph_title",
        "opengraph_description",
        "opengraph_image",
    ];

    fn extra_values(&self) -> Vec<Value> {
        vec![
            opt_text(&self.url),
            opt_text(&self.opengraph_title),
            opt_text(&self.opengraph_description),
            opt_text(&self.opengraph_image),
        ]
    }

    fn from_row(core: ActivityCore, row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            core,
            url: row.get("url")?,
            opengraph_title: row.get("opengraph_title")?,
            opengraph_description: row.get("opengraph_description")?,
            opengraph_image: row.get("opengraph_image")?,
        })
    }
}

impl StoredActivity for Photo {
    const EXTRA_COLUMNS: &'static [&'static str] = &[
        "image",
        "attribution",
        "original_url",
        "cc_license",
        "latitude",
        "longitude",
    ];

    fn extra_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.image.clone()),
            Value::Text(self.attribution.clone()),
            opt_text(&self.original_url),
            opt_text(&self.cc_license),
            opt_real(self.latitude),
            opt_real(self.longitude),
        ]
    }

    fn from_row(core: ActivityCore, row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            core,
            image: row.get("image")?,
            attribution: row.get("attribution")?,
            original_url: row.get("original_url")?,
            cc_license: row.get("cc_license")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
        })
    }
}

impl StoredActivity for Event {
    const EXTRA_COLUMNS: &'static [&'static str] = &[
        "url",
        "starts",
        "ends",
        "repeats",
        "repeats_until",
        "timezone",
        "canceled",
        "venue",
        "ticket_price",
        "ticket_vendor",
        "contact_name",
        "contact_phone",
        "contact_email",
        "street_address",
        "locality",
        "postal_code",
        "region",
        "country",
        "latitude",
        "longitude",
    ];

    fn extra_values(&self) -> Vec<Value> {
        vec![
            opt_text(&self.url),
            Value::Integer(self.starts),
            opt_int(self.ends),
            self.repeats
                .map_or(Value::Null, |repeats| Value::Text(repeats.as_str().to_string())),
            opt_int(self.repeats_until),
            Value::Text(self.timezone.clone()),
            opt_int(self.canceled),
            Value::Text(self.venue.clone()),
            Value::Text(self.ticket_price.clone()),
            Value::Text(self.ticket_vendor.clone()),
            Value::Text(self.contact_name.clone()),
            Value::Text(self.contact_phone.clone()),
            Value::Text(self.contact_email.clone()),
            Value::Text(self.street_address.clone()),
            Value::Text(self.locality.clone()),
            Value::Text(self.postal_code.clone()),
            Value::Text(self.region.clone()),
            opt_text(&self.country),
            opt_real(self.latitude),
            opt_real(self.longitude),
        ]
    }

    fn from_row(core: ActivityCore, row: &Row<'_>) -> RepoResult<Self> {
        let repeats = match row.get::<_, Option<String>>("repeats")? {
            Some(value) => Some(Repeats::parse(&value).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid repeats `{value}` in events.repeats"))
            })?),
            None => None,
        };
        Ok(Self {
            core,
            url: row.get("url")?,
            starts: row.get("starts")?,
            ends: row.get("ends")?,
            repeats,
            repeats_until: row.get("repeats_until")?,
            timezone: row.get("timezone")?,
            canceled: row.get("canceled")?,
            venue: row.get("venue")?,
            ticket_price: row.get("ticket_price")?,
            ticket_vendor: row.get("ticket_vendor")?,
            contact_name: row.get("contact_name")?,
            contact_phone: row.get("contact_phone")?,
            contact_email: row.get("contact_email")?,
            street_address: row.get("street_address")?,
            locality: row.get("locality")?,
            postal_code: row.get("postal_code")?,
            region: row.get("region")?,
            country: row.get("country")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
        })
    }
}

impl StoredActivity for Poll {
    const EXTRA_COLUMNS: &'static [&'static str] = &["allow_voting"];

    fn extra_values(&self) -> Vec<Value> {
        vec![Value::Integer(bool_to_int(self.allow_voting))]
    }

    fn from_row(core: ActivityCore, row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            core,
            allow_voting: get_bool(row, "allow_voting")?,
            answers: Vec::new(),
        })
    }

    fn after_insert(&self, conn: &Connection) -> RepoResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO poll_answers (id, poll_id, description, position)
             VALUES (?1, ?2, ?3, ?4);",
        )?;
        for (position, answer) in self.answers.iter().enumerate() {
            stmt.execute(params![
                answer.id.to_string(),
                self.core.id.to_string(),
                answer.description.trim(),
                position as i64,
            ])?;
        }
        Ok(())
    }

    fn after_load(&mut self, conn: &Connection) -> RepoResult<()> {
        self.answers = load_answers(conn, self.core.id)?;
        Ok(())
    }
}

/// Removes likes, flags, bookmarks and notifications of an activity, and its
/// comments with their own relations.
fn purge_relations(conn: &Connection, object_type: &str, object_id: &str) -> RepoResult<()> {
    for table in ["likes", "flags", "bookmarks", "notifications"] {
        conn.execute(
            &format!("DELETE FROM {table} WHERE object_type = ?1 AND object_id = ?2;"),
            params![object_type, object_id],
        )?;
        conn.execute(
            &format!(
                "DELETE FROM {table}
                 WHERE object_type = 'comment' AND object_id IN (
                    SELECT id FROM comments WHERE object_type = ?1 AND object_id = ?2)"
            ),
            params![object_type, object_id],
        )?;
    }
    conn.execute(
        "DELETE FROM comments WHERE object_type = ?1 AND object_id = ?2;",
        params![object_type, object_id],
    )?;
    Ok(())
}

fn load_answers(conn: &Connection, poll: ActivityId) -> RepoResult<Vec<PollAnswer>> {
    let mut stmt = conn.prepare(
        "SELECT
            a.id,
            a.poll_id,
            a.description,
            a.position,
            (SELECT COUNT(*) FROM poll_votes v WHERE v.answer_id = a.id) AS num_votes
         FROM poll_answers a
         WHERE a.poll_id = ?1
         ORDER BY a.position, a.id;",
    )?;
    let mut rows = stmt.query([poll.to_string()])?;
    let mut answers = Vec::new();
    while let Some(row) = rows.next()? {
        answers.push(PollAnswer {
            id: get_uuid(row, "id")?,
            poll_id: get_uuid(row, "poll_id")?,
            description: row.get("description")?,
            position: row.get("position")?,
            num_votes: row.get("num_votes")?,
        });
    }
    Ok(answers)
}

fn core_values(core: &ActivityCore) -> Vec<Value> {
    vec![
        Value::Text(core.id.to_string()),
        Value::Text(core.community_id.to_string()),
        Value::Text(core.owner_id.to_string()),
        core.editor_id
            .map_or(Value::Null, |id| Value::Text(id.to_string())),
        Value::Text(core.title.trim().to_string()),
        Value::Text(core.description.clone()),
        Value::Integer(bool_to_int(core.allow_comments)),
        Value::Integer(bool_to_int(core.is_reshare)),
        Value::Integer(bool_to_int(core.is_pinned)),
        core.parent_id
            .map_or(Value::Null, |id| Value::Text(id.to_string())),
        opt_int(core.published),
        opt_int(core.deleted),
        opt_int(core.edited),
        Value::Integer(core.created),
        Value::Integer(core.updated),
    ]
}

pub(crate) fn parse_core(row: &Row<'_>) -> RepoResult<ActivityCore> {
    Ok(ActivityCore {
        id: get_uuid(row, "id")?,
        community_id: get_uuid(row, "community_id")?,
        owner_id: get_uuid(row, "owner_id")?,
        editor_id: get_opt_uuid(row, "editor_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        allow_comments: get_bool(row, "allow_comments")?,
        is_reshare: get_bool(row, "is_reshare")?,
        is_pinned: get_bool(row, "is_pinned")?,
        parent_id: get_opt_uuid(row, "parent_id")?,
        published: row.get("published")?,
        deleted: row.get("deleted")?,
        edited: row.get("edited")?,
        created: row.get("created")?,
        updated: row.get("updated")?,
    })
}

fn opt_text(value: &Option<String>) -> Value {
    value
        .as_ref()
        .map_or(Value::Null, |text| Value::Text(text.clone()))
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn opt_real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}
