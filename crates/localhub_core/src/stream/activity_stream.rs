use super::{Annotations, Page, StreamItem, StreamOrder, StreamQuery, Visibility};
use crate::model::activity::{ActivityKind, AnyActivity};
use crate::model::user::StreamFilter;
use crate::repo::activity_repo::{ActivityRepository, SqliteActivityRepository, StoredActivity};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{get_bool, get_opt_uuid, get_uuid, RepoError, RepoResult};
use log::debug;
use rusqlite::types::{ToSql, Value};
use rusqlite::{Connection, Row};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use uuid::Uuid;

/// Builds and runs the combined activity stream query.
pub struct ActivityStream<'conn> {
    conn: &'conn Connection,
}

/// SQL fragments shared by every branch plus their named bindings.
struct StreamSql {
    binds: BTreeMap<&'static str, Value>,
    viewer: Option<Uuid>,
    filters: BTreeSet<StreamFilter>,
}

impl StreamSql {
    fn bind(&mut self, name: &'static str, value: Value) -> &'static str {
        self.binds.insert(name, value);
        name
    }

    fn branch(&mut self, kind: ActivityKind, query: &StreamQuery) -> String {
        let table = kind.table();
        let object_type = kind.as_str();
        let community = self.bind(":community", Value::Text(query.community.to_string()));
        let viewer = self
            .viewer
            .map(|viewer| self.bind(":viewer", Value::Text(viewer.to_string())));

        let reshare_block_filter = viewer.map_or(String::new(), |viewer| {
            format!(
                " AND r.owner_id NOT IN (SELECT blocked_id FROM user_blocks WHERE blocker_id = {viewer})"
            )
        });
        let viewer_exists = |sql: String| -> String {
            match viewer {
                Some(_) => format!("EXISTS ({sql})"),
                None => "0".to_string(),
            }
        };
        let viewer_param = viewer.unwrap_or("NULL");

        let has_liked = viewer_exists(format!(
            "SELECT 1 FROM likes l WHERE l.user_id = {viewer_param}
             AND l.object_type = '{object_type}' AND l.object_id = a.id"
        ));
        let has_bookmarked = viewer_exists(format!(
            "SELECT 1 FROM bookmarks b WHERE b.user_id = {viewer_param}
             AND b.object_type = '{object_type}' AND b.object_id = a.id"
        ));
        let has_flagged = viewer_exists(format!(
            "SELECT 1 FROM flags f WHERE f.user_id = {viewer_param}
             AND f.object_type = '{object_type}' AND f.object_id = a.id"
        ));
        let has_reshared = viewer_exists(format!(
            "SELECT 1 FROM {table} hr WHERE hr.parent_id = a.id
             AND hr.owner_id = {viewer_param} AND hr.is_reshare = 1"
        ));
        let is_new = viewer_exists(format!(
            "SELECT 1 FROM notifications n WHERE n.recipient_id = {viewer_param}
             AND n.object_type = '{object_type}' AND n.object_id = a.id AND n.is_read = 0"
        ));
        let is_flagged = if query.viewer_is_moderator && viewer.is_some() {
            format!(
                "EXISTS (SELECT 1 FROM flags mf
                 WHERE mf.object_type = '{object_type}' AND mf.object_id = a.id)"
            )
        } else {
            "0".to_string()
        };

        let mut sql = format!(
            "SELECT
                '{object_type}' AS object_type,
                a.id,
                a.community_id,
                a.owner_id,
                a.title,
                a.is_pinned,
                a.is_reshare,
                a.parent_id,
                a.published,
                a.deleted,
                a.created,
                (SELECT COUNT(*) FROM comments c
                 WHERE c.object_type = '{object_type}' AND c.object_id = a.id
                   AND c.deleted IS NULL) AS num_comments,
                (SELECT COUNT(*) FROM likes lc
                 WHERE lc.object_type = '{object_type}' AND lc.object_id = a.id) AS num_likes,
                (SELECT COUNT(*) FROM {table} r
                 JOIN memberships rm ON rm.user_id = r.owner_id
                   AND rm.community_id = r.community_id AND rm.active = 1
                 JOIN users ru ON ru.id = r.owner_id AND ru.is_active = 1
                 WHERE r.parent_id = a.id AND r.is_reshare = 1{reshare_block_filter}) AS num_reshares,
                {has_liked} AS has_liked,
                {has_bookmarked} AS has_bookmarked,
                {has_flagged} AS has_flagged,
                {has_reshared} AS has_reshared,
                {is_flagged} AS is_flagged,
                {is_new} AS is_new
             FROM {table} a
             WHERE a.community_id = {community}
               AND EXISTS (
                   SELECT 1 FROM memberships om
                   JOIN users ou ON ou.id = om.user_id
                   WHERE om.user_id = a.owner_id AND om.community_id = a.community_id
                     AND om.active = 1 AND ou.is_active = 1)"
        );

        sql.push_str(&match (query.visibility, viewer) {
            (Visibility::Published, _) | (Visibility::PublishedOrOwner, None) => {
                " AND a.published IS NOT NULL AND a.deleted IS NULL".to_string()
            }
            (Visibility::PublishedOrOwner, Some(viewer)) => format!(
                " AND a.deleted IS NULL AND (a.published IS NOT NULL OR a.owner_id = {viewer})"
            ),
            (Visibility::Private, Some(viewer)) => format!(
                " AND a.published IS NULL AND a.deleted IS NULL AND a.owner_id = {viewer}"
            ),
            (Visibility::Private, None) => " AND 0 = 1".to_string(),
            (Visibility::Deleted, _) => " AND a.deleted IS NOT NULL".to_string(),
        });

        if let Some(owner) = query.owner {
            let owner = self.bind(":owner", Value::Text(owner.to_string()));
            sql.push_str(&format!(" AND a.owner_id = {owner}"));
        }

        if let Some(tag) = query
            .hashtag
            .as_deref()
            .map(|tag| tag.trim().trim_start_matches(['#', '＃']).to_lowercase())
            .filter(|tag| !tag.is_empty())
        {
            let tag = self.bind(":hashtag", Value::Text(tag));
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM activity_tags t
                  WHERE t.object_type = '{object_type}' AND t.object_id = a.id AND t.tag = {tag})"
            ));
        }

        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            let pattern = self.bind(":search", Value::Text(like_pattern(search)));
            sql.push_str(&format!(
                " AND (a.title LIKE {pattern} ESCAPE '\\' OR a.description LIKE {pattern} ESCAPE '\\')"
            ));
        }

        if let Some(viewer) = viewer {
            if query.following && !self.filters.is_empty() {
                let mut options = vec![format!("a.owner_id = {viewer}")];
                if self.filters.contains(&StreamFilter::Users) {
                    options.push(format!(
                        "a.owner_id IN (SELECT followed_id FROM user_follows WHERE follower_id = {viewer})"
                    ));
                }
                if self.filters.contains(&StreamFilter::Tags) {
                    options.push(format!(
                        "EXISTS (SELECT 1 FROM activity_tags ft
                         JOIN user_tag_follows tf ON tf.tag = ft.tag AND tf.user_id = {viewer}
                         WHERE ft.object_type = '{object_type}' AND ft.object_id = a.id)"
                    ));
                }
                sql.push_str(&format!(" AND ({})", options.join(" OR ")));
            }

            if query.exclude_blocked {
                sql.push_str(&format!(
                    " AND a.owner_id NOT IN (SELECT blocked_id FROM user_blocks WHERE blocker_id = {viewer})
                      AND (a.owner_id = {viewer} OR NOT EXISTS (
                          SELECT 1 FROM activity_tags bt
                          JOIN user_tag_blocks ub ON ub.tag = bt.tag AND ub.user_id = {viewer}
                          WHERE bt.object_type = '{object_type}' AND bt.object_id = a.id))"
                ));
            }

            if query.unreshared {
                sql.push_str(&format!(
                    " AND NOT EXISTS (SELECT 1 FROM {table} ur
                      WHERE ur.parent_id = a.id AND ur.owner_id = {viewer} AND ur.is_reshare = 1)"
                ));
            }
        }

        sql
    }
}

impl<'conn> ActivityStream<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Runs the stream query and returns one page plus the total row count.
    pub fn query(&self, query: &StreamQuery) -> RepoResult<Page<StreamItem>> {
        let started_at = Instant::now();
        let page_size = query.effective_page_size();
        let page = query.page.max(1);

        let kinds: Vec<ActivityKind> = match &query.kinds {
            Some(kinds) => kinds.iter().copied().collect(),
            None => ActivityKind::ALL.to_vec(),
        };
        if kinds.is_empty() {
            return Ok(Page {
                items: Vec::new(),
                page,
                page_size,
                total: 0,
                has_next: false,
            });
        }

        let filters = match (query.following, query.viewer) {
            (true, Some(viewer)) => SqliteUserRepository::new(self.conn)
                .get_user(viewer)?
                .map(|user| user.activity_stream_filters)
                .unwrap_or_default(),
            _ => BTreeSet::new(),
        };
        let mut sql = StreamSql {
            binds: BTreeMap::new(),
            viewer: query.viewer,
            filters,
        };
        let union = kinds
            .iter()
            .map(|kind| sql.branch(*kind, query))
            .collect::<Vec<_>>()
            .join("\nUNION ALL\n");

        let total: i64 = {
            let count_sql = format!("SELECT COUNT(*) FROM ({union}) AS stream;");
            let mut stmt = self.conn.prepare(&count_sql)?;
            let named = named_params(&sql.binds);
            stmt.query_row(named.as_slice(), |row| row.get(0))?
        };

        let mut order_by = Vec::new();
        if query.pinned_first {
            order_by.push("is_pinned DESC");
        }
        match query.order {
            StreamOrder::Published => order_by.extend(["published DESC", "created DESC"]),
            StreamOrder::Created => order_by.push("created DESC"),
        }
        order_by.push("id");

        let offset = (page - 1) * page_size;
        sql.bind(":limit", Value::Integer(page_size as i64));
        sql.bind(":offset", Value::Integer(offset as i64));
        let page_sql = format!(
            "SELECT * FROM ({union}) AS stream ORDER BY {} LIMIT :limit OFFSET :offset;",
            order_by.join(", ")
        );

        let mut stmt = self.conn.prepare(&page_sql)?;
        let named = named_params(&sql.binds);
        let mut rows = stmt.query(named.as_slice())?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_stream_row(row)?);
        }

        debug!(
            "event=stream_query module=stream status=ok kinds={} rows={} total={} duration_ms={}",
            kinds.len(),
            items.len(),
            total,
            started_at.elapsed().as_millis()
        );

        Ok(Page {
            has_next: (offset + items.len()) < total as usize,
            items,
            page,
            page_size,
            total,
        })
    }

    /// Loads full objects for stream items, keeping stream order.
    ///
    /// Items whose rows vanished since the stream query are skipped.
    pub fn load_objects(&self, items: &[StreamItem]) -> RepoResult<Vec<AnyActivity>> {
        let repo = SqliteActivityRepository::new(self.conn);
        let mut ids: HashMap<ActivityKind, Vec<Uuid>> = HashMap::new();
        for item in items {
            ids.entry(item.kind).or_default().push(item.id);
        }

        let mut loaded: HashMap<(ActivityKind, Uuid), AnyActivity> = HashMap::new();
        for (kind, ids) in ids {
            match kind {
                ActivityKind::Post => collect(&repo, &ids, &mut loaded, AnyActivity::Post)?,
                ActivityKind::Photo => collect(&repo, &ids, &mut loaded, AnyActivity::Photo)?,
                ActivityKind::Event => collect(&repo, &ids, &mut loaded, AnyActivity::Event)?,
                ActivityKind::Poll => collect(&repo, &ids, &mut loaded, AnyActivity::Poll)?,
            }
        }

        Ok(items
            .iter()
            .filter_map(|item| loaded.remove(&(item.kind, item.id)))
            .collect())
    }
}

fn collect<A: StoredActivity>(
    repo: &SqliteActivityRepository<'_>,
    ids: &[Uuid],
    loaded: &mut HashMap<(ActivityKind, Uuid), AnyActivity>,
    wrap: fn(A) -> AnyActivity,
) -> RepoResult<()> {
    for activity in repo.get_many::<A>(ids)? {
        loaded.insert((A::KIND, activity.core().id), wrap(activity));
    }
    Ok(())
}

fn named_params<'a>(
    binds: &'a BTreeMap<&'static str, Value>,
) -> Vec<(&'static str, &'a dyn ToSql)> {
    binds
        .iter()
        .map(|(name, value)| (*name, value as &dyn ToSql))
        .collect()
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn parse_stream_row(row: &Row<'_>) -> RepoResult<StreamItem> {
    let type_text: String = row.get("object_type")?;
    let kind = ActivityKind::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid activity type `{type_text}` in stream"))
    })?;
    Ok(StreamItem {
        kind,
        id: get_uuid(row, "id")?,
        community_id: get_uuid(row, "community_id")?,
        owner_id: get_uuid(row, "owner_id")?,
        title: row.get("title")?,
        is_pinned: get_bool(row, "is_pinned")?,
        is_reshare: get_bool(row, "is_reshare")?,
        parent_id: get_opt_uuid(row, "parent_id")?,
        published: row.get("published")?,
        deleted: row.get("deleted")?,
        created: row.get("created")?,
        annotations: Annotations {
            num_comments: row.get("num_comments")?,
            num_likes: row.get("num_likes")?,
            num_reshares: row.get("num_reshares")?,
            has_liked: get_bool(row, "has_liked")?,
            has_bookmarked: get_bool(row, "has_bookmarked")?,
            has_flagged: get_bool(row, "has_flagged")?,
            has_reshared: get_bool(row, "has_reshared")?,
            is_flagged: get_bool(row, "is_flagged")?,
            is_new: get_bool(row, "is_new")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
