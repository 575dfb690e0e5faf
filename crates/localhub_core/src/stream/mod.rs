//! Combined activity stream across all activity tables.
//!
//! # Responsibility
//! - Query posts, photos, events and polls as one ordered, paginated stream.
//! - Annotate each row with viewer-relative counters and flags.
//!
//! # Invariants
//! - Every SELECT branch projects the same columns in the same order.
//! - Only activities whose owner is an active member of the community appear.

use crate::model::activity::{ActivityId, ActivityKind};
use crate::model::content::ContentRef;
use std::collections::BTreeSet;
use uuid::Uuid;

mod activity_stream;

pub use activity_stream::ActivityStream;

pub const DEFAULT_PAGE_SIZE: usize = 12;
pub const MAX_PAGE_SIZE: usize = 100;

/// Which publication states are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Published and not deleted.
    #[default]
    Published,
    /// Published, or a draft owned by the viewer; never deleted.
    PublishedOrOwner,
    /// Drafts of the viewer.
    Private,
    /// Deleted by a moderator.
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamOrder {
    #[default]
    Published,
    Created,
}

/// Stream filters; every set field narrows the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamQuery {
    pub community: Uuid,
    pub viewer: Option<Uuid>,
    /// Viewer moderates the community; enables `is_flagged`.
    pub viewer_is_moderator: bool,
    pub visibility: Visibility,
    /// Restrict to these kinds; `None` means all.
    pub kinds: Option<BTreeSet<ActivityKind>>,
    pub owner: Option<Uuid>,
    pub hashtag: Option<String>,
    pub search: Option<String>,
    /// Apply the viewer's stream filters (followed users and/or tags).
    pub following: bool,
    /// Hide owners and tags the viewer blocked.
    pub exclude_blocked: bool,
    /// Hide activities the viewer already reshared.
    pub unreshared: bool,
    pub pinned_first: bool,
    pub order: StreamOrder,
    /// 1-based page number.
    pub page: usize,
    pub page_size: Option<usize>,
}

impl StreamQuery {
    /// Published activities of `community`, newest first, first page.
    pub fn for_community(community: Uuid) -> Self {
        Self {
            community,
            viewer: None,
            viewer_is_moderator: false,
            visibility: Visibility::Published,
            kinds: None,
            owner: None,
            hashtag: None,
            search: None,
            following: false,
            exclude_blocked: false,
            unreshared: false,
            pinned_first: false,
            order: StreamOrder::Published,
            page: 1,
            page_size: None,
        }
    }

    pub fn viewed_by(mut self, viewer: Uuid, is_moderator: bool) -> Self {
        self.viewer = Some(viewer);
        self.viewer_is_moderator = is_moderator;
        self
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Viewer-relative counters and flags for one stream row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Annotations {
    pub num_comments: i64,
    pub num_likes: i64,
    pub num_reshares: i64,
    pub has_liked: bool,
    pub has_bookmarked: bool,
    pub has_flagged: bool,
    pub has_reshared: bool,
    pub is_flagged: bool,
    /// Viewer has an unread notification about this activity.
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamItem {
    pub kind: ActivityKind,
    pub id: ActivityId,
    pub community_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub is_pinned: bool,
    pub is_reshare: bool,
    pub parent_id: Option<ActivityId>,
    pub published: Option<i64>,
    pub deleted: Option<i64>,
    pub created: i64,
    pub annotations: Annotations,
}

impl StreamItem {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef::new(self.kind.content_type(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    /// Row count of the whole query without pagination.
    pub total: i64,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            has_next: self.has_next,
        }
    }
}
