//! Activity records: posts, photos, events and polls.
//!
//! # Responsibility
//! - Define the common activity core shared by every activity table.
//! - Provide reshare copying, tag extraction and moderation helpers.
//!
//! # Invariants
//! - `title` is non-blank and at most 300 chars.
//! - A reshare always points at the original activity, never at another reshare.
//! - `published = None` means draft; `deleted = Some(_)` means removed by a moderator.

use super::content::{ContentRef, ContentType};
use super::event::Event;
use super::{now_ms, require_text, ValidationError};
use crate::text::extract_hashtags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ActivityId = Uuid;

const TITLE_MAX_CHARS: usize = 300;

/// Activity tables combined in the activity stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Post,
    Photo,
    Event,
    Poll,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::Post,
        ActivityKind::Photo,
        ActivityKind::Event,
        ActivityKind::Poll,
    ];

    pub fn as_str(self) -> &'static str {
        self.content_type().as_str()
    }

    pub fn parse(value: &str) -> Option<Self> {
        ContentType::parse(value).and_then(Self::from_content_type)
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Photo => "photos",
            Self::Event => "events",
            Self::Poll => "polls",
        }
    }

    pub fn content_type(self) -> ContentType {
        match self {
            Self::Post => ContentType::Post,
            Self::Photo => ContentType::Photo,
            Self::Event => ContentType::Event,
            Self::Poll => ContentType::Poll,
        }
    }

    pub fn from_content_type(content_type: ContentType) -> Option<Self> {
        match content_type {
            ContentType::Post => Some(Self::Post),
            ContentType::Photo => Some(Self::Photo),
            ContentType::Event => Some(Self::Event),
            ContentType::Poll => Some(Self::Poll),
            _ => None,
        }
    }
}

impl Display for ActivityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns shared by every activity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCore {
    pub id: ActivityId,
    pub community_id: Uuid,
    pub owner_id: Uuid,
    /// Last user to edit the activity; differs from owner on moderator edits.
    pub editor_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub allow_comments: bool,
    pub is_reshare: bool,
    pub is_pinned: bool,
    /// Original activity when this is a reshare.
    pub parent_id: Option<ActivityId>,
    pub published: Option<i64>,
    pub deleted: Option<i64>,
    pub edited: Option<i64>,
    pub created: i64,
    pub updated: i64,
}

impl ActivityCore {
    /// Creates an unpublished (draft) activity core.
    pub fn new(community_id: Uuid, owner_id: Uuid, title: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            community_id,
            owner_id,
            editor_id: None,
            title: title.into(),
            description: String::new(),
            allow_comments: true,
            is_reshare: false,
            is_pinned: false,
            parent_id: None,
            published: None,
            deleted: None,
            edited: None,
            created: now,
            updated: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, TITLE_MAX_CHARS)
    }

    pub fn is_published(&self) -> bool {
        self.published.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    pub fn is_edited_by_moderator(&self) -> bool {
        matches!(self.editor_id, Some(editor) if editor != self.owner_id)
    }

    /// Hashtags found in title and description, lowercased.
    pub fn extract_tags(&self) -> BTreeSet<String> {
        let mut tags = extract_hashtags(&self.description);
        tags.extend(extract_hashtags(&self.title));
        tags
    }

    /// Tags of this activity that the community marks as sensitive.
    pub fn content_warning_tags(&self, community_tags: &BTreeSet<String>) -> BTreeSet<String> {
        self.extract_tags()
            .intersection(community_tags)
            .cloned()
            .collect()
    }

    pub(crate) fn reshare_core(&self, owner_id: Uuid) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            community_id: self.community_id,
            owner_id,
            editor_id: None,
            title: self.title.clone(),
            description: self.description.clone(),
            allow_comments: self.allow_comments,
            is_reshare: true,
            is_pinned: false,
            parent_id: Some(self.parent_id.unwrap_or(self.id)),
            published: Some(now),
            deleted: None,
            edited: None,
            created: now,
            updated: now,
        }
    }
}

/// Behavior common to all activity kinds.
pub trait ActivityRecord: Clone {
    const KIND: ActivityKind;

    fn core(&self) -> &ActivityCore;
    fn core_mut(&mut self) -> &mut ActivityCore;

    fn validate(&self) -> Result<(), ValidationError> {
        self.core().validate()
    }

    /// Copies the resharable fields into a new published reshare owned by `owner_id`.
    ///
    /// When `self` is already a reshare, the copy points at the original.
    fn reshare(&self, owner_id: Uuid) -> Self;

    /// Overwrites the resharable fields with the values of `source`.
    fn sync_from(&mut self, source: &Self);

    fn into_any(self) -> AnyActivity;

    fn content_ref(&self) -> ContentRef {
        ContentRef::new(Self::KIND.content_type(), self.core().id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub core: ActivityCore,
    pub url: Option<String>,
    pub opengraph_title: Option<String>,
    pub opengraph_description: Option<String>,
    pub opengraph_image: Option<String>,
}

impl Post {
    pub fn new(community_id: Uuid, owner_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            core: ActivityCore::new(community_id, owner_id, title),
            url: None,
            opengraph_title: None,
            opengraph_description: None,
            opengraph_image: None,
        }
    }

    /// Host part of `url`, without a leading `www.`.
    pub fn domain(&self) -> Option<String> {
        self.url.as_deref().and_then(url_domain)
    }
}

impl ActivityRecord for Post {
    const KIND: ActivityKind = ActivityKind::Post;

    fn core(&self) -> &ActivityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActivityCore {
        &mut self.core
    }

    fn reshare(&self, owner_id: Uuid) -> Self {
        let mut copy = self.clone();
        copy.core = self.core.reshare_core(owner_id);
        copy
    }

    fn sync_from(&mut self, source: &Self) {
        self.core.title = source.core.title.clone();
        self.core.description = source.core.description.clone();
        self.url = source.url.clone();
        self.opengraph_title = source.opengraph_title.clone();
        self.opengraph_description = source.opengraph_description.clone();
        self.opengraph_image = source.opengraph_image.clone();
    }

    fn into_any(self) -> AnyActivity {
        AnyActivity::Post(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub core: ActivityCore,
    /// Stored image path; image processing happens outside the core.
    pub image: String,
    pub attribution: String,
    pub original_url: Option<String>,
    pub cc_license: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Photo {
    pub fn new(
        community_id: Uuid,
        owner_id: Uuid,
        title: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            core: ActivityCore::new(community_id, owner_id, title),
            image: image.into(),
            attribution: String::new(),
            original_url: None,
            cc_license: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn has_map(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

impl ActivityRecord for Photo {
    const KIND: ActivityKind = ActivityKind::Photo;

    fn core(&self) -> &ActivityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActivityCore {
        &mut self.core
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.core.validate()?;
        require_text("image", &self.image, 500)
    }

    fn reshare(&self, owner_id: Uuid) -> Self {
        let mut copy = self.clone();
        copy.core = self.core.reshare_core(owner_id);
        copy
    }

    fn sync_from(&mut self, source: &Self) {
        self.core.title = source.core.title.clone();
        self.core.description = source.core.description.clone();
        self.image = source.image.clone();
        self.attribution = source.attribution.clone();
        self.original_url = source.original_url.clone();
        self.cc_license = source.cc_license.clone();
        self.latitude = source.latitude;
        self.longitude = source.longitude;
    }

    fn into_any(self) -> AnyActivity {
        AnyActivity::Photo(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub core: ActivityCore,
    pub allow_voting: bool,
    /// Ordered answers; populated by repository reads.
    pub answers: Vec<PollAnswer>,
}

impl Poll {
    pub fn new(
        community_id: Uuid,
        owner_id: Uuid,
        title: impl Into<String>,
        answers: &[&str],
    ) -> Self {
        let core = ActivityCore::new(community_id, owner_id, title);
        let answers = answers
            .iter()
            .enumerate()
            .map(|(position, description)| PollAnswer {
                id: Uuid::new_v4(),
                poll_id: core.id,
                description: description.to_string(),
                position: position as i64,
                num_votes: 0,
            })
            .collect();
        Self {
            core,
            allow_voting: true,
            answers,
        }
    }

    pub fn total_votes(&self) -> i64 {
        self.answers.iter().map(|answer| answer.num_votes).sum()
    }
}

impl ActivityRecord for Poll {
    const KIND: ActivityKind = ActivityKind::Poll;

    fn core(&self) -> &ActivityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActivityCore {
        &mut self.core
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.core.validate()?;
        if !self.core.is_reshare && self.answers.is_empty() {
            return Err(ValidationError::PollWithoutAnswers);
        }
        for answer in &self.answers {
            require_text("answer", &answer.description, 180)?;
        }
        Ok(())
    }

    fn reshare(&self, owner_id: Uuid) -> Self {
        Self {
            core: self.core.reshare_core(owner_id),
            allow_voting: false,
            answers: Vec::new(),
        }
    }

    fn sync_from(&mut self, source: &Self) {
        self.core.title = source.core.title.clone();
        self.core.description = source.core.description.clone();
    }

    fn into_any(self) -> AnyActivity {
        AnyActivity::Poll(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAnswer {
    pub id: Uuid,
    pub poll_id: ActivityId,
    pub description: String,
    pub position: i64,
    pub num_votes: i64,
}

/// Any activity kind, as returned by stream hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object_type", rename_all = "snake_case")]
pub enum AnyActivity {
    Post(Post),
    Photo(Photo),
    Event(Event),
    Poll(Poll),
}

impl AnyActivity {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Self::Post(_) => ActivityKind::Post,
            Self::Photo(_) => ActivityKind::Photo,
            Self::Event(_) => ActivityKind::Event,
            Self::Poll(_) => ActivityKind::Poll,
        }
    }

    pub fn core(&self) -> &ActivityCore {
        match self {
            Self::Post(post) => &post.core,
            Self::Photo(photo) => &photo.core,
            Self::Event(event) => &event.core,
            Self::Poll(poll) => &poll.core,
        }
    }

    pub fn content_ref(&self) -> ContentRef {
        ContentRef::new(self.kind().content_type(), self.core().id)
    }
}

pub(crate) fn url_domain(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityKind, ActivityRecord, Poll, Post};
    use crate::model::ValidationError;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    #[test]
    fn reshare_of_reshare_points_at_original() {
        let community = Uuid::new_v4();
        let mut original = Post::new(community, Uuid::new_v4(), "original #news");
        original.core.published = Some(1);
        let first = original.reshare(Uuid::new_v4());
        let second = first.reshare(Uuid::new_v4());

        assert!(first.core.is_reshare);
        assert!(first.core.published.is_some());
        assert_eq!(first.core.parent_id, Some(original.core.id));
        assert_eq!(second.core.parent_id, Some(original.core.id));
        assert_eq!(second.core.title, "original #news");
    }

    #[test]
    fn extracts_tags_from_title_and_description() {
        let mut post = Post::new(Uuid::new_v4(), Uuid::new_v4(), "Weekend #Hiking");
        post.core.description = "bring boots #outdoors #nsfw".to_string();
        let tags = post.core.extract_tags();
        assert!(tags.contains("hiking"));
        assert!(tags.contains("outdoors"));

        let community_tags = BTreeSet::from(["nsfw".to_string()]);
        assert_eq!(
            post.core.content_warning_tags(&community_tags),
            BTreeSet::from(["nsfw".to_string()])
        );
    }

    #[test]
    fn moderator_edit_detection() {
        let mut post = Post::new(Uuid::new_v4(), Uuid::new_v4(), "title");
        assert!(!post.core.is_edited_by_moderator());
        post.core.editor_id = Some(post.core.owner_id);
        assert!(!post.core.is_edited_by_moderator());
        post.core.editor_id = Some(Uuid::new_v4());
        assert!(post.core.is_edited_by_moderator());
    }

    #[test]
    fn poll_requires_answers() {
        let poll = Poll::new(Uuid::new_v4(), Uuid::new_v4(), "Lunch?", &[]);
        assert_eq!(poll.validate(), Err(ValidationError::PollWithoutAnswers));
    }

    #[test]
    fn post_domain_strips_www() {
        let mut post = Post::new(Uuid::new_v4(), Uuid::new_v4(), "link");
        post.url = Some("https://www.Example.com:8080/path?q=1".to_string());
        assert_eq!(post.domain().as_deref(), Some("example.com"));
    }

    #[test]
    fn activity_kind_parse() {
        assert_eq!(ActivityKind::parse("photo"), Some(ActivityKind::Photo));
        assert_eq!(ActivityKind::parse("comment"), None);
    }
}
