//! Comments on activities.

use super::content::ContentRef;
use super::{now_ms, require_text, ValidationError};
use crate::text::abbreviate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CommentId = Uuid;

const CONTENT_MAX_CHARS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub community_id: Uuid,
    pub owner_id: Uuid,
    pub editor_id: Option<Uuid>,
    /// Activity the comment belongs to.
    pub content_object: ContentRef,
    /// Comment this one replies to.
    pub parent_id: Option<CommentId>,
    /// Markdown body.
    pub content: String,
    pub deleted: Option<i64>,
    pub edited: Option<i64>,
    pub created: i64,
    pub updated: i64,
}

impl Comment {
    pub fn new(
        community_id: Uuid,
        owner_id: Uuid,
        content_object: ContentRef,
        content: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            community_id,
            owner_id,
            editor_id: None,
            content_object,
            parent_id: None,
            content: content.into(),
            deleted: None,
            edited: None,
            created: now,
            updated: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content, CONTENT_MAX_CHARS)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    pub fn is_edited_by_moderator(&self) -> bool {
        matches!(self.editor_id, Some(editor) if editor != self.owner_id)
    }

    /// Short plaintext preview used in notification subjects.
    pub fn abbreviate(&self, length: usize) -> String {
        abbreviate(&self.content, length)
    }
}
