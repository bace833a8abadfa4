//! Article records and identifiers.

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an article, shared between the local mirror and
/// the remote service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ArticleId(Uuid);

impl ArticleId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an identifier from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One article in the local mirror.
///
/// A record carries both the readable payload (title, body, excerpt) and
/// the bookkeeping the sync engine needs: when it was last modified, when
/// it was last confirmed by the remote, and whether it has local edits
/// that the remote has not yet seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Article identifier.
    pub id: ArticleId,
    /// Source URL.
    pub url: String,
    /// Title.
    pub title: String,
    /// Extracted readable body, if fetched.
    pub content: Option<String>,
    /// Short excerpt for list views.
    pub excerpt: Option<String>,
    /// User-assigned tags.
    pub tags: Vec<String>,
    /// Favorite flag.
    pub favorite: bool,
    /// Archived flag.
    pub archived: bool,
    /// Local tombstone: the user deleted this article but the remote has
    /// not yet confirmed the deletion.
    pub deleted: bool,
    /// Last modification instant (local edit or applied remote update).
    pub updated_at: Timestamp,
    /// Instant of the last successful sync for this record. `None` means
    /// the record has never been confirmed by the remote.
    pub synced_at: Option<Timestamp>,
    /// True when the record has been edited since `synced_at`.
    pub locally_modified: bool,
}

impl ArticleRecord {
    /// Creates a new, never-synced record.
    pub fn new(id: ArticleId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: title.into(),
            content: None,
            excerpt: None,
            tags: Vec::new(),
            favorite: false,
            archived: false,
            deleted: false,
            updated_at: Timestamp::now(),
            synced_at: None,
            locally_modified: true,
        }
    }

    /// Returns true if the record has local edits the remote has not seen.
    pub fn is_dirty(&self) -> bool {
        self.locally_modified
    }

    /// Returns true if the readable payload (title, body, excerpt, url)
    /// differs from `other`.
    pub fn content_differs(&self, other: &ArticleRecord) -> bool {
        self.title != other.title
            || self.content != other.content
            || self.excerpt != other.excerpt
            || self.url != other.url
    }

    /// Returns true if the metadata (tags and flags) differs from `other`.
    pub fn metadata_differs(&self, other: &ArticleRecord) -> bool {
        self.tags != other.tags
            || self.favorite != other.favorite
            || self.archived != other.archived
    }

    /// Records a local edit at `at`.
    pub fn touch(&mut self, at: Timestamp) {
        self.updated_at = at;
        self.locally_modified = true;
    }

    /// Marks the record as confirmed by the remote at `at`.
    pub fn mark_synced(&mut self, at: Timestamp) {
        self.synced_at = Some(at);
        self.locally_modified = false;
    }

    /// Approximate serialized size in bytes, used for transfer accounting.
    pub fn approximate_size(&self) -> u64 {
        let text = self.url.len()
            + self.title.len()
            + self.content.as_deref().map_or(0, str::len)
            + self.excerpt.as_deref().map_or(0, str::len)
            + self.tags.iter().map(String::len).sum::<usize>();
        text as u64 + 64
    }
}
