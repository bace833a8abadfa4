//! Conflicts between local and remote versions of an article.

use crate::article::{ArticleId, ArticleRecord};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a conflict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Classification of a detected divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both sides changed the readable payload (title, body, excerpt, url).
    ContentModified,
    /// Both sides changed tags or flags, payload untouched.
    MetadataModified,
    /// The remote deleted an article that has local edits.
    DeletedRemotely,
    /// The local side deleted an article the remote has since modified.
    DeletedLocally,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictKind::ContentModified => "content-modified",
            ConflictKind::MetadataModified => "metadata-modified",
            ConflictKind::DeletedRemotely => "deleted-remotely",
            ConflictKind::DeletedLocally => "deleted-locally",
        };
        f.write_str(s)
    }
}

/// Tag recording which strategy produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionTag {
    /// Resolved by timestamp comparison.
    LastWriteWins,
    /// Resolved by always keeping the local version.
    PreferLocal,
    /// Resolved by always accepting the remote version.
    PreferRemote,
    /// Resolved by an explicit user decision.
    Manual,
}

/// A detected divergence between local and remote state for one article.
///
/// At most one conflict is active per article at any time. A conflict is
/// created by the detector during the download phase and removed from the
/// active set once a resolution is produced, either automatically or via
/// an explicit user decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Conflict identifier.
    pub id: ConflictId,
    /// The article both sides disagree about.
    pub article_id: ArticleId,
    /// What kind of divergence was detected.
    pub kind: ConflictKind,
    /// The local version. `None` when the article was deleted locally.
    pub local: Option<ArticleRecord>,
    /// The remote version. `None` when the article was deleted remotely.
    pub remote: Option<ArticleRecord>,
    /// When the conflict was detected.
    pub created_at: Timestamp,
    /// When the conflict was resolved, if it has been.
    pub resolved_at: Option<Timestamp>,
    /// Which strategy resolved it, if it has been.
    pub resolution: Option<ResolutionTag>,
}

impl Conflict {
    /// Creates a new unresolved conflict.
    pub fn new(
        article_id: ArticleId,
        kind: ConflictKind,
        local: Option<ArticleRecord>,
        remote: Option<ArticleRecord>,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            article_id,
            kind,
            local,
            remote,
            created_at: Timestamp::now(),
            resolved_at: None,
            resolution: None,
        }
    }

    /// Returns true once a resolution has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Records a resolution at `at`.
    pub fn resolve(&mut self, tag: ResolutionTag, at: Timestamp) {
        self.resolution = Some(tag);
        self.resolved_at = Some(at);
    }

    /// The local modification timestamp, if a local version exists.
    pub fn local_updated_at(&self) -> Option<Timestamp> {
        self.local.as_ref().map(|r| r.updated_at)
    }

    /// The remote modification timestamp, if a remote version exists.
    pub fn remote_updated_at(&self) -> Option<Timestamp> {
        self.remote.as_ref().map(|r| r.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> Conflict {
        let id = ArticleId::new();
        let local = ArticleRecord::new(id, "https://example.com", "local");
        let remote = ArticleRecord::new(id, "https://example.com", "remote");
        Conflict::new(id, ConflictKind::ContentModified, Some(local), Some(remote))
    }

    #[test]
    fn starts_unresolved() {
        let c = conflict();
        assert!(!c.is_resolved());
        assert!(c.resolved_at.is_none());
    }

    #[test]
    fn resolve_records_tag_and_instant() {
        let mut c = conflict();
        let at = Timestamp::from_millis(9000);
        c.resolve(ResolutionTag::PreferRemote, at);
        assert!(c.is_resolved());
        assert_eq!(c.resolution, Some(ResolutionTag::PreferRemote));
        assert_eq!(c.resolved_at, Some(at));
    }

    #[test]
    fn deleted_remotely_has_no_remote_version() {
        let id = ArticleId::new();
        let local = ArticleRecord::new(id, "https://example.com", "local");
        let c = Conflict::new(id, ConflictKind::DeletedRemotely, Some(local), None);
        assert!(c.remote_updated_at().is_none());
        assert!(c.local_updated_at().is_some());
    }

    #[test]
    fn kind_display() {
        assert_eq!(ConflictKind::ContentModified.to_string(), "content-modified");
        assert_eq!(ConflictKind::DeletedLocally.to_string(), "deleted-locally");
    }
}
