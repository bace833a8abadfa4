//! Remote API client boundary.
//!
//! The engine never speaks HTTP directly. It consumes the [`RemoteClient`]
//! trait, which a host implements over its transport of choice; the
//! [`MockRemote`] implementation here is scriptable for tests.
//!
//! Incoming payloads are tagged wire structs ([`RemoteArticle`]) validated
//! at this boundary: a malformed payload is rejected as a per-item
//! validation error before it can reach the conflict detector.

use crate::error::RemoteError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shelfmark_core::{ArticleId, ArticleRecord, Timestamp};
use std::collections::{HashMap, VecDeque};

/// Opaque pagination cursor issued by the remote delta feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaCursor(String);

impl DeltaCursor {
    /// Wraps a cursor token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of the remote delta feed.
#[derive(Debug, Clone, Default)]
pub struct ChangePage {
    /// Changed records, tombstones included.
    pub items: Vec<RemoteArticle>,
    /// Cursor for the next page.
    pub next_cursor: Option<DeltaCursor>,
    /// Whether more pages follow.
    pub has_more: bool,
}

/// An article as the remote service sends it.
///
/// This is the wire shape; [`RemoteArticle::into_record`] validates it
/// into an [`ArticleRecord`] before the engine uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteArticle {
    /// Remote identifier, shared with the local mirror.
    pub id: String,
    /// Source URL.
    pub url: String,
    /// Title.
    pub title: String,
    /// Readable body.
    pub content: Option<String>,
    /// Short excerpt.
    pub excerpt: Option<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Favorite flag.
    pub favorite: bool,
    /// Archived flag.
    pub archived: bool,
    /// Tombstone: the remote deleted this article.
    pub deleted: bool,
    /// Remote modification instant, milliseconds since the Unix epoch.
    pub updated_at: u64,
}

impl RemoteArticle {
    /// Validates the wire payload into a local record.
    ///
    /// The record comes back clean: not locally modified, not yet stamped
    /// with a sync instant (the orchestrator stamps it when applying).
    pub fn into_record(self) -> Result<ArticleRecord, RemoteError> {
        let id = ArticleId::parse(&self.id)
            .map_err(|_| RemoteError::Validation(format!("malformed article id {:?}", self.id)))?;
        if self.url.is_empty() && !self.deleted {
            return Err(RemoteError::Validation(format!(
                "article {id} has an empty url"
            )));
        }
        if self.updated_at == 0 {
            return Err(RemoteError::Validation(format!(
                "article {id} has no modification timestamp"
            )));
        }

        Ok(ArticleRecord {
            id,
            url: self.url,
            title: self.title,
            content: self.content,
            excerpt: self.excerpt,
            tags: self.tags,
            favorite: self.favorite,
            archived: self.archived,
            deleted: self.deleted,
            updated_at: Timestamp::from_millis(self.updated_at),
            synced_at: None,
            locally_modified: false,
        })
    }

    /// Parses just the article id, usable even when full validation fails.
    pub fn parsed_id(&self) -> Option<ArticleId> {
        ArticleId::parse(&self.id).ok()
    }

    /// Approximate serialized size in bytes, for transfer accounting.
    pub fn approximate_size(&self) -> u64 {
        let text = self.url.len()
            + self.title.len()
            + self.content.as_deref().map_or(0, str::len)
            + self.excerpt.as_deref().map_or(0, str::len)
            + self.tags.iter().map(String::len).sum::<usize>();
        text as u64 + 64
    }
}

impl From<&ArticleRecord> for RemoteArticle {
    fn from(record: &ArticleRecord) -> Self {
        Self {
            id: record.id.to_string(),
            url: record.url.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            excerpt: record.excerpt.clone(),
            tags: record.tags.clone(),
            favorite: record.favorite,
            archived: record.archived,
            deleted: record.deleted,
            updated_at: record.updated_at.as_millis(),
        }
    }
}

/// Network client for the remote article service.
///
/// Implementations classify every failure as a [`RemoteError`]; the engine
/// never inspects transport internals. Writes are idempotent keyed by
/// article id and mutation kind: creating an article that already exists
/// returns the existing record, deleting an absent one reports
/// [`RemoteError::NotFound`] (which the engine treats as confirmation).
pub trait RemoteClient: Send + Sync {
    /// Fetches one page of changes since `cursor` (`None` = from the
    /// beginning of the feed).
    fn fetch_changes_since(
        &self,
        cursor: Option<&DeltaCursor>,
        limit: u32,
    ) -> Result<ChangePage, RemoteError>;

    /// Creates an article remotely.
    fn create_article(&self, record: &ArticleRecord) -> Result<RemoteArticle, RemoteError>;

    /// Updates an article remotely.
    fn update_article(
        &self,
        id: ArticleId,
        record: &ArticleRecord,
    ) -> Result<RemoteArticle, RemoteError>;

    /// Deletes an article remotely.
    fn delete_article(&self, id: ArticleId) -> Result<(), RemoteError>;
}

/// A recorded call against [`MockRemote`], for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// A delta page fetch.
    FetchChanges {
        /// Requested page size.
        limit: u32,
    },
    /// An article creation.
    Create(ArticleId),
    /// An article update.
    Update(ArticleId),
    /// An article deletion.
    Delete(ArticleId),
}

/// A scriptable in-memory remote for tests.
///
/// Pages queued with [`MockRemote::queue_page`] are served in order;
/// writes land in an internal map with idempotent-create semantics;
/// failures can be injected per article or for the next page fetch.
#[derive(Debug, Default)]
pub struct MockRemote {
    pages: RwLock<VecDeque<ChangePage>>,
    articles: RwLock<HashMap<ArticleId, RemoteArticle>>,
    fail_article: RwLock<HashMap<ArticleId, RemoteError>>,
    fail_fetches: RwLock<HashMap<u64, RemoteError>>,
    fetch_count: RwLock<u64>,
    calls: RwLock<Vec<RemoteCall>>,
}

impl MockRemote {
    /// Creates an empty mock remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a delta page to be served by the next fetch.
    pub fn queue_page(&self, page: ChangePage) {
        self.pages.write().push_back(page);
    }

    /// Injects a failure for every operation touching `id` until cleared.
    pub fn fail_article(&self, id: ArticleId, error: RemoteError) {
        self.fail_article.write().insert(id, error);
    }

    /// Clears an injected per-article failure.
    pub fn clear_failure(&self, id: ArticleId) {
        self.fail_article.write().remove(&id);
    }

    /// Makes the `seq`-th page fetch (0-based, counted across the mock's
    /// lifetime) fail once.
    pub fn fail_fetch(&self, seq: u64, error: RemoteError) {
        self.fail_fetches.write().insert(seq, error);
    }

    /// Seeds the remote-side article map directly.
    pub fn seed_article(&self, article: RemoteArticle) {
        if let Some(id) = article.parsed_id() {
            self.articles.write().insert(id, article);
        }
    }

    /// Returns the remote-side copy of an article, if present.
    pub fn remote_article(&self, id: ArticleId) -> Option<RemoteArticle> {
        self.articles.read().get(&id).cloned()
    }

    /// Returns every call recorded so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.read().clone()
    }

    /// Counts recorded calls matching `call`.
    pub fn call_count(&self, call: &RemoteCall) -> usize {
        self.calls.read().iter().filter(|c| *c == call).count()
    }

    fn check_injected(&self, id: ArticleId) -> Result<(), RemoteError> {
        if let Some(err) = self.fail_article.read().get(&id) {
            return Err(err.clone());
        }
        Ok(())
    }
}

impl RemoteClient for MockRemote {
    fn fetch_changes_since(
        &self,
        cursor: Option<&DeltaCursor>,
        limit: u32,
    ) -> Result<ChangePage, RemoteError> {
        self.calls.write().push(RemoteCall::FetchChanges { limit });

        let seq = {
            let mut count = self.fetch_count.write();
            let seq = *count;
            *count += 1;
            seq
        };
        if let Some(err) = self.fail_fetches.write().remove(&seq) {
            return Err(err);
        }

        Ok(self.pages.write().pop_front().unwrap_or(ChangePage {
            items: Vec::new(),
            next_cursor: cursor.cloned(),
            has_more: false,
        }))
    }

    fn create_article(&self, record: &ArticleRecord) -> Result<RemoteArticle, RemoteError> {
        self.calls.write().push(RemoteCall::Create(record.id));
        self.check_injected(record.id)?;

        let mut articles = self.articles.write();
        // Idempotent create: a duplicate retry confirms the existing copy.
        if let Some(existing) = articles.get(&record.id) {
            return Ok(existing.clone());
        }
        let wire = RemoteArticle::from(record);
        articles.insert(record.id, wire.clone());
        Ok(wire)
    }

    fn update_article(
        &self,
        id: ArticleId,
        record: &ArticleRecord,
    ) -> Result<RemoteArticle, RemoteError> {
        self.calls.write().push(RemoteCall::Update(id));
        self.check_injected(id)?;

        let mut articles = self.articles.write();
        if !articles.contains_key(&id) {
            return Err(RemoteError::NotFound(id));
        }
        let wire = RemoteArticle::from(record);
        articles.insert(id, wire.clone());
        Ok(wire)
    }

    fn delete_article(&self, id: ArticleId) -> Result<(), RemoteError> {
        self.calls.write().push(RemoteCall::Delete(id));
        self.check_injected(id)?;

        if self.articles.write().remove(&id).is_none() {
            return Err(RemoteError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> ArticleRecord {
        ArticleRecord::new(ArticleId::new(), "https://example.com", title)
    }

    #[test]
    fn wire_roundtrip_validates() {
        let local = record("hello");
        let wire = RemoteArticle::from(&local);
        let back = wire.into_record().unwrap();
        assert_eq!(back.id, local.id);
        assert_eq!(back.title, local.title);
        assert!(!back.locally_modified);
        assert!(back.synced_at.is_none());
    }

    #[test]
    fn malformed_id_rejected() {
        let mut wire = RemoteArticle::from(&record("x"));
        wire.id = "not-a-uuid".into();
        assert!(matches!(
            wire.into_record(),
            Err(RemoteError::Validation(_))
        ));
    }

    #[test]
    fn empty_url_rejected_unless_tombstone() {
        let mut wire = RemoteArticle::from(&record("x"));
        wire.url = String::new();
        assert!(wire.clone().into_record().is_err());

        wire.deleted = true;
        assert!(wire.into_record().is_ok());
    }

    #[test]
    fn zero_timestamp_rejected() {
        let mut wire = RemoteArticle::from(&record("x"));
        wire.updated_at = 0;
        assert!(matches!(
            wire.into_record(),
            Err(RemoteError::Validation(_))
        ));
    }

    #[test]
    fn mock_create_is_idempotent() {
        let remote = MockRemote::new();
        let r = record("a");

        remote.create_article(&r).unwrap();
        let again = remote.create_article(&r).unwrap();

        assert_eq!(again.id, r.id.to_string());
        assert_eq!(remote.call_count(&RemoteCall::Create(r.id)), 2);
        // Still exactly one remote copy
        assert!(remote.remote_article(r.id).is_some());
    }

    #[test]
    fn mock_update_missing_is_not_found() {
        let remote = MockRemote::new();
        let r = record("a");
        assert!(matches!(
            remote.update_article(r.id, &r),
            Err(RemoteError::NotFound(_))
        ));
    }

    #[test]
    fn mock_delete_missing_is_not_found() {
        let remote = MockRemote::new();
        let id = ArticleId::new();
        assert!(matches!(
            remote.delete_article(id),
            Err(RemoteError::NotFound(_))
        ));
    }

    #[test]
    fn mock_serves_queued_pages_in_order() {
        let remote = MockRemote::new();
        remote.queue_page(ChangePage {
            items: vec![RemoteArticle::from(&record("p1"))],
            next_cursor: Some(DeltaCursor::new("c1")),
            has_more: true,
        });
        remote.queue_page(ChangePage {
            items: vec![],
            next_cursor: Some(DeltaCursor::new("c2")),
            has_more: false,
        });

        let p1 = remote.fetch_changes_since(None, 10).unwrap();
        assert_eq!(p1.items.len(), 1);
        assert!(p1.has_more);

        let p2 = remote
            .fetch_changes_since(p1.next_cursor.as_ref(), 10)
            .unwrap();
        assert!(!p2.has_more);
        assert_eq!(p2.next_cursor, Some(DeltaCursor::new("c2")));
    }

    #[test]
    fn injected_failure_until_cleared() {
        let remote = MockRemote::new();
        let r = record("a");
        remote.fail_article(r.id, RemoteError::network_retryable("flaky"));

        assert!(remote.create_article(&r).is_err());
        remote.clear_failure(r.id);
        assert!(remote.create_article(&r).is_ok());
    }
}
