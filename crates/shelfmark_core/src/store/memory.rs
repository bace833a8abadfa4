//! In-memory article store for tests and ephemeral mirrors.

use crate::article::{ArticleId, ArticleRecord};
use crate::error::{StoreError, StoreResult};
use crate::pending::{MutationKind, PendingChange};
use crate::store::ArticleStore;
use crate::timestamp::Timestamp;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory [`ArticleStore`].
///
/// Thread-safe; all reads return owned snapshots. Suitable for unit and
/// integration tests and for hosts that keep their mirror elsewhere.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: RwLock<HashMap<ArticleId, ArticleRecord>>,
    pending: RwLock<Vec<PendingChange>>,
}

impl MemoryArticleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of articles in the mirror.
    pub fn len(&self) -> usize {
        self.articles.read().len()
    }

    /// Returns true if the mirror holds no articles.
    pub fn is_empty(&self) -> bool {
        self.articles.read().is_empty()
    }

    /// Records a local edit: upserts the record with the dirty flag set
    /// and enqueues the matching pending change.
    ///
    /// Convenience for tests and hosts without their own edit pipeline.
    pub fn apply_local_edit(
        &self,
        mut record: ArticleRecord,
        kind: MutationKind,
    ) -> StoreResult<()> {
        record.locally_modified = true;
        let id = record.id;
        self.upsert_article(record)?;
        self.enqueue_change(PendingChange::new(id, kind))
    }
}

impl ArticleStore for MemoryArticleStore {
    fn pending_changes(&self) -> StoreResult<Vec<PendingChange>> {
        Ok(self.pending.read().clone())
    }

    fn enqueue_change(&self, change: PendingChange) -> StoreResult<()> {
        let mut pending = self.pending.write();
        if !pending.iter().any(|p| p.key() == change.key()) {
            pending.push(change);
        }
        Ok(())
    }

    fn remove_pending(&self, article_id: ArticleId, kind: MutationKind) -> StoreResult<()> {
        self.pending
            .write()
            .retain(|p| p.key() != (article_id, kind));
        Ok(())
    }

    fn clear_pending(&self) -> StoreResult<()> {
        self.pending.write().clear();
        Ok(())
    }

    fn article(&self, id: ArticleId) -> StoreResult<Option<ArticleRecord>> {
        Ok(self.articles.read().get(&id).cloned())
    }

    fn upsert_article(&self, record: ArticleRecord) -> StoreResult<()> {
        self.articles.write().insert(record.id, record);
        Ok(())
    }

    fn upsert_batch(&self, records: &[ArticleRecord]) -> StoreResult<()> {
        let mut articles = self.articles.write();
        for record in records {
            articles.insert(record.id, record.clone());
        }
        Ok(())
    }

    fn mark_synced(&self, id: ArticleId, at: Timestamp) -> StoreResult<()> {
        let mut articles = self.articles.write();
        let record = articles
            .get_mut(&id)
            .ok_or(StoreError::ArticleNotFound(id))?;
        record.mark_synced(at);
        Ok(())
    }

    fn delete_article(&self, id: ArticleId) -> StoreResult<()> {
        self.articles.write().remove(&id);
        Ok(())
    }

    fn articles_modified_since(&self, since: Timestamp) -> StoreResult<Vec<ArticleRecord>> {
        Ok(self
            .articles
            .read()
            .values()
            .filter(|r| r.updated_at > since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> ArticleRecord {
        ArticleRecord::new(ArticleId::new(), "https://example.com", title)
    }

    #[test]
    fn upsert_and_get() {
        let store = MemoryArticleStore::new();
        let r = record("a");
        let id = r.id;

        store.upsert_article(r.clone()).unwrap();
        assert_eq!(store.article(id).unwrap(), Some(r));
        assert_eq!(store.article(ArticleId::new()).unwrap(), None);
    }

    #[test]
    fn pending_preserves_enqueue_order() {
        let store = MemoryArticleStore::new();
        let a = ArticleId::new();
        let b = ArticleId::new();

        store
            .enqueue_change(PendingChange::new(a, MutationKind::Update))
            .unwrap();
        store
            .enqueue_change(PendingChange::new(b, MutationKind::Create))
            .unwrap();

        let pending = store.pending_changes().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].article_id, a);
        assert_eq!(pending[1].article_id, b);
    }

    #[test]
    fn enqueue_deduplicates_by_key() {
        let store = MemoryArticleStore::new();
        let id = ArticleId::new();

        store
            .enqueue_change(PendingChange::new(id, MutationKind::Update))
            .unwrap();
        store
            .enqueue_change(PendingChange::new(id, MutationKind::Update))
            .unwrap();
        store
            .enqueue_change(PendingChange::new(id, MutationKind::Delete))
            .unwrap();

        assert_eq!(store.pending_changes().unwrap().len(), 2);
    }

    #[test]
    fn remove_pending_is_exact() {
        let store = MemoryArticleStore::new();
        let id = ArticleId::new();

        store
            .enqueue_change(PendingChange::new(id, MutationKind::Update))
            .unwrap();
        store
            .enqueue_change(PendingChange::new(id, MutationKind::Delete))
            .unwrap();

        store.remove_pending(id, MutationKind::Update).unwrap();
        let pending = store.pending_changes().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, MutationKind::Delete);
    }

    #[test]
    fn upsert_batch_replaces_existing() {
        let store = MemoryArticleStore::new();
        let mut a = record("a");
        let b = record("b");
        store.upsert_article(a.clone()).unwrap();

        a.title = "a2".into();
        store.upsert_batch(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.article(a.id).unwrap().unwrap().title, "a2");
        assert_eq!(store.article(b.id).unwrap(), Some(b));
    }

    #[test]
    fn mark_synced_missing_article() {
        let store = MemoryArticleStore::new();
        let err = store
            .mark_synced(ArticleId::new(), Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::ArticleNotFound(_)));
    }

    #[test]
    fn modified_since_is_strict() {
        let store = MemoryArticleStore::new();
        let mut r = record("a");
        r.updated_at = Timestamp::from_millis(100);
        store.upsert_article(r).unwrap();

        assert_eq!(
            store
                .articles_modified_since(Timestamp::from_millis(99))
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .articles_modified_since(Timestamp::from_millis(100))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryArticleStore::new();
        let r = record("a");
        let id = r.id;
        store.upsert_article(r).unwrap();

        store.delete_article(id).unwrap();
        store.delete_article(id).unwrap();
        assert!(store.article(id).unwrap().is_none());
    }
}
