//! File-backed article store.

use crate::article::{ArticleId, ArticleRecord};
use crate::error::{StoreError, StoreResult};
use crate::pending::{MutationKind, PendingChange};
use crate::store::ArticleStore;
use crate::timestamp::Timestamp;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Serialized snapshot of the whole store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    articles: Vec<ArticleRecord>,
    pending: Vec<PendingChange>,
}

/// A durable [`ArticleStore`] persisting the mirror as a single CBOR file.
///
/// Every mutation rewrites the snapshot to a temporary file and renames it
/// into place, so the file on disk is always a complete, decodable state.
/// An advisory lock on a sibling `.lock` file prevents two processes from
/// operating on the same mirror; the lock is held until the store is
/// dropped.
#[derive(Debug)]
pub struct FileArticleStore {
    path: PathBuf,
    // Held for the advisory lock; never read or written.
    _lock: File,
    articles: RwLock<HashMap<ArticleId, ArticleRecord>>,
    pending: RwLock<Vec<PendingChange>>,
}

impl FileArticleStore {
    /// Opens or creates a store at `path`, creating parent directories if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the store,
    /// or a decode error if the existing file is corrupt.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(path.to_path_buf()))?;

        let snapshot = if path.exists() {
            let file = File::open(path)?;
            ciborium::from_reader::<Snapshot, _>(file)
                .map_err(|e| StoreError::Decode(e.to_string()))?
        } else {
            Snapshot::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
            articles: RwLock::new(
                snapshot.articles.into_iter().map(|r| (r.id, r)).collect(),
            ),
            pending: RwLock::new(snapshot.pending),
        })
    }

    /// Returns the path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current state out via temp-file-then-rename.
    fn persist(&self) -> StoreResult<()> {
        let snapshot = Snapshot {
            articles: self.articles.read().values().cloned().collect(),
            pending: self.pending.read().clone(),
        };

        let tmp_path = self.path.with_extension("tmp");
        let tmp = File::create(&tmp_path)?;
        ciborium::into_writer(&snapshot, &tmp)
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl ArticleStore for FileArticleStore {
    fn pending_changes(&self) -> StoreResult<Vec<PendingChange>> {
        Ok(self.pending.read().clone())
    }

    fn enqueue_change(&self, change: PendingChange) -> StoreResult<()> {
        {
            let mut pending = self.pending.write();
            if pending.iter().any(|p| p.key() == change.key()) {
                return Ok(());
            }
            pending.push(change);
        }
        self.persist()
    }

    fn remove_pending(&self, article_id: ArticleId, kind: MutationKind) -> StoreResult<()> {
        self.pending
            .write()
            .retain(|p| p.key() != (article_id, kind));
        self.persist()
    }

    fn clear_pending(&self) -> StoreResult<()> {
        self.pending.write().clear();
        self.persist()
    }

    fn article(&self, id: ArticleId) -> StoreResult<Option<ArticleRecord>> {
        Ok(self.articles.read().get(&id).cloned())
    }

    fn upsert_article(&self, record: ArticleRecord) -> StoreResult<()> {
        self.articles.write().insert(record.id, record);
        self.persist()
    }

    fn upsert_batch(&self, records: &[ArticleRecord]) -> StoreResult<()> {
        {
            let mut articles = self.articles.write();
            for record in records {
                articles.insert(record.id, record.clone());
            }
        }
        self.persist()
    }

    fn mark_synced(&self, id: ArticleId, at: Timestamp) -> StoreResult<()> {
        {
            let mut articles = self.articles.write();
            let record = articles
                .get_mut(&id)
                .ok_or(StoreError::ArticleNotFound(id))?;
            record.mark_synced(at);
        }
        self.persist()
    }

    fn delete_article(&self, id: ArticleId) -> StoreResult<()> {
        self.articles.write().remove(&id);
        self.persist()
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
    use tempfile::TempDir;

    fn record(title: &str) -> ArticleRecord {
        ArticleRecord::new(ArticleId::new(), "https://example.com", title)
    }

    #[test]
    fn roundtrip_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mirror.cbor");

        let r = record("persisted");
        let id = r.id;
        {
            let store = FileArticleStore::open(&path).unwrap();
            store.upsert_article(r.clone()).unwrap();
            store
                .enqueue_change(PendingChange::new(id, MutationKind::Update))
                .unwrap();
        }

        let store = FileArticleStore::open(&path).unwrap();
        assert_eq!(store.article(id).unwrap(), Some(r));
        assert_eq!(store.pending_changes().unwrap().len(), 1);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mirror.cbor");

        let _store = FileArticleStore::open(&path).unwrap();
        let err = FileArticleStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mirror.cbor");

        drop(FileArticleStore::open(&path).unwrap());
        assert!(FileArticleStore::open(&path).is_ok());
    }

    #[test]
    fn mark_synced_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mirror.cbor");

        let r = record("a");
        let id = r.id;
        {
            let store = FileArticleStore::open(&path).unwrap();
            store.upsert_article(r).unwrap();
            store.mark_synced(id, Timestamp::from_millis(7777)).unwrap();
        }

        let store = FileArticleStore::open(&path).unwrap();
        let record = store.article(id).unwrap().unwrap();
        assert_eq!(record.synced_at, Some(Timestamp::from_millis(7777)));
        assert!(!record.locally_modified);
    }
}
