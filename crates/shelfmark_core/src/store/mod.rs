//! The local article store boundary.
//!
//! The sync engine never talks to a concrete database. It consumes the
//! [`ArticleStore`] trait, which a host application implements on top of
//! whatever on-device storage it uses. Two implementations ship with this
//! crate: [`MemoryArticleStore`] for tests and ephemeral use, and
//! [`FileArticleStore`] for a durable single-file mirror.

mod file;
mod memory;

pub use file::FileArticleStore;
pub use memory::MemoryArticleStore;

use crate::article::{ArticleId, ArticleRecord};
use crate::error::StoreResult;
use crate::pending::{MutationKind, PendingChange};
use crate::timestamp::Timestamp;

/// Durable storage for the local article mirror and its pending changes.
///
/// # Contract
///
/// - Pending changes are returned in enqueue order per article; enqueueing
///   a change whose `(article_id, kind)` key is already pending is a no-op.
/// - `remove_pending` removes exactly the entry with the given key.
/// - Reads return owned snapshots; callers never observe torn state from
///   concurrent local edits.
/// - All mutations are durable once the call returns.
pub trait ArticleStore: Send + Sync {
    /// Returns all pending changes in enqueue order.
    fn pending_changes(&self) -> StoreResult<Vec<PendingChange>>;

    /// Enqueues a local mutation for upload. Duplicate keys are ignored.
    fn enqueue_change(&self, change: PendingChange) -> StoreResult<()>;

    /// Removes a confirmed pending change.
    fn remove_pending(&self, article_id: ArticleId, kind: MutationKind) -> StoreResult<()>;

    /// Removes every pending change. Used by the explicit account clear.
    fn clear_pending(&self) -> StoreResult<()>;

    /// Looks up one article.
    fn article(&self, id: ArticleId) -> StoreResult<Option<ArticleRecord>>;

    /// Inserts or replaces one article.
    fn upsert_article(&self, record: ArticleRecord) -> StoreResult<()>;

    /// Inserts or replaces a batch of articles.
    fn upsert_batch(&self, records: &[ArticleRecord]) -> StoreResult<()>;

    /// Marks an article as confirmed by the remote at `at`.
    ///
    /// Clears the locally-modified flag. Fails with
    /// [`StoreError::ArticleNotFound`](crate::StoreError::ArticleNotFound)
    /// if the article does not exist.
    fn mark_synced(&self, id: ArticleId, at: Timestamp) -> StoreResult<()>;

    /// Removes an article from the mirror. Removing an absent article is
    /// a no-op.
    fn delete_article(&self, id: ArticleId) -> StoreResult<()>;

    /// Returns articles whose `updated_at` is strictly after `since`.
    fn articles_modified_since(&self, since: Timestamp) -> StoreResult<Vec<ArticleRecord>>;
}
