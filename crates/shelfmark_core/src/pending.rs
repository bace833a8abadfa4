//! Pending local changes awaiting remote confirmation.

use crate::article::ArticleId;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of local mutation awaiting upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// The article was created locally and does not exist remotely.
    Create,
    /// The article exists remotely and was edited locally.
    Update,
    /// The article was deleted locally.
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A local mutation not yet acknowledged by the remote service.
///
/// A pending change is created when a local edit occurs and is removed
/// only after the remote confirms the corresponding write. It is never
/// silently dropped: a terminal upload failure leaves it in place so the
/// next session retries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// The article the mutation applies to.
    pub article_id: ArticleId,
    /// What kind of mutation is pending.
    pub kind: MutationKind,
    /// When the mutation was enqueued.
    pub enqueued_at: Timestamp,
}

impl PendingChange {
    /// Creates a pending change enqueued now.
    pub fn new(article_id: ArticleId, kind: MutationKind) -> Self {
        Self {
            article_id,
            kind,
            enqueued_at: Timestamp::now(),
        }
    }

    /// Creates a pending change with an explicit enqueue instant.
    pub fn enqueued_at(article_id: ArticleId, kind: MutationKind, at: Timestamp) -> Self {
        Self {
            article_id,
            kind,
            enqueued_at: at,
        }
    }

    /// The idempotency key for this change: uploads are deduplicated by
    /// article and mutation kind.
    pub fn key(&self) -> (ArticleId, MutationKind) {
        (self.article_id, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_identifies_article_and_kind() {
        let id = ArticleId::new();
        let a = PendingChange::enqueued_at(id, MutationKind::Update, Timestamp::from_millis(1));
        let b = PendingChange::enqueued_at(id, MutationKind::Update, Timestamp::from_millis(2));
        let c = PendingChange::enqueued_at(id, MutationKind::Delete, Timestamp::from_millis(3));

        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn kind_display() {
        assert_eq!(MutationKind::Create.to_string(), "create");
        assert_eq!(MutationKind::Delete.to_string(), "delete");
    }
}
