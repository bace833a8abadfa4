//! # Shelfmark Core
//!
//! Data model and local store boundary for the Shelfmark read-it-later
//! client.
//!
//! This crate provides:
//! - Article records with modification and sync bookkeeping
//! - Pending-change tracking for local mutations awaiting upload
//! - Conflict records for divergent local/remote versions
//! - The [`ArticleStore`] trait the sync engine consumes, with in-memory
//!   and file-backed implementations
//!
//! The sync engine itself lives in `shelfmark_sync`; UI, navigation, and
//! platform storage are host-application concerns behind the store trait.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod article;
mod conflict;
mod error;
mod pending;
mod store;
mod timestamp;

pub use article::{ArticleId, ArticleRecord};
pub use conflict::{Conflict, ConflictId, ConflictKind, ResolutionTag};
pub use error::{StoreError, StoreResult};
pub use pending::{MutationKind, PendingChange};
pub use store::{ArticleStore, FileArticleStore, MemoryArticleStore};
pub use timestamp::Timestamp;
