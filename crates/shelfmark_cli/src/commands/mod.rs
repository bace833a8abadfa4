//! CLI command implementations.

pub mod conflicts;
pub mod resolve;
pub mod stats;
pub mod status;

use shelfmark_core::{ArticleId, ArticleRecord, FileArticleStore};
use std::path::Path;

/// The article mirror file inside a sync directory.
pub const MIRROR_FILE: &str = "mirror.cbor";

/// Opens the article mirror of a sync directory.
pub fn open_mirror(dir: &Path) -> Result<FileArticleStore, Box<dyn std::error::Error>> {
    Ok(FileArticleStore::open(&dir.join(MIRROR_FILE))?)
}

/// A remote client for store-local commands: this tool never talks to
/// the service, so every network operation reports itself unreachable.
#[derive(Debug, Default)]
pub struct OfflineRemote;

impl shelfmark_sync::RemoteClient for OfflineRemote {
    fn fetch_changes_since(
        &self,
        _cursor: Option<&shelfmark_sync::DeltaCursor>,
        _limit: u32,
    ) -> Result<shelfmark_sync::ChangePage, shelfmark_sync::RemoteError> {
        Err(offline())
    }

    fn create_article(
        &self,
        _record: &ArticleRecord,
    ) -> Result<shelfmark_sync::RemoteArticle, shelfmark_sync::RemoteError> {
        Err(offline())
    }

    fn update_article(
        &self,
        _id: ArticleId,
        _record: &ArticleRecord,
    ) -> Result<shelfmark_sync::RemoteArticle, shelfmark_sync::RemoteError> {
        Err(offline())
    }

    fn delete_article(&self, _id: ArticleId) -> Result<(), shelfmark_sync::RemoteError> {
        Err(offline())
    }
}

fn offline() -> shelfmark_sync::RemoteError {
    shelfmark_sync::RemoteError::network_fatal("shelfmark CLI runs store-local commands only")
}
