//! Conflict detection.
//!
//! The detector compares a local record against its remote counterpart
//! and classifies the relationship. It is a pure function of the two
//! versions plus the local sync bookkeeping; it never touches storage.

use shelfmark_core::{ArticleRecord, ConflictKind};

/// Outcome of comparing a local record with its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// No conflict; the remote version overwrites the local cache.
    RemoteWins,
    /// No conflict; the local version stands and stays scheduled for
    /// upload.
    LocalWins,
    /// Divergence requiring the resolver.
    Conflict(ConflictKind),
}

/// Classifies one local/remote pair.
///
/// `local` is the mirror's copy (`None` when the article is unknown
/// locally); `remote` is the incoming version (`None` when the remote
/// sent a tombstone).
pub fn detect(local: Option<&ArticleRecord>, remote: Option<&ArticleRecord>) -> Detection {
    let local = match local {
        // Unknown locally: whatever the remote says wins trivially.
        None => return Detection::RemoteWins,
        Some(local) => local,
    };

    if !local.locally_modified {
        // No pending local edit: the remote version (or tombstone) wins.
        return Detection::RemoteWins;
    }

    let remote = match remote {
        // Locally modified but the remote deleted it.
        None => return Detection::Conflict(ConflictKind::DeletedRemotely),
        Some(remote) => remote,
    };

    // Remote counts as newer when it changed after our last confirmed
    // sync; a never-synced record treats any remote version as newer.
    let remote_newer = match local.synced_at {
        Some(synced_at) => remote.updated_at > synced_at,
        None => true,
    };

    if !remote_newer {
        // Local modified, remote unchanged since last sync: local wins.
        return Detection::LocalWins;
    }

    if local.deleted {
        return Detection::Conflict(ConflictKind::DeletedLocally);
    }

    if local.content_differs(remote) {
        Detection::Conflict(ConflictKind::ContentModified)
    } else if local.metadata_differs(remote) {
        Detection::Conflict(ConflictKind::MetadataModified)
    } else {
        // Both sides changed but converged on identical fields; applying
        // the remote copy is harmless and settles the record.
        Detection::RemoteWins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::{ArticleId, Timestamp};

    fn synced_record() -> ArticleRecord {
        let mut r = ArticleRecord::new(ArticleId::new(), "https://example.com", "title");
        r.updated_at = Timestamp::from_millis(1000);
        r.mark_synced(Timestamp::from_millis(1000));
        r
    }

    #[test]
    fn unknown_local_remote_wins() {
        let remote = synced_record();
        assert_eq!(detect(None, Some(&remote)), Detection::RemoteWins);
    }

    #[test]
    fn clean_local_remote_wins() {
        let local = synced_record();
        let mut remote = local.clone();
        remote.title = "remote edit".into();
        remote.updated_at = Timestamp::from_millis(2000);
        assert_eq!(detect(Some(&local), Some(&remote)), Detection::RemoteWins);
        // A tombstone wins over a clean local copy too.
        assert_eq!(detect(Some(&local), None), Detection::RemoteWins);
    }

    #[test]
    fn modified_local_stale_remote_local_wins() {
        let mut local = synced_record();
        local.touch(Timestamp::from_millis(3000));
        local.title = "local edit".into();

        // Remote unchanged since our last sync.
        let mut remote = synced_record();
        remote.id = local.id;
        remote.updated_at = Timestamp::from_millis(1000);

        assert_eq!(detect(Some(&local), Some(&remote)), Detection::LocalWins);
    }

    #[test]
    fn both_modified_content_conflict() {
        let mut local = synced_record();
        local.touch(Timestamp::from_millis(3000));
        local.title = "local title".into();

        let mut remote = local.clone();
        remote.title = "remote title".into();
        remote.updated_at = Timestamp::from_millis(4000);
        remote.locally_modified = false;

        assert_eq!(
            detect(Some(&local), Some(&remote)),
            Detection::Conflict(ConflictKind::ContentModified)
        );
    }

    #[test]
    fn both_modified_metadata_conflict() {
        let mut local = synced_record();
        local.touch(Timestamp::from_millis(3000));
        local.tags.push("local-tag".into());

        let mut remote = synced_record();
        remote.id = local.id;
        remote.tags = vec!["remote-tag".into()];
        remote.updated_at = Timestamp::from_millis(4000);

        assert_eq!(
            detect(Some(&local), Some(&remote)),
            Detection::Conflict(ConflictKind::MetadataModified)
        );
    }

    #[test]
    fn content_conflict_outranks_metadata() {
        let mut local = synced_record();
        local.touch(Timestamp::from_millis(3000));
        local.title = "local title".into();
        local.tags.push("local-tag".into());

        let mut remote = synced_record();
        remote.id = local.id;
        remote.title = "remote title".into();
        remote.tags = vec!["remote-tag".into()];
        remote.updated_at = Timestamp::from_millis(4000);

        assert_eq!(
            detect(Some(&local), Some(&remote)),
            Detection::Conflict(ConflictKind::ContentModified)
        );
    }

    #[test]
    fn deleted_remotely_conflict() {
        let mut local = synced_record();
        local.touch(Timestamp::from_millis(3000));
        assert_eq!(
            detect(Some(&local), None),
            Detection::Conflict(ConflictKind::DeletedRemotely)
        );
    }

    #[test]
    fn deleted_locally_conflict() {
        let mut local = synced_record();
        local.touch(Timestamp::from_millis(3000));
        local.deleted = true;

        let mut remote = synced_record();
        remote.id = local.id;
        remote.title = "remote edit".into();
        remote.updated_at = Timestamp::from_millis(4000);

        assert_eq!(
            detect(Some(&local), Some(&remote)),
            Detection::Conflict(ConflictKind::DeletedLocally)
        );
    }

    #[test]
    fn never_synced_local_edit_conflicts_with_remote() {
        // Local record created offline, remote has its own copy.
        let mut local = ArticleRecord::new(ArticleId::new(), "https://example.com", "local");
        local.updated_at = Timestamp::from_millis(500);

        let mut remote = local.clone();
        remote.title = "remote".into();
        remote.updated_at = Timestamp::from_millis(400);
        remote.locally_modified = false;

        assert_eq!(
            detect(Some(&local), Some(&remote)),
            Detection::Conflict(ConflictKind::ContentModified)
        );
    }

    #[test]
    fn converged_edits_remote_wins() {
        let mut local = synced_record();
        local.touch(Timestamp::from_millis(3000));

        let mut remote = local.clone();
        remote.updated_at = Timestamp::from_millis(4000);
        remote.locally_modified = false;

        assert_eq!(detect(Some(&local), Some(&remote)), Detection::RemoteWins);
    }
}
