//! Property suites for the detector, resolver, and stats invariants.

use proptest::prelude::*;
use shelfmark_core::{ArticleId, ArticleRecord, Conflict, ConflictKind, Timestamp};
use shelfmark_sync::{
    detect, resolve, ConflictStrategy, Detection, ResolutionChoice, ResolutionOutcome, SyncStats,
};
use std::time::Duration;

fn record_with(
    id: ArticleId,
    updated_ms: u64,
    synced_ms: Option<u64>,
    locally_modified: bool,
    deleted: bool,
) -> ArticleRecord {
    let mut record = ArticleRecord::new(id, "https://example.com/p", "property");
    record.updated_at = Timestamp::from_millis(updated_ms);
    record.synced_at = synced_ms.map(Timestamp::from_millis);
    record.locally_modified = locally_modified;
    record.deleted = deleted;
    record
}

fn conflict_with(local_ms: u64, remote_ms: u64) -> Conflict {
    let id = ArticleId::new();
    let mut local = record_with(id, local_ms, Some(1), true, false);
    local.title = "local".into();
    let mut remote = record_with(id, remote_ms, None, false, false);
    remote.title = "remote".into();
    Conflict::new(id, ConflictKind::ContentModified, Some(local), Some(remote))
}

proptest! {
    /// Last-write-wins is a pure function of the two timestamps, with the
    /// documented tie-break to remote.
    #[test]
    fn last_write_wins_is_deterministic(
        local_ms in 1u64..1_000_000_000_000,
        remote_ms in 1u64..1_000_000_000_000,
    ) {
        let conflict = conflict_with(local_ms, remote_ms);
        let first = resolve(&conflict, ConflictStrategy::LastWriteWins);
        let second = resolve(&conflict, ConflictStrategy::LastWriteWins);
        prop_assert_eq!(first, second);

        let expected = if local_ms > remote_ms {
            ResolutionChoice::UseLocal
        } else {
            ResolutionChoice::UseRemote
        };
        prop_assert_eq!(first, ResolutionOutcome::Resolved(expected));
    }

    /// Fixed-preference strategies ignore timestamps entirely; manual
    /// always defers.
    #[test]
    fn fixed_strategies_ignore_timestamps(
        local_ms in 1u64..1_000_000_000_000,
        remote_ms in 1u64..1_000_000_000_000,
    ) {
        let conflict = conflict_with(local_ms, remote_ms);
        prop_assert_eq!(
            resolve(&conflict, ConflictStrategy::PreferLocal),
            ResolutionOutcome::Resolved(ResolutionChoice::UseLocal)
        );
        prop_assert_eq!(
            resolve(&conflict, ConflictStrategy::PreferRemote),
            ResolutionOutcome::Resolved(ResolutionChoice::UseRemote)
        );
        prop_assert_eq!(
            resolve(&conflict, ConflictStrategy::Manual),
            ResolutionOutcome::Deferred
        );
    }

    /// A record without pending local edits never produces a conflict,
    /// and a conflict never arises without a local version.
    #[test]
    fn conflicts_require_a_local_modification(
        local_updated in 1u64..1_000_000,
        local_synced in proptest::option::of(1u64..1_000_000),
        locally_modified: bool,
        local_deleted: bool,
        remote_present: bool,
        remote_updated in 1u64..1_000_000,
    ) {
        let id = ArticleId::new();
        let local = record_with(id, local_updated, local_synced, locally_modified, local_deleted);
        let remote = remote_present.then(|| record_with(id, remote_updated, None, false, false));

        // Unknown locally: remote always wins.
        prop_assert_eq!(detect(None, remote.as_ref()), Detection::RemoteWins);

        let detection = detect(Some(&local), remote.as_ref());
        if !locally_modified {
            prop_assert_eq!(detection, Detection::RemoteWins);
        } else if let Detection::Conflict(kind) = detection {
            // Conflict kinds agree with the shape of the inputs.
            match kind {
                ConflictKind::DeletedRemotely => prop_assert!(remote.is_none()),
                ConflictKind::DeletedLocally => {
                    prop_assert!(local_deleted);
                    prop_assert!(remote.is_some());
                }
                ConflictKind::ContentModified | ConflictKind::MetadataModified => {
                    prop_assert!(remote.is_some());
                }
            }
        }
    }

    /// Arbitrary interleavings of session events keep the stats
    /// invariants: `total >= successful + failed`, `conflicts_resolved`
    /// never decreases.
    #[test]
    fn stats_invariants_hold_under_any_interleaving(ops in prop::collection::vec(0u8..4, 0..64)) {
        let mut stats = SyncStats::new();
        let mut session_open = false;
        let mut last_resolved = 0;

        for op in ops {
            match op {
                0 => {
                    stats.record_session_start();
                    session_open = true;
                }
                1 if session_open => {
                    stats.record_success(Duration::from_millis(10), Timestamp::from_millis(1));
                    session_open = false;
                }
                2 if session_open => {
                    stats.record_failure();
                    session_open = false;
                }
                3 => stats.record_conflict_resolved(),
                _ => {}
            }

            prop_assert!(stats.is_consistent());
            prop_assert!(stats.conflicts_resolved >= last_resolved);
            last_resolved = stats.conflicts_resolved;
        }
    }

    /// The running mean stays within the range of observed durations.
    #[test]
    fn average_duration_stays_bounded(durations in prop::collection::vec(1u64..100_000, 1..32)) {
        let mut stats = SyncStats::new();
        for d in &durations {
            stats.record_session_start();
            stats.record_success(Duration::from_millis(*d), Timestamp::from_millis(1));
        }

        let min = *durations.iter().min().unwrap() as f64;
        let max = *durations.iter().max().unwrap() as f64;
        prop_assert!(stats.average_sync_duration_ms >= min - 1e-6);
        prop_assert!(stats.average_sync_duration_ms <= max + 1e-6);
    }
}
