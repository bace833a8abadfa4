//! Cumulative sync statistics.

use serde::{Deserialize, Serialize};
use shelfmark_core::Timestamp;
use std::time::Duration;

/// Process-wide, persisted sync statistics.
///
/// Counters accumulate across sessions and are mutated only by the
/// orchestrator at session boundaries (plus conflict resolution and the
/// explicit user-initiated clear). Observers read snapshots.
///
/// Invariants: `total_syncs >= successful_syncs + failed_syncs`, and
/// `conflicts_resolved` only increases except under an explicit clear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Sessions started.
    pub total_syncs: u64,
    /// Sessions that reached `Success`.
    pub successful_syncs: u64,
    /// Sessions that aborted to `Error`.
    pub failed_syncs: u64,
    /// Completion instant of the last successful session.
    pub last_sync_time: Option<Timestamp>,
    /// Duration of the last successful session, in milliseconds.
    pub last_sync_duration_ms: u64,
    /// Running mean duration of successful sessions, in milliseconds.
    pub average_sync_duration_ms: f64,
    /// Article creations confirmed (uploaded or applied from remote).
    pub articles_created: u64,
    /// Article updates confirmed.
    pub articles_updated: u64,
    /// Article deletions confirmed.
    pub articles_deleted: u64,
    /// Conflicts resolved, automatically or manually.
    pub conflicts_resolved: u64,
    /// Approximate bytes uploaded.
    pub bytes_uploaded: u64,
    /// Approximate bytes downloaded.
    pub bytes_downloaded: u64,
    /// Remote requests issued.
    pub requests: u64,
    /// Downloaded records skipped because the local copy was identical.
    pub cache_hits: u64,
}

impl SyncStats {
    /// Creates zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a session start.
    pub fn record_session_start(&mut self) {
        self.total_syncs += 1;
    }

    /// Records a successful session and folds its duration into the
    /// running mean: `avg = (avg * (n - 1) + d) / n`.
    pub fn record_success(&mut self, duration: Duration, completed_at: Timestamp) {
        self.successful_syncs += 1;
        let millis = duration.as_millis() as u64;
        self.last_sync_duration_ms = millis;
        self.last_sync_time = Some(completed_at);

        let n = self.successful_syncs as f64;
        self.average_sync_duration_ms =
            (self.average_sync_duration_ms * (n - 1.0) + millis as f64) / n;
    }

    /// Records a failed session.
    pub fn record_failure(&mut self) {
        self.failed_syncs += 1;
    }

    /// Records a confirmed creation.
    pub fn record_created(&mut self) {
        self.articles_created += 1;
    }

    /// Records a confirmed update.
    pub fn record_updated(&mut self) {
        self.articles_updated += 1;
    }

    /// Records a confirmed deletion.
    pub fn record_deleted(&mut self) {
        self.articles_deleted += 1;
    }

    /// Records a resolved conflict.
    pub fn record_conflict_resolved(&mut self) {
        self.conflicts_resolved += 1;
    }

    /// Records uploaded payload bytes.
    pub fn record_uploaded(&mut self, bytes: u64) {
        self.bytes_uploaded += bytes;
    }

    /// Records downloaded payload bytes.
    pub fn record_downloaded(&mut self, bytes: u64) {
        self.bytes_downloaded += bytes;
    }

    /// Records one remote request.
    pub fn record_request(&mut self) {
        self.requests += 1;
    }

    /// Records a download skipped because the local copy was identical.
    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    /// Returns true while the session-count invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.total_syncs >= self.successful_syncs + self.failed_syncs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean() {
        let mut stats = SyncStats::new();
        stats.record_session_start();
        stats.record_success(Duration::from_millis(100), Timestamp::from_millis(1));
        assert_eq!(stats.average_sync_duration_ms, 100.0);

        stats.record_session_start();
        stats.record_success(Duration::from_millis(300), Timestamp::from_millis(2));
        assert_eq!(stats.average_sync_duration_ms, 200.0);

        stats.record_session_start();
        stats.record_success(Duration::from_millis(200), Timestamp::from_millis(3));
        assert_eq!(stats.average_sync_duration_ms, 200.0);
        assert_eq!(stats.last_sync_duration_ms, 200);
        assert_eq!(stats.last_sync_time, Some(Timestamp::from_millis(3)));
    }

    #[test]
    fn session_count_invariant() {
        let mut stats = SyncStats::new();
        stats.record_session_start();
        assert!(stats.is_consistent());

        stats.record_failure();
        assert!(stats.is_consistent());
        assert_eq!(stats.total_syncs, 1);
        assert_eq!(stats.failed_syncs, 1);

        stats.record_session_start();
        stats.record_success(Duration::from_millis(50), Timestamp::from_millis(9));
        assert!(stats.is_consistent());
        assert_eq!(stats.total_syncs, stats.successful_syncs + stats.failed_syncs);
    }

    #[test]
    fn cancelled_sessions_count_neither_way() {
        // A started-then-cancelled session bumps only total_syncs.
        let mut stats = SyncStats::new();
        stats.record_session_start();
        assert!(stats.is_consistent());
        assert_eq!(stats.successful_syncs + stats.failed_syncs, 0);
    }
}
