//! Sync session state and phases.

use serde::{Deserialize, Serialize};
use shelfmark_core::{ArticleId, Timestamp};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for one sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named stage of a sync session's state machine.
///
/// Transitions run forward through the active phases; `Paused` parks an
/// active phase and resumes into the same one; `Idle`, `Success`, and
/// `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// No session has run yet, or the last one was cancelled.
    Idle,
    /// Loading pending changes and the delta cursor.
    Initializing,
    /// Draining pending local changes to the remote.
    UploadingChanges,
    /// Paginating remote deltas into the local mirror.
    DownloadingUpdates,
    /// Running the resolver over detected conflicts.
    ResolvingConflicts,
    /// Advancing the cursor and closing the session.
    Finalizing,
    /// An active phase parked by network loss or app backgrounding.
    Paused,
    /// The session completed.
    Success,
    /// The session aborted on an unrecoverable error.
    Error,
}

impl SyncPhase {
    /// Returns true while the session is actively processing.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::Initializing
                | SyncPhase::UploadingChanges
                | SyncPhase::DownloadingUpdates
                | SyncPhase::ResolvingConflicts
                | SyncPhase::Finalizing
        )
    }

    /// Returns true if a new session may start from this phase.
    pub fn can_start(&self) -> bool {
        matches!(self, SyncPhase::Idle | SyncPhase::Success | SyncPhase::Error)
    }

    /// Returns true for the terminal phases.
    pub fn is_terminal(&self) -> bool {
        self.can_start()
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Initializing => "initializing",
            SyncPhase::UploadingChanges => "uploading-changes",
            SyncPhase::DownloadingUpdates => "downloading-updates",
            SyncPhase::ResolvingConflicts => "resolving-conflicts",
            SyncPhase::Finalizing => "finalizing",
            SyncPhase::Paused => "paused",
            SyncPhase::Success => "success",
            SyncPhase::Error => "error",
        };
        f.write_str(s)
    }
}

/// One execution of the sync engine from start to terminal state.
#[derive(Debug, Clone)]
pub struct SyncSession {
    /// Session identifier.
    pub id: SessionId,
    /// Current phase.
    pub phase: SyncPhase,
    /// When the session started.
    pub started_at: Timestamp,
    /// When the session reached a terminal state.
    pub completed_at: Option<Timestamp>,
    /// Known item count; grows as remote pages arrive, never shrinks.
    pub total_items: u64,
    /// Items processed so far; never exceeds `total_items`.
    pub processed_items: u64,
    /// The item currently in flight.
    pub current_item: Option<ArticleId>,
    /// The active phase this session was paused out of, if paused.
    pub paused_from: Option<SyncPhase>,
}

impl SyncSession {
    /// Creates a fresh idle session placeholder.
    pub fn idle() -> Self {
        Self {
            id: SessionId::new(),
            phase: SyncPhase::Idle,
            started_at: Timestamp::from_millis(0),
            completed_at: None,
            total_items: 0,
            processed_items: 0,
            current_item: None,
            paused_from: None,
        }
    }

    /// Starts a new session now.
    pub fn begin() -> Self {
        Self {
            id: SessionId::new(),
            phase: SyncPhase::Initializing,
            started_at: Timestamp::now(),
            completed_at: None,
            total_items: 0,
            processed_items: 0,
            current_item: None,
            paused_from: None,
        }
    }

    /// Records item progress, keeping the counters consistent.
    pub fn advance(&mut self, current: Option<ArticleId>) {
        self.processed_items = (self.processed_items + 1).min(self.total_items);
        self.current_item = current;
    }

    /// Grows the known total as remote pages arrive.
    pub fn grow_total(&mut self, by: u64) {
        self.total_items += by;
    }
}

/// A read-only view of the current session handed to observers.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Current phase.
    pub phase: SyncPhase,
    /// Known item count.
    pub total_items: u64,
    /// Items processed so far.
    pub processed_items: u64,
    /// The item currently in flight.
    pub current_item: Option<ArticleId>,
    /// Wall-clock time spent in the session so far.
    pub elapsed: Duration,
    /// Number of per-item errors collected so far.
    pub item_errors: usize,
}

impl SessionSnapshot {
    /// Progress through the session as a percentage in `[0, 100]`.
    pub fn progress_percent(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        (self.processed_items as f64 / self.total_items as f64) * 100.0
    }

    /// Estimated time remaining, extrapolated from throughput so far.
    /// `None` until at least one item has been processed.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        if self.processed_items == 0 || self.total_items <= self.processed_items {
            return None;
        }
        let per_item = self.elapsed.as_secs_f64() / self.processed_items as f64;
        let remaining = (self.total_items - self.processed_items) as f64 * per_item;
        Some(Duration::from_secs_f64(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_predicates() {
        assert!(SyncPhase::Idle.can_start());
        assert!(SyncPhase::Success.can_start());
        assert!(SyncPhase::Error.can_start());
        assert!(!SyncPhase::UploadingChanges.can_start());
        assert!(!SyncPhase::Paused.can_start());

        assert!(SyncPhase::Initializing.is_active());
        assert!(SyncPhase::Finalizing.is_active());
        assert!(!SyncPhase::Paused.is_active());
        assert!(!SyncPhase::Success.is_active());
    }

    #[test]
    fn advance_never_exceeds_total() {
        let mut session = SyncSession::begin();
        session.total_items = 2;
        session.advance(None);
        session.advance(None);
        session.advance(None);
        assert_eq!(session.processed_items, 2);
    }

    #[test]
    fn progress_percent_handles_zero_total() {
        let snapshot = SessionSnapshot {
            id: SessionId::new(),
            phase: SyncPhase::Idle,
            total_items: 0,
            processed_items: 0,
            current_item: None,
            elapsed: Duration::ZERO,
            item_errors: 0,
        };
        assert_eq!(snapshot.progress_percent(), 0.0);
        assert!(snapshot.estimated_remaining().is_none());
    }

    #[test]
    fn estimated_remaining_extrapolates() {
        let snapshot = SessionSnapshot {
            id: SessionId::new(),
            phase: SyncPhase::UploadingChanges,
            total_items: 100,
            processed_items: 50,
            current_item: None,
            elapsed: Duration::from_secs(10),
            item_errors: 0,
        };
        let remaining = snapshot.estimated_remaining().unwrap();
        assert_eq!(remaining, Duration::from_secs(10));
        assert_eq!(snapshot.progress_percent(), 50.0);
    }
}
