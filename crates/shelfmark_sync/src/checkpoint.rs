//! Durable checkpoints for resumable sessions.

use crate::remote::DeltaCursor;
use serde::{Deserialize, Serialize};
use shelfmark_core::{ArticleId, MutationKind, Timestamp};

/// The phases a checkpoint may legally resume into.
///
/// This is the whole contract: a stored checkpoint either names one of
/// these variants or it does not decode at all. There is no fallback for
/// unrecognized phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumePoint {
    /// Mid-upload: pending changes remain to drain.
    UploadingChanges,
    /// Mid-download: remote pages remain to pull from `cursor`.
    DownloadingUpdates,
    /// Conflicts detected but not yet run through the resolver.
    ResolvingConflicts,
}

impl ResumePoint {
    /// The session phase this resume point re-enters.
    pub fn phase(&self) -> crate::session::SyncPhase {
        match self {
            ResumePoint::UploadingChanges => crate::session::SyncPhase::UploadingChanges,
            ResumePoint::DownloadingUpdates => crate::session::SyncPhase::DownloadingUpdates,
            ResumePoint::ResolvingConflicts => crate::session::SyncPhase::ResolvingConflicts,
        }
    }
}

impl std::fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResumePoint::UploadingChanges => "uploading-changes",
            ResumePoint::DownloadingUpdates => "downloading-updates",
            ResumePoint::ResolvingConflicts => "resolving-conflicts",
        };
        f.write_str(s)
    }
}

/// A per-item failure carried across an interruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    /// The affected article.
    pub article_id: ArticleId,
    /// The mutation that failed, for upload-phase errors.
    pub kind: Option<MutationKind>,
    /// Failure detail.
    pub message: String,
    /// Whether the next session can retry the item.
    pub retryable: bool,
}

/// Durable snapshot of mid-phase progress enabling resume.
///
/// Written only after a batch has fully settled (no network call from
/// that batch still outstanding), consumed exactly once on resume, and
/// cleared when the session finalizes. The cut it records is consistent:
/// confirmed uploads have already removed their pending change, and
/// `cursor` points past every fully applied download page, so a resume
/// neither reprocesses a confirmed item nor skips an unconfirmed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    /// The phase to re-enter.
    pub resume_point: ResumePoint,
    /// Items processed when the checkpoint was written.
    pub processed: u64,
    /// Known item total when the checkpoint was written.
    pub total: u64,
    /// Index of the next batch within the phase.
    pub batch_index: u32,
    /// Download progress: the cursor of the next page to fetch.
    pub cursor: Option<DeltaCursor>,
    /// Per-item errors collected before the interruption.
    pub pending_errors: Vec<ItemError>,
    /// Number of conflicts active at the interruption.
    pub active_conflicts: u64,
    /// When the checkpoint was written.
    pub interrupted_at: Timestamp,
}

impl SyncCheckpoint {
    /// Creates a checkpoint for the given resume point.
    pub fn new(resume_point: ResumePoint, processed: u64, total: u64, batch_index: u32) -> Self {
        Self {
            resume_point,
            processed,
            total,
            batch_index,
            cursor: None,
            pending_errors: Vec::new(),
            active_conflicts: 0,
            interrupted_at: Timestamp::now(),
        }
    }

    /// Sets the download cursor.
    pub fn with_cursor(mut self, cursor: Option<DeltaCursor>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Attaches collected per-item errors.
    pub fn with_errors(mut self, errors: Vec<ItemError>) -> Self {
        self.pending_errors = errors;
        self
    }

    /// Records the active conflict count.
    pub fn with_active_conflicts(mut self, count: u64) -> Self {
        self.active_conflicts = count;
        self
    }

    /// Checks internal consistency.
    ///
    /// A checkpoint that fails validation must be discarded; the session
    /// then requires a fresh start.
    pub fn validate(&self) -> Result<(), String> {
        if self.processed > self.total {
            return Err(format!(
                "processed count {} exceeds total {}",
                self.processed, self.total
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_checkpoint_passes() {
        let cp = SyncCheckpoint::new(ResumePoint::UploadingChanges, 20, 50, 1);
        assert!(cp.validate().is_ok());
    }

    #[test]
    fn inconsistent_counts_rejected() {
        let cp = SyncCheckpoint::new(ResumePoint::DownloadingUpdates, 51, 50, 2);
        assert!(cp.validate().is_err());
    }

    #[test]
    fn unrecognized_resume_point_fails_decode() {
        // A checkpoint naming a phase outside the enum must not decode.
        let json = r#"{
            "resume_point": "Connecting",
            "processed": 0,
            "total": 0,
            "batch_index": 0,
            "cursor": null,
            "pending_errors": [],
            "active_conflicts": 0,
            "interrupted_at": 0
        }"#;
        assert!(serde_json::from_str::<SyncCheckpoint>(json).is_err());
    }

    #[test]
    fn cbor_roundtrip() {
        let cp = SyncCheckpoint::new(ResumePoint::DownloadingUpdates, 10, 40, 3)
            .with_cursor(Some(DeltaCursor::new("page-7")))
            .with_active_conflicts(2)
            .with_errors(vec![ItemError {
                article_id: ArticleId::new(),
                kind: Some(MutationKind::Update),
                message: "timeout".into(),
                retryable: true,
            }]);

        let mut buf = Vec::new();
        ciborium::into_writer(&cp, &mut buf).unwrap();
        let back: SyncCheckpoint = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(back, cp);
    }
}
