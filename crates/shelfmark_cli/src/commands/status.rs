//! Status command implementation.

use serde::Serialize;
use shelfmark_core::ArticleStore;
use shelfmark_sync::{FileStateStore, SyncStateStore};
use std::path::Path;

/// Sync-directory status.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Sync directory path.
    pub dir: String,
    /// Whether a resumable checkpoint is present.
    pub has_checkpoint: bool,
    /// The phase a resume would re-enter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_point: Option<String>,
    /// Checkpoint progress, as `processed/total`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_progress: Option<String>,
    /// The delta cursor of the last successful sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Pending local changes awaiting upload.
    pub pending_changes: usize,
    /// Conflicts awaiting resolution.
    pub active_conflicts: usize,
    /// Completion instant of the last successful sync, epoch millis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_ms: Option<u64>,
}

/// Runs the status command.
pub fn run(dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = FileStateStore::open(dir)?;
    let mirror = super::open_mirror(dir)?;

    let checkpoint = state.load_checkpoint()?;
    let stats = state.load_stats()?;

    let result = StatusResult {
        dir: dir.display().to_string(),
        has_checkpoint: checkpoint.is_some(),
        resume_point: checkpoint.as_ref().map(|cp| cp.resume_point.to_string()),
        checkpoint_progress: checkpoint
            .as_ref()
            .map(|cp| format!("{}/{}", cp.processed, cp.total)),
        cursor: state.load_cursor()?.map(|c| c.as_str().to_string()),
        pending_changes: mirror.pending_changes()?.len(),
        active_conflicts: state.load_conflicts()?.len(),
        last_sync_ms: stats.last_sync_time.map(|t| t.as_millis()),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("Sync directory: {}", result.dir);
            println!("Pending changes: {}", result.pending_changes);
            println!("Active conflicts: {}", result.active_conflicts);
            match (&result.resume_point, &result.checkpoint_progress) {
                (Some(point), Some(progress)) => {
                    println!("Checkpoint: {point} at {progress}");
                }
                _ => println!("Checkpoint: none"),
            }
            match &result.cursor {
                Some(cursor) => println!("Cursor: {cursor}"),
                None => println!("Cursor: none (never synced)"),
            }
            match result.last_sync_ms {
                Some(ms) => println!("Last successful sync: {ms}ms since epoch"),
                None => println!("Last successful sync: never"),
            }
        }
    }

    Ok(())
}
