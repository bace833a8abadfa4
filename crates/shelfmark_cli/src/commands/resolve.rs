//! Resolve command implementation.

use super::OfflineRemote;
use shelfmark_core::ConflictId;
use shelfmark_sync::{FileStateStore, ResolutionChoice, SyncOrchestrator};
use std::path::Path;
use std::sync::Arc;

/// Runs the resolve command: applies a manual decision to one conflict
/// through the engine, so store updates, pending-change bookkeeping, and
/// stats all follow the normal resolution path.
pub fn run(dir: &Path, conflict_id: &str, keep: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conflict_id =
        ConflictId::parse(conflict_id).map_err(|e| format!("invalid conflict id: {e}"))?;
    let choice = match keep {
        "local" => ResolutionChoice::UseLocal,
        "remote" => ResolutionChoice::UseRemote,
        other => return Err(format!("--keep must be 'local' or 'remote', got {other:?}").into()),
    };

    let state = Arc::new(FileStateStore::open(dir)?);
    let mirror = Arc::new(super::open_mirror(dir)?);
    let engine = SyncOrchestrator::new(Arc::new(OfflineRemote), mirror, state)?;

    engine.resolve_conflict(conflict_id, choice)?;
    engine.shutdown()?;

    println!("Resolved {conflict_id} keeping the {keep} version.");
    Ok(())
}
