//! Stats and clear-stats command implementations.

use super::OfflineRemote;
use shelfmark_sync::{FileStateStore, SyncOrchestrator, SyncStateStore};
use std::path::Path;
use std::sync::Arc;

/// Runs the stats command.
pub fn run(dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = FileStateStore::open(dir)?;
    let stats = state.load_stats()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => {
            println!("Sessions: {} total, {} successful, {} failed",
                stats.total_syncs, stats.successful_syncs, stats.failed_syncs);
            println!(
                "Durations: last {}ms, average {:.0}ms",
                stats.last_sync_duration_ms, stats.average_sync_duration_ms
            );
            println!(
                "Articles: {} created, {} updated, {} deleted",
                stats.articles_created, stats.articles_updated, stats.articles_deleted
            );
            println!("Conflicts resolved: {}", stats.conflicts_resolved);
            println!(
                "Transfer: {} bytes up, {} bytes down, {} requests, {} cache hits",
                stats.bytes_uploaded, stats.bytes_downloaded, stats.requests, stats.cache_hits
            );
        }
    }

    Ok(())
}

/// Runs the clear-stats command: the explicit user-initiated clear, which
/// also removes the account's conflicts and pending changes.
pub fn clear(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(FileStateStore::open(dir)?);
    let mirror = Arc::new(super::open_mirror(dir)?);
    let engine = SyncOrchestrator::new(Arc::new(OfflineRemote), mirror, state)?;

    engine.clear_stats()?;

    println!("Statistics, conflicts, and pending changes cleared.");
    Ok(())
}
