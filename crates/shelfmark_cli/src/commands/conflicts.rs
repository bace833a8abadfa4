//! Conflicts command implementation.

use shelfmark_sync::{FileStateStore, SyncStateStore};
use std::path::Path;

/// Runs the conflicts command.
pub fn run(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let state = FileStateStore::open(dir)?;
    let conflicts = state.load_conflicts()?;

    if conflicts.is_empty() {
        println!("No active conflicts.");
        return Ok(());
    }

    println!("{} active conflict(s):", conflicts.len());
    for conflict in conflicts {
        println!();
        println!("  {} ({})", conflict.id, conflict.kind);
        println!("    article: {}", conflict.article_id);
        match &conflict.local {
            Some(local) => println!(
                "    local:  {:?} (updated {})",
                local.title, local.updated_at
            ),
            None => println!("    local:  deleted"),
        }
        match &conflict.remote {
            Some(remote) => println!(
                "    remote: {:?} (updated {})",
                remote.title, remote.updated_at
            ),
            None => println!("    remote: deleted"),
        }
        println!("    detected at {}", conflict.created_at);
    }
    println!();
    println!("Resolve with: shelfmark resolve <conflict-id> --keep <local|remote>");

    Ok(())
}
