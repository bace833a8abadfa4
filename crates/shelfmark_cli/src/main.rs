//! Shelfmark CLI
//!
//! Command-line tools for inspecting and operating on a Shelfmark sync
//! directory.
//!
//! # Commands
//!
//! - `status` - Show checkpoint, cursor, and pending-change state
//! - `conflicts` - List conflicts awaiting manual resolution
//! - `resolve` - Apply a manual decision to one conflict
//! - `stats` - Display cumulative sync statistics
//! - `clear-stats` - Reset statistics, conflicts, and pending changes

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shelfmark sync-directory tools.
#[derive(Parser)]
#[command(name = "shelfmark")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the sync directory
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show checkpoint, cursor, and pending-change state
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List conflicts awaiting manual resolution
    Conflicts,

    /// Apply a manual decision to one conflict
    Resolve {
        /// The conflict id to resolve
        conflict_id: String,

        /// Which version to keep (local, remote)
        #[arg(short, long)]
        keep: String,
    },

    /// Display cumulative sync statistics
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Reset statistics, conflicts, and pending changes
    ClearStats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dir = cli.dir.ok_or("Sync directory required (--dir)")?;

    match cli.command {
        Commands::Status { format } => commands::status::run(&dir, &format)?,
        Commands::Conflicts => commands::conflicts::run(&dir)?,
        Commands::Resolve { conflict_id, keep } => {
            commands::resolve::run(&dir, &conflict_id, &keep)?
        }
        Commands::Stats { format } => commands::stats::run(&dir, &format)?,
        Commands::ClearStats => commands::stats::clear(&dir)?,
    }

    Ok(())
}
