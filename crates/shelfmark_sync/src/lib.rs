//! # Shelfmark Sync
//!
//! Offline-first synchronization engine for the Shelfmark read-it-later
//! client.
//!
//! This crate provides:
//! - Phase state machine (idle → initializing → uploading → downloading →
//!   resolving → finalizing → success/error, with pause from any active
//!   phase)
//! - Batched upload of pending local changes and paginated download of
//!   remote deltas
//! - Conflict detection and resolution (last-write-wins, prefer-local,
//!   prefer-remote, manual)
//! - Durable per-batch checkpoints enabling resume after network loss,
//!   app backgrounding, or process death
//! - Cumulative statistics and an observer event feed
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** model: local pending
//! changes drain first so the delta download sees the server's view of
//! them, then remote changes flow through the conflict detector before
//! touching the local mirror.
//!
//! ## Key invariants
//!
//! - At most one session is active per account at a time
//! - A checkpoint is written only after its batch has fully settled
//! - Resume never reprocesses a confirmed item and never skips an
//!   unconfirmed one
//! - At most one active conflict per article
//! - A pending change is removed only on remote confirmation

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod config;
mod detector;
mod error;
mod events;
mod orchestrator;
mod remote;
mod resolver;
mod session;
mod state_store;
mod stats;

pub use checkpoint::{ItemError, ResumePoint, SyncCheckpoint};
pub use config::{SyncOptions, SyncOptionsPatch};
pub use detector::{detect, Detection};
pub use error::{ErrorReport, RemoteError, SuggestedAction, SyncError, SyncResult};
pub use events::{
    AlwaysOnline, ConnectivityProbe, EngineSignal, EventFeed, ScriptedProbe, SyncEvent,
};
pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use remote::{ChangePage, DeltaCursor, MockRemote, RemoteArticle, RemoteCall, RemoteClient};
pub use resolver::{resolve, ConflictStrategy, ResolutionChoice, ResolutionOutcome};
pub use session::{SessionId, SessionSnapshot, SyncPhase, SyncSession};
pub use state_store::{FileStateStore, MemoryStateStore, SyncStateStore};
pub use stats::SyncStats;
