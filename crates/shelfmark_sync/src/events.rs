//! Observer events and connectivity inputs.
//!
//! Observers subscribe to a fan-out feed of [`SyncEvent`]s; events are
//! emitted only after the state they describe has been committed.
//! Connectivity and app-lifecycle notifications flow the other way as
//! explicit [`EngineSignal`]s, decoupled from any platform API so the
//! engine is testable without a device.

use crate::error::ErrorReport;
use crate::session::SyncPhase;
use parking_lot::RwLock;
use shelfmark_core::{ArticleId, Conflict, ConflictId, ResolutionTag};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// An event emitted to sync observers.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The session moved to a new phase.
    PhaseChanged {
        /// Previous phase.
        from: SyncPhase,
        /// New phase.
        to: SyncPhase,
    },
    /// Item progress within the session.
    Progress {
        /// Items processed so far.
        processed: u64,
        /// Known item total.
        total: u64,
        /// The item in flight.
        current: Option<ArticleId>,
    },
    /// A batch settled and its checkpoint was written.
    BatchCompleted {
        /// The phase the batch belonged to.
        phase: SyncPhase,
        /// Batch index within the phase.
        batch_index: u32,
    },
    /// The detector found a divergence.
    ConflictDetected {
        /// The new conflict, both versions included.
        conflict: Conflict,
    },
    /// A conflict was resolved.
    ConflictResolved {
        /// The resolved conflict.
        conflict_id: ConflictId,
        /// Which strategy resolved it.
        resolution: ResolutionTag,
    },
    /// The session aborted; the report is classified for display.
    SessionFailed {
        /// User-facing error report.
        report: ErrorReport,
    },
    /// The session parked.
    Paused {
        /// The phase it will resume into.
        phase: SyncPhase,
    },
    /// The session completed.
    Completed {
        /// Items processed.
        processed: u64,
        /// Conflicts still awaiting manual resolution.
        conflicts_open: u64,
    },
}

/// Fan-out feed distributing [`SyncEvent`]s to subscribers.
///
/// Subscribers that drop their receiver are pruned on the next emit.
#[derive(Debug, Default)]
pub struct EventFeed {
    subscribers: RwLock<Vec<Sender<SyncEvent>>>,
}

impl EventFeed {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to every live subscriber.
    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// External notification fed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    /// The required network condition became available.
    NetworkAvailable,
    /// The network dropped.
    NetworkLost,
    /// The app returned to the foreground.
    AppForegrounded,
    /// The app moved to the background.
    AppBackgrounded,
}

/// Answers whether the network condition required for sync holds.
///
/// Consulted at every suspension point; hosts wire this to their
/// platform's reachability API, tests script it.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true when sync traffic can be attempted.
    fn is_online(&self) -> bool;
}

/// A probe that always reports online. The default for tests and hosts
/// that gate syncing themselves.
#[derive(Debug, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// A probe scripted from tests or a platform event handler.
#[derive(Debug)]
pub struct ScriptedProbe {
    online: AtomicBool,
}

impl ScriptedProbe {
    /// Creates a probe with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Flips the reported state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for ScriptedProbe {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
