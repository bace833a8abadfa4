//! Configuration for sync sessions.

use crate::error::{SyncError, SyncResult};
use crate::resolver::ConflictStrategy;
use std::time::Duration;

/// Options governing one sync session.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Ignore the stored delta cursor and pull the full remote state.
    pub full_sync: bool,
    /// Number of items processed and checkpointed together. Must be > 0.
    pub batch_size: u32,
    /// Strategy applied to detected conflicts.
    pub strategy: ConflictStrategy,
    /// Per-request timeout hint for remote client implementations.
    pub request_timeout: Duration,
    /// Session watchdog: a session running longer than this aborts with
    /// a retryable timeout instead of hanging.
    pub watchdog_timeout: Duration,
}

impl SyncOptions {
    /// Creates options with default batching and timeouts.
    pub fn new() -> Self {
        Self {
            full_sync: false,
            batch_size: 50,
            strategy: ConflictStrategy::LastWriteWins,
            request_timeout: Duration::from_secs(30),
            watchdog_timeout: Duration::from_secs(300),
        }
    }

    /// Requests a full sync instead of a delta sync.
    pub fn with_full_sync(mut self, full: bool) -> Self {
        self.full_sync = full;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the conflict strategy.
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the per-request timeout hint.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the session watchdog timeout.
    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }

    /// Validates the options.
    pub fn validate(&self) -> SyncResult<()> {
        if self.batch_size == 0 {
            return Err(SyncError::InvalidOptions("batch_size must be > 0".into()));
        }
        if self.watchdog_timeout.is_zero() {
            return Err(SyncError::InvalidOptions(
                "watchdog_timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A partial update to [`SyncOptions`], applied between sessions.
#[derive(Debug, Clone, Default)]
pub struct SyncOptionsPatch {
    /// New full-sync flag, if changing.
    pub full_sync: Option<bool>,
    /// New batch size, if changing.
    pub batch_size: Option<u32>,
    /// New conflict strategy, if changing.
    pub strategy: Option<ConflictStrategy>,
    /// New per-request timeout, if changing.
    pub request_timeout: Option<Duration>,
    /// New watchdog timeout, if changing.
    pub watchdog_timeout: Option<Duration>,
}

impl SyncOptionsPatch {
    /// Applies the patch to `options`.
    pub fn apply(&self, options: &mut SyncOptions) {
        if let Some(full) = self.full_sync {
            options.full_sync = full;
        }
        if let Some(size) = self.batch_size {
            options.batch_size = size;
        }
        if let Some(strategy) = self.strategy {
            options.strategy = strategy;
        }
        if let Some(timeout) = self.request_timeout {
            options.request_timeout = timeout;
        }
        if let Some(timeout) = self.watchdog_timeout {
            options.watchdog_timeout = timeout;
        }
    }
}
