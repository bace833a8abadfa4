//! Persistence for engine state: checkpoint, cursor, stats, conflicts.

use crate::checkpoint::SyncCheckpoint;
use crate::remote::DeltaCursor;
use crate::stats::SyncStats;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shelfmark_core::{Conflict, StoreError, StoreResult};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Durable storage for the engine's own state.
///
/// Four independent records: the session checkpoint, the delta cursor of
/// the last successful sync, the stats singleton, and the active
/// conflicts table. Only the orchestrator mutates them.
pub trait SyncStateStore: Send + Sync {
    /// Loads the persisted checkpoint, if any.
    fn load_checkpoint(&self) -> StoreResult<Option<SyncCheckpoint>>;

    /// Persists the checkpoint, replacing any previous one.
    fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> StoreResult<()>;

    /// Removes the checkpoint.
    fn clear_checkpoint(&self) -> StoreResult<()>;

    /// Loads the delta cursor of the last successful sync.
    fn load_cursor(&self) -> StoreResult<Option<DeltaCursor>>;

    /// Persists the delta cursor.
    fn save_cursor(&self, cursor: &DeltaCursor) -> StoreResult<()>;

    /// Loads the stats singleton (zeroed when never written).
    fn load_stats(&self) -> StoreResult<SyncStats>;

    /// Persists the stats singleton.
    fn save_stats(&self, stats: &SyncStats) -> StoreResult<()>;

    /// Loads the active conflicts table.
    fn load_conflicts(&self) -> StoreResult<Vec<Conflict>>;

    /// Persists the active conflicts table, replacing the previous set.
    fn save_conflicts(&self, conflicts: &[Conflict]) -> StoreResult<()>;
}

/// In-memory [`SyncStateStore`] for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    checkpoint: RwLock<Option<SyncCheckpoint>>,
    cursor: RwLock<Option<DeltaCursor>>,
    stats: RwLock<SyncStats>,
    conflicts: RwLock<Vec<Conflict>>,
}

impl MemoryStateStore {
    /// Creates an empty state store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncStateStore for MemoryStateStore {
    fn load_checkpoint(&self) -> StoreResult<Option<SyncCheckpoint>> {
        Ok(self.checkpoint.read().clone())
    }

    fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> StoreResult<()> {
        *self.checkpoint.write() = Some(checkpoint.clone());
        Ok(())
    }

    fn clear_checkpoint(&self) -> StoreResult<()> {
        *self.checkpoint.write() = None;
        Ok(())
    }

    fn load_cursor(&self) -> StoreResult<Option<DeltaCursor>> {
        Ok(self.cursor.read().clone())
    }

    fn save_cursor(&self, cursor: &DeltaCursor) -> StoreResult<()> {
        *self.cursor.write() = Some(cursor.clone());
        Ok(())
    }

    fn load_stats(&self) -> StoreResult<SyncStats> {
        Ok(self.stats.read().clone())
    }

    fn save_stats(&self, stats: &SyncStats) -> StoreResult<()> {
        *self.stats.write() = stats.clone();
        Ok(())
    }

    fn load_conflicts(&self) -> StoreResult<Vec<Conflict>> {
        Ok(self.conflicts.read().clone())
    }

    fn save_conflicts(&self, conflicts: &[Conflict]) -> StoreResult<()> {
        *self.conflicts.write() = conflicts.to_vec();
        Ok(())
    }
}

/// File-backed [`SyncStateStore`].
///
/// Each record lives in its own CBOR file inside a sync directory;
/// every write goes to a temporary file and is renamed into place, so a
/// crash mid-write never leaves a torn record. An advisory lock on
/// `sync.lock` keeps a second process out of the directory; the lock is
/// held until the store is dropped.
#[derive(Debug)]
pub struct FileStateStore {
    dir: PathBuf,
    // Held for the advisory lock; never read or written.
    _lock: File,
}

impl FileStateStore {
    const CHECKPOINT: &'static str = "checkpoint.cbor";
    const CURSOR: &'static str = "cursor.cbor";
    const STATS: &'static str = "stats.cbor";
    const CONFLICTS: &'static str = "conflicts.cbor";

    /// Opens or creates a state store in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the
    /// directory.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join("sync.lock"))?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(dir.to_path_buf()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
        })
    }

    /// Returns the sync directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_record<T: DeserializeOwned>(&self, name: &str) -> StoreResult<Option<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path)?;
        let value =
            ciborium::from_reader(file).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(value))
    }

    fn write_record<T: Serialize>(&self, name: &str, value: &T) -> StoreResult<()> {
        let path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));
        let tmp = File::create(&tmp_path)?;
        ciborium::into_writer(value, &tmp).map_err(|e| StoreError::Encode(e.to_string()))?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove_record(&self, name: &str) -> StoreResult<()> {
        let path = self.dir.join(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl SyncStateStore for FileStateStore {
    fn load_checkpoint(&self) -> StoreResult<Option<SyncCheckpoint>> {
        self.read_record(Self::CHECKPOINT)
    }

    fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> StoreResult<()> {
        self.write_record(Self::CHECKPOINT, checkpoint)
    }

    fn clear_checkpoint(&self) -> StoreResult<()> {
        self.remove_record(Self::CHECKPOINT)
    }

    fn load_cursor(&self) -> StoreResult<Option<DeltaCursor>> {
        self.read_record(Self::CURSOR)
    }

    fn save_cursor(&self, cursor: &DeltaCursor) -> StoreResult<()> {
        self.write_record(Self::CURSOR, cursor)
    }

    fn load_stats(&self) -> StoreResult<SyncStats> {
        Ok(self.read_record(Self::STATS)?.unwrap_or_default())
    }

    fn save_stats(&self, stats: &SyncStats) -> StoreResult<()> {
        self.write_record(Self::STATS, stats)
    }

    fn load_conflicts(&self) -> StoreResult<Vec<Conflict>> {
        Ok(self.read_record(Self::CONFLICTS)?.unwrap_or_default())
    }

    fn save_conflicts(&self, conflicts: &[Conflict]) -> StoreResult<()> {
        self.write_record(Self::CONFLICTS, &conflicts.to_vec())
    }
}
