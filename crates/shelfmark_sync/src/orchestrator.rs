//! The sync orchestrator: phase state machine and session driver.
//!
//! One orchestrator owns the whole sync lifecycle for an account. A
//! session runs the phases in order (initializing, uploading changes,
//! downloading updates, resolving conflicts, finalizing), checkpointing
//! at every batch boundary so an interruption at any suspension point
//! resumes without reprocessing confirmed work or skipping unconfirmed
//! work.
//!
//! The orchestrator is an explicitly constructed, dependency-injected
//! instance: collaborators arrive as `Arc`s, state is loaded in
//! [`SyncOrchestrator::new`], and [`SyncOrchestrator::shutdown`] flushes
//! it back. Nothing here is a process-wide global.

use crate::checkpoint::{ItemError, ResumePoint, SyncCheckpoint};
use crate::config::{SyncOptions, SyncOptionsPatch};
use crate::detector::{detect, Detection};
use crate::error::{ErrorReport, RemoteError, SyncError, SyncResult};
use crate::events::{AlwaysOnline, ConnectivityProbe, EngineSignal, EventFeed, SyncEvent};
use crate::remote::{DeltaCursor, RemoteClient};
use crate::resolver::{resolve, ResolutionChoice, ResolutionOutcome};
use crate::session::{SessionSnapshot, SyncPhase, SyncSession};
use crate::state_store::SyncStateStore;
use crate::stats::SyncStats;
use parking_lot::RwLock;
use shelfmark_core::{
    ArticleId, ArticleStore, Conflict, ConflictId, ConflictKind, MutationKind, PendingChange,
    ResolutionTag, StoreError, Timestamp,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a driven session ended, short of an unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The session reached `Success`.
    Completed,
    /// The session parked with a persisted checkpoint.
    Paused,
    /// The session was cancelled back to `Idle`.
    Cancelled,
}

/// Interrupt decision at a suspension point.
enum Flow {
    Continue,
    Pause,
    Cancel,
}

/// Exit state of one phase loop.
enum PhaseExit {
    Done,
    Paused,
    Cancelled,
}

/// Per-item upload failure vs. session-fatal error.
enum UploadFailure {
    Item(ItemError),
    Fatal(SyncError),
}

/// Drives sync sessions for one account.
///
/// At most one session is active at a time; `start` fails fast with
/// [`SyncError::AlreadyRunning`] rather than interleaving. All stores are
/// mutated only from the driving thread; observers read snapshots and the
/// event feed.
pub struct SyncOrchestrator<R: RemoteClient, A: ArticleStore, S: SyncStateStore> {
    remote: Arc<R>,
    store: Arc<A>,
    state: Arc<S>,
    probe: Arc<dyn ConnectivityProbe>,
    options: RwLock<SyncOptions>,
    session: RwLock<SyncSession>,
    stats: RwLock<SyncStats>,
    conflicts: RwLock<HashMap<ArticleId, Conflict>>,
    item_errors: RwLock<Vec<ItemError>>,
    events: EventFeed,
    cancel_requested: AtomicBool,
    pause_requested: AtomicBool,
}

impl<R: RemoteClient, A: ArticleStore, S: SyncStateStore> SyncOrchestrator<R, A, S> {
    /// Creates an orchestrator, loading persisted stats and conflicts.
    pub fn new(remote: Arc<R>, store: Arc<A>, state: Arc<S>) -> SyncResult<Self> {
        let stats = state.load_stats()?;
        let conflicts = state
            .load_conflicts()?
            .into_iter()
            .map(|c| (c.article_id, c))
            .collect();

        Ok(Self {
            remote,
            store,
            state,
            probe: Arc::new(AlwaysOnline),
            options: RwLock::new(SyncOptions::default()),
            session: RwLock::new(SyncSession::idle()),
            stats: RwLock::new(stats),
            conflicts: RwLock::new(conflicts),
            item_errors: RwLock::new(Vec::new()),
            events: EventFeed::new(),
            cancel_requested: AtomicBool::new(false),
            pause_requested: AtomicBool::new(false),
        })
    }

    /// Replaces the connectivity probe.
    pub fn with_connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Flushes stats and conflicts to the state store.
    pub fn shutdown(&self) -> SyncResult<()> {
        self.persist_stats()?;
        self.persist_conflicts()
    }

    /// The remote client.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// The local article store.
    pub fn store(&self) -> &Arc<A> {
        &self.store
    }

    /// The engine state store.
    pub fn state_store(&self) -> &Arc<S> {
        &self.state
    }

    // === Read surface ===

    /// A read-only snapshot of the current session.
    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.read();
        let elapsed = if session.phase == SyncPhase::Idle {
            std::time::Duration::ZERO
        } else {
            session
                .completed_at
                .unwrap_or_else(Timestamp::now)
                .since(session.started_at)
        };
        SessionSnapshot {
            id: session.id,
            phase: session.phase,
            total_items: session.total_items,
            processed_items: session.processed_items,
            current_item: session.current_item,
            elapsed,
            item_errors: self.item_errors.read().len(),
        }
    }

    /// The current phase.
    pub fn phase(&self) -> SyncPhase {
        self.session.read().phase
    }

    /// A snapshot of the cumulative stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The active conflicts, both versions included.
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut conflicts: Vec<_> = self.conflicts.read().values().cloned().collect();
        conflicts.sort_by_key(|c| c.created_at);
        conflicts
    }

    /// Per-item errors collected by the current or last session.
    pub fn item_errors(&self) -> Vec<ItemError> {
        self.item_errors.read().clone()
    }

    /// Subscribes to the event feed.
    pub fn subscribe(&self) -> std::sync::mpsc::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    // === Control surface ===

    /// Starts a fresh session and drives it to a terminal state, a pause,
    /// or a cancellation, on the caller's thread.
    ///
    /// Valid only from `Idle`, `Success`, or `Error`.
    pub fn start(&self, options: SyncOptions) -> SyncResult<SyncOutcome> {
        options.validate()?;
        if !self.probe.is_online() {
            return Err(SyncError::Offline);
        }

        {
            let mut session = self.session.write();
            if !session.phase.can_start() {
                return Err(SyncError::AlreadyRunning);
            }
            let mut fresh = SyncSession::begin();
            // Enter via Idle so the phase-change event sequence is uniform.
            fresh.phase = SyncPhase::Idle;
            *session = fresh;
        }

        *self.options.write() = options;
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.pause_requested.store(false, Ordering::SeqCst);
        self.item_errors.write().clear();

        self.stats.write().record_session_start();
        self.persist_stats()?;

        info!(session = %self.session.read().id, "starting sync session");
        self.set_phase(SyncPhase::Initializing);
        let result = self.drive(None);
        self.conclude(result)
    }

    /// Resumes from the persisted checkpoint, re-entering the recorded
    /// phase at the recorded position.
    ///
    /// Valid only when a checkpoint exists and no session is active.
    /// An unusable checkpoint yields [`SyncError::InvalidCheckpoint`]; the
    /// safe recovery is [`SyncOrchestrator::discard_checkpoint`] followed
    /// by a fresh [`SyncOrchestrator::start`].
    pub fn resume(&self) -> SyncResult<SyncOutcome> {
        if self.session.read().phase.is_active() {
            return Err(SyncError::AlreadyRunning);
        }

        let checkpoint = match self.state.load_checkpoint() {
            Ok(Some(cp)) => cp,
            Ok(None) => return Err(SyncError::NoCheckpoint),
            Err(StoreError::Decode(msg)) => return Err(SyncError::InvalidCheckpoint(msg)),
            Err(e) => return Err(e.into()),
        };
        checkpoint
            .validate()
            .map_err(SyncError::InvalidCheckpoint)?;

        // Re-validate the network condition before continuing.
        if !self.probe.is_online() {
            return Err(SyncError::Offline);
        }

        self.cancel_requested.store(false, Ordering::SeqCst);
        self.pause_requested.store(false, Ordering::SeqCst);
        *self.item_errors.write() = checkpoint.pending_errors.clone();

        // A resume is a new attempt: counting it keeps
        // `total_syncs >= successful + failed` when a failed session is
        // later resumed to completion.
        self.stats.write().record_session_start();
        self.persist_stats()?;

        {
            let mut session = self.session.write();
            if session.phase != SyncPhase::Paused {
                // Resuming after process death: rebuild the session shell.
                *session = SyncSession::begin();
            }
            session.total_items = checkpoint.total;
            session.processed_items = checkpoint.processed;
            session.completed_at = None;
        }

        info!(
            resume_point = %checkpoint.resume_point,
            processed = checkpoint.processed,
            total = checkpoint.total,
            "resuming sync session from checkpoint"
        );
        self.set_phase(checkpoint.resume_point.phase());
        let result = self.drive(Some(checkpoint));
        self.conclude(result)
    }

    /// The external trigger entry point: resumes when a valid checkpoint
    /// exists, starts fresh otherwise. A corrupt checkpoint is discarded.
    pub fn start_or_resume(&self, options: SyncOptions) -> SyncResult<SyncOutcome> {
        match self.state.load_checkpoint() {
            Ok(Some(cp)) if cp.validate().is_ok() => self.resume(),
            Ok(Some(_)) | Err(StoreError::Decode(_)) => {
                warn!("discarding unusable checkpoint, starting fresh");
                self.state.clear_checkpoint()?;
                self.start(options)
            }
            Ok(None) => self.start(options),
            Err(e) => Err(e.into()),
        }
    }

    /// Requests a pause. Honored at the next suspension point; the
    /// checkpoint is persisted before the session parks.
    pub fn pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    /// Cancels the session back to `Idle`, discarding the in-progress
    /// checkpoint. Confirmed writes and recorded conflicts remain.
    pub fn cancel(&self) -> SyncResult<()> {
        let phase = self.session.read().phase;
        if phase.is_active() {
            self.cancel_requested.store(true, Ordering::SeqCst);
            return Ok(());
        }
        if phase == SyncPhase::Paused {
            self.state.clear_checkpoint()?;
            self.with_session(|s| {
                s.completed_at = Some(Timestamp::now());
                s.current_item = None;
            });
            self.set_phase(SyncPhase::Idle);
        }
        Ok(())
    }

    /// Feeds a connectivity or app-lifecycle notification to the engine.
    ///
    /// Loss signals request a pause. Availability signals resume a paused
    /// session on the caller's thread and return its outcome.
    pub fn on_signal(&self, signal: EngineSignal) -> SyncResult<Option<SyncOutcome>> {
        match signal {
            EngineSignal::NetworkLost | EngineSignal::AppBackgrounded => {
                self.pause();
                Ok(None)
            }
            EngineSignal::NetworkAvailable | EngineSignal::AppForegrounded => {
                if self.session.read().phase == SyncPhase::Paused {
                    self.resume().map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Applies a human decision to a manual-strategy conflict.
    pub fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        choice: ResolutionChoice,
    ) -> SyncResult<()> {
        let conflict = self
            .conflicts
            .read()
            .values()
            .find(|c| c.id == conflict_id)
            .cloned()
            .ok_or(SyncError::UnknownConflict(conflict_id))?;

        self.apply_resolution(&conflict, choice, ResolutionTag::Manual)
    }

    /// Applies a partial options update. Rejected while a session is
    /// active.
    pub fn update_options(&self, patch: SyncOptionsPatch) -> SyncResult<()> {
        let phase = self.session.read().phase;
        if phase.is_active() {
            return Err(SyncError::InvalidState {
                phase: phase.to_string(),
                operation: "update options".into(),
            });
        }

        let mut updated = self.options.read().clone();
        patch.apply(&mut updated);
        updated.validate()?;
        *self.options.write() = updated;
        Ok(())
    }

    /// Explicit user-initiated clear: zeroes the stats and removes the
    /// account's conflicts and pending changes. Rejected unless the
    /// engine is in a startable state.
    pub fn clear_stats(&self) -> SyncResult<()> {
        if !self.session.read().phase.can_start() {
            return Err(SyncError::ClearWhileActive);
        }

        *self.stats.write() = SyncStats::new();
        self.persist_stats()?;
        self.conflicts.write().clear();
        self.persist_conflicts()?;
        self.store.clear_pending()?;
        Ok(())
    }

    /// Discards the persisted checkpoint after an
    /// [`SyncError::InvalidCheckpoint`].
    pub fn discard_checkpoint(&self) -> SyncResult<()> {
        Ok(self.state.clear_checkpoint()?)
    }

    // === Phase driver ===

    fn drive(&self, checkpoint: Option<SyncCheckpoint>) -> SyncResult<SyncOutcome> {
        let options = self.options.read().clone();
        let deadline = Instant::now() + options.watchdog_timeout;

        let resume_point = match &checkpoint {
            None => {
                self.run_initializing()?;
                self.set_phase(SyncPhase::UploadingChanges);
                ResumePoint::UploadingChanges
            }
            Some(cp) => cp.resume_point,
        };

        if resume_point == ResumePoint::UploadingChanges {
            let start_batch = checkpoint.as_ref().map_or(0, |cp| cp.batch_index);
            match self.run_upload(&options, deadline, start_batch)? {
                PhaseExit::Done => {}
                PhaseExit::Paused => return self.park(SyncPhase::UploadingChanges),
                PhaseExit::Cancelled => return self.abort_cancelled(),
            }
        }

        // The download cursor travels with the checkpoint once the
        // download phase has started; before that it comes from the last
        // successful sync (or nowhere, for a full sync).
        let cursor = match resume_point {
            ResumePoint::DownloadingUpdates | ResumePoint::ResolvingConflicts => {
                checkpoint.as_ref().and_then(|cp| cp.cursor.clone())
            }
            ResumePoint::UploadingChanges => {
                if options.full_sync {
                    None
                } else {
                    self.state.load_cursor()?
                }
            }
        };

        let final_cursor = if resume_point != ResumePoint::ResolvingConflicts {
            let start_batch = if resume_point == ResumePoint::DownloadingUpdates {
                checkpoint.as_ref().map_or(0, |cp| cp.batch_index)
            } else {
                0
            };
            self.set_phase(SyncPhase::DownloadingUpdates);
            let (exit, cursor) = self.run_download(&options, deadline, cursor, start_batch)?;
            match exit {
                PhaseExit::Done => cursor,
                PhaseExit::Paused => return self.park(SyncPhase::DownloadingUpdates),
                PhaseExit::Cancelled => return self.abort_cancelled(),
            }
        } else {
            cursor
        };

        self.set_phase(SyncPhase::ResolvingConflicts);
        self.run_resolve(&options, final_cursor.clone())?;

        self.set_phase(SyncPhase::Finalizing);
        self.run_finalize(final_cursor)?;
        Ok(SyncOutcome::Completed)
    }

    fn run_initializing(&self) -> SyncResult<()> {
        // A fresh session supersedes whatever checkpoint was left behind.
        self.state.clear_checkpoint()?;

        let pending = self.store.pending_changes()?;
        let total = pending.len() as u64;
        self.with_session(|s| {
            s.total_items = total;
            s.processed_items = 0;
        });
        debug!(pending = total, "initialized sync session");
        self.emit_progress();
        Ok(())
    }

    fn run_upload(
        &self,
        options: &SyncOptions,
        deadline: Instant,
        start_batch: u32,
    ) -> SyncResult<PhaseExit> {
        let mut batch_index = start_batch;
        // Items that already failed this session stay pending for the
        // next session; skip them so the drain loop terminates.
        let mut failed: HashSet<(ArticleId, MutationKind)> = self
            .item_errors
            .read()
            .iter()
            .filter_map(|e| e.kind.map(|k| (e.article_id, k)))
            .collect();

        loop {
            match self.check_interrupt(deadline, true)? {
                Flow::Cancel => return Ok(PhaseExit::Cancelled),
                Flow::Pause => {
                    self.save_checkpoint(ResumePoint::UploadingChanges, batch_index, None)?;
                    return Ok(PhaseExit::Paused);
                }
                Flow::Continue => {}
            }

            let batch: Vec<PendingChange> = self
                .store
                .pending_changes()?
                .into_iter()
                .filter(|p| !failed.contains(&p.key()))
                .take(options.batch_size as usize)
                .collect();
            if batch.is_empty() {
                break;
            }
            debug!(batch_index, size = batch.len(), "uploading batch");

            for change in &batch {
                if let Flow::Cancel = self.check_interrupt(deadline, false)? {
                    return Ok(PhaseExit::Cancelled);
                }

                self.with_session(|s| s.current_item = Some(change.article_id));
                match self.upload_one(change) {
                    Ok(()) => {}
                    Err(UploadFailure::Item(item_error)) => {
                        warn!(
                            article = %item_error.article_id,
                            kind = %change.kind,
                            error = %item_error.message,
                            "upload item failed, retained for next session"
                        );
                        failed.insert(change.key());
                        self.item_errors.write().push(item_error);
                    }
                    Err(UploadFailure::Fatal(e)) => return Err(e),
                }
                self.advance_progress(Some(change.article_id));
            }

            // The batch has fully settled; only now is the cut consistent.
            self.save_checkpoint(ResumePoint::UploadingChanges, batch_index, None)?;
            self.events.emit(SyncEvent::BatchCompleted {
                phase: SyncPhase::UploadingChanges,
                batch_index,
            });
            batch_index += 1;
        }

        Ok(PhaseExit::Done)
    }

    fn upload_one(&self, change: &PendingChange) -> Result<(), UploadFailure> {
        let id = change.article_id;
        let record = self
            .store
            .article(id)
            .map_err(|e| UploadFailure::Fatal(e.into()))?;

        match change.kind {
            MutationKind::Create | MutationKind::Update => {
                let record = match record {
                    Some(record) => record,
                    None => {
                        // Orphan pending entry: nothing left to upload.
                        self.remove_confirmed(id, change.kind)?;
                        return Err(UploadFailure::Item(ItemError {
                            article_id: id,
                            kind: Some(change.kind),
                            message: "article missing locally, pending entry dropped".into(),
                            retryable: false,
                        }));
                    }
                };

                self.stats.write().record_request();
                let result = if change.kind == MutationKind::Create {
                    self.remote.create_article(&record)
                } else {
                    self.remote.update_article(id, &record)
                };

                match result {
                    Ok(_) => {
                        self.remove_confirmed(id, change.kind)?;
                        self.mark_record_synced(id)?;
                        let mut stats = self.stats.write();
                        stats.record_uploaded(record.approximate_size());
                        if change.kind == MutationKind::Create {
                            stats.record_created();
                        } else {
                            stats.record_updated();
                        }
                        Ok(())
                    }
                    Err(RemoteError::NotFound(_)) if change.kind == MutationKind::Update => {
                        // The remote deleted it; the download phase will
                        // surface the divergence as a conflict.
                        self.remove_confirmed(id, change.kind)?;
                        Err(UploadFailure::Item(ItemError {
                            article_id: id,
                            kind: Some(change.kind),
                            message: "article deleted remotely, update superseded".into(),
                            retryable: false,
                        }))
                    }
                    Err(e) => Err(self.classify_upload_error(e, id, change.kind)),
                }
            }
            MutationKind::Delete => {
                self.stats.write().record_request();
                match self.remote.delete_article(id) {
                    // An already-absent remote copy confirms the deletion.
                    Ok(()) | Err(RemoteError::NotFound(_)) => {
                        self.remove_confirmed(id, change.kind)?;
                        self.store
                            .delete_article(id)
                            .map_err(|e| UploadFailure::Fatal(e.into()))?;
                        self.stats.write().record_deleted();
                        Ok(())
                    }
                    Err(e) => Err(self.classify_upload_error(e, id, change.kind)),
                }
            }
        }
    }

    fn classify_upload_error(
        &self,
        error: RemoteError,
        id: ArticleId,
        kind: MutationKind,
    ) -> UploadFailure {
        match error {
            RemoteError::Auth(message) => UploadFailure::Fatal(SyncError::Auth(message)),
            RemoteError::Network { message, retryable } => UploadFailure::Item(ItemError {
                article_id: id,
                kind: Some(kind),
                message,
                retryable,
            }),
            RemoteError::Validation(message) => UploadFailure::Item(ItemError {
                article_id: id,
                kind: Some(kind),
                message,
                retryable: false,
            }),
            RemoteError::NotFound(_) => UploadFailure::Item(ItemError {
                article_id: id,
                kind: Some(kind),
                message: "article not found remotely".into(),
                retryable: false,
            }),
        }
    }

    fn remove_confirmed(&self, id: ArticleId, kind: MutationKind) -> Result<(), UploadFailure> {
        self.store
            .remove_pending(id, kind)
            .map_err(|e| UploadFailure::Fatal(e.into()))
    }

    fn mark_record_synced(&self, id: ArticleId) -> Result<(), UploadFailure> {
        match self.store.mark_synced(id, Timestamp::now()) {
            Ok(()) => Ok(()),
            // Deleted locally mid-session; its tombstone carries its own
            // pending change.
            Err(StoreError::ArticleNotFound(_)) => Ok(()),
            Err(e) => Err(UploadFailure::Fatal(e.into())),
        }
    }

    fn run_download(
        &self,
        options: &SyncOptions,
        deadline: Instant,
        start_cursor: Option<DeltaCursor>,
        start_batch: u32,
    ) -> SyncResult<(PhaseExit, Option<DeltaCursor>)> {
        let mut cursor = start_cursor;
        let mut batch_index = start_batch;

        loop {
            match self.check_interrupt(deadline, true)? {
                Flow::Cancel => return Ok((PhaseExit::Cancelled, cursor)),
                Flow::Pause => {
                    self.save_checkpoint(
                        ResumePoint::DownloadingUpdates,
                        batch_index,
                        cursor.clone(),
                    )?;
                    return Ok((PhaseExit::Paused, cursor));
                }
                Flow::Continue => {}
            }

            let page = self
                .remote
                .fetch_changes_since(cursor.as_ref(), options.batch_size)?;
            self.stats.write().record_request();
            debug!(
                batch_index,
                items = page.items.len(),
                has_more = page.has_more,
                "downloaded delta page"
            );

            if !page.items.is_empty() {
                self.with_session(|s| s.grow_total(page.items.len() as u64));
            }

            for wire in page.items {
                if let Flow::Cancel = self.check_interrupt(deadline, false)? {
                    return Ok((PhaseExit::Cancelled, cursor));
                }
                let id = wire.parsed_id();
                self.apply_remote_item(wire)?;
                self.advance_progress(id);
            }

            let has_more = page.has_more;
            if page.next_cursor.is_some() {
                cursor = page.next_cursor;
            }

            // The page is fully applied; checkpoint past it.
            self.save_checkpoint(ResumePoint::DownloadingUpdates, batch_index, cursor.clone())?;
            self.events.emit(SyncEvent::BatchCompleted {
                phase: SyncPhase::DownloadingUpdates,
                batch_index,
            });
            batch_index += 1;

            if !has_more {
                break;
            }
        }

        Ok((PhaseExit::Done, cursor))
    }

    fn apply_remote_item(&self, wire: crate::remote::RemoteArticle) -> SyncResult<()> {
        self.stats.write().record_downloaded(wire.approximate_size());
        let fallback_id = wire.parsed_id();

        let record = match wire.into_record() {
            Ok(record) => record,
            Err(RemoteError::Validation(message)) => {
                // Malformed payloads stop here, before the detector.
                warn!(error = %message, "rejected malformed remote payload");
                if let Some(article_id) = fallback_id {
                    self.item_errors.write().push(ItemError {
                        article_id,
                        kind: None,
                        message,
                        retryable: false,
                    });
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let id = record.id;
        let local = self.store.article(id)?;
        let remote_version = if record.deleted { None } else { Some(record) };

        match detect(local.as_ref(), remote_version.as_ref()) {
            Detection::RemoteWins => match remote_version {
                None => {
                    if local.is_some() {
                        self.store.delete_article(id)?;
                        self.stats.write().record_deleted();
                    }
                }
                Some(mut record) => {
                    if let Some(local) = &local {
                        if !local.locally_modified
                            && local.updated_at == record.updated_at
                            && !local.content_differs(&record)
                            && !local.metadata_differs(&record)
                        {
                            self.stats.write().record_cache_hit();
                            return Ok(());
                        }
                    }
                    let created = local.is_none();
                    record.mark_synced(Timestamp::now());
                    self.store.upsert_article(record)?;
                    let mut stats = self.stats.write();
                    if created {
                        stats.record_created();
                    } else {
                        stats.record_updated();
                    }
                }
            },
            Detection::LocalWins => {
                // The local edit stands and stays scheduled for upload.
            }
            Detection::Conflict(kind) => {
                self.record_conflict(id, kind, local, remote_version)?;
            }
        }
        Ok(())
    }

    fn record_conflict(
        &self,
        id: ArticleId,
        kind: ConflictKind,
        local: Option<shelfmark_core::ArticleRecord>,
        remote: Option<shelfmark_core::ArticleRecord>,
    ) -> SyncResult<()> {
        {
            let conflicts = self.conflicts.read();
            // At most one active conflict per article.
            if conflicts.contains_key(&id) {
                return Ok(());
            }
        }

        let conflict = Conflict::new(id, kind, local, remote);
        info!(article = %id, kind = %kind, "conflict detected");
        self.conflicts.write().insert(id, conflict.clone());
        self.persist_conflicts()?;
        self.events.emit(SyncEvent::ConflictDetected { conflict });
        Ok(())
    }

    fn run_resolve(&self, options: &SyncOptions, cursor: Option<DeltaCursor>) -> SyncResult<()> {
        // Entering the phase is itself a resumable position; the cursor
        // rides along so finalization still advances it after a resume.
        self.save_checkpoint(ResumePoint::ResolvingConflicts, 0, cursor)?;

        let conflicts = self.conflicts();
        debug!(
            active = conflicts.len(),
            strategy = %options.strategy,
            "resolving conflicts"
        );

        for conflict in conflicts {
            match resolve(&conflict, options.strategy) {
                ResolutionOutcome::Deferred => {
                    // Manual strategy: stays active across sessions until
                    // a human decides.
                }
                ResolutionOutcome::Resolved(choice) => {
                    self.apply_resolution(&conflict, choice, options.strategy.tag())?;
                }
            }
        }
        Ok(())
    }

    fn apply_resolution(
        &self,
        conflict: &Conflict,
        choice: ResolutionChoice,
        tag: ResolutionTag,
    ) -> SyncResult<()> {
        let id = conflict.article_id;
        let now = Timestamp::now();

        match choice {
            ResolutionChoice::UseRemote => {
                // The local mutation is superseded by the decision.
                for kind in [MutationKind::Create, MutationKind::Update, MutationKind::Delete] {
                    self.store.remove_pending(id, kind)?;
                }
                match &conflict.remote {
                    Some(remote) => {
                        let mut record = remote.clone();
                        record.mark_synced(now);
                        self.store.upsert_article(record)?;
                        self.stats.write().record_updated();
                    }
                    None => {
                        self.store.delete_article(id)?;
                        self.stats.write().record_deleted();
                    }
                }
            }
            ResolutionChoice::UseLocal => {
                // The winner still has to reach the remote; enqueue it.
                let kind = match conflict.kind {
                    ConflictKind::DeletedRemotely => MutationKind::Create,
                    ConflictKind::DeletedLocally => MutationKind::Delete,
                    _ => MutationKind::Update,
                };
                self.store.enqueue_change(PendingChange::new(id, kind))?;
            }
        }

        self.conflicts.write().remove(&id);
        self.persist_conflicts()?;
        self.stats.write().record_conflict_resolved();
        self.persist_stats()?;
        info!(article = %id, resolution = ?tag, "conflict resolved");
        self.events.emit(SyncEvent::ConflictResolved {
            conflict_id: conflict.id,
            resolution: tag,
        });
        Ok(())
    }

    fn run_finalize(&self, cursor: Option<DeltaCursor>) -> SyncResult<()> {
        if let Some(cursor) = cursor {
            self.state.save_cursor(&cursor)?;
        }
        self.state
            .clear_checkpoint()
            .map_err(|e| SyncError::CheckpointPersistence(e.to_string()))?;

        let now = Timestamp::now();
        let duration = now.since(self.session.read().started_at);
        self.stats.write().record_success(duration, now);
        self.persist_stats()?;

        self.with_session(|s| {
            s.completed_at = Some(now);
            s.current_item = None;
        });
        self.set_phase(SyncPhase::Success);

        let (processed, conflicts_open) = {
            let session = self.session.read();
            (session.processed_items, self.conflicts.read().len() as u64)
        };
        info!(processed, conflicts_open, ?duration, "sync session completed");
        self.events.emit(SyncEvent::Completed {
            processed,
            conflicts_open,
        });
        Ok(())
    }

    // === Session bookkeeping ===

    fn conclude(&self, result: SyncResult<SyncOutcome>) -> SyncResult<SyncOutcome> {
        match result {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.stats.write().record_failure();
                if let Err(e) = self.persist_stats() {
                    warn!(error = %e, "failed to persist stats after session failure");
                }
                self.with_session(|s| {
                    s.completed_at = Some(Timestamp::now());
                    s.current_item = None;
                });
                self.set_phase(SyncPhase::Error);

                let report = ErrorReport::from_error(&error);
                warn!(
                    error = %report.message,
                    action = %report.action,
                    retryable = report.retryable,
                    "sync session failed"
                );
                self.events.emit(SyncEvent::SessionFailed { report });
                // The checkpoint is retained so resume can pick up once
                // the triggering condition is fixed.
                Err(error)
            }
        }
    }

    fn park(&self, phase: SyncPhase) -> SyncResult<SyncOutcome> {
        self.with_session(|s| s.paused_from = Some(phase));
        self.set_phase(SyncPhase::Paused);
        info!(%phase, "sync session paused");
        self.events.emit(SyncEvent::Paused { phase });
        Ok(SyncOutcome::Paused)
    }

    fn abort_cancelled(&self) -> SyncResult<SyncOutcome> {
        if let Err(e) = self.state.clear_checkpoint() {
            warn!(error = %e, "failed to discard checkpoint on cancel");
        }
        self.with_session(|s| {
            s.completed_at = Some(Timestamp::now());
            s.current_item = None;
        });
        self.set_phase(SyncPhase::Idle);
        info!("sync session cancelled");
        Ok(SyncOutcome::Cancelled)
    }

    fn check_interrupt(&self, deadline: Instant, allow_pause: bool) -> SyncResult<Flow> {
        if self.cancel_requested.load(Ordering::SeqCst) {
            return Ok(Flow::Cancel);
        }
        if Instant::now() >= deadline {
            return Err(SyncError::WatchdogTimeout);
        }
        if allow_pause && (self.pause_requested.load(Ordering::SeqCst) || !self.probe.is_online())
        {
            return Ok(Flow::Pause);
        }
        Ok(Flow::Continue)
    }

    fn save_checkpoint(
        &self,
        resume_point: ResumePoint,
        batch_index: u32,
        cursor: Option<DeltaCursor>,
    ) -> SyncResult<()> {
        let (processed, total) = {
            let session = self.session.read();
            (session.processed_items, session.total_items)
        };
        let checkpoint = SyncCheckpoint::new(resume_point, processed, total, batch_index)
            .with_cursor(cursor)
            .with_errors(self.item_errors.read().clone())
            .with_active_conflicts(self.conflicts.read().len() as u64);

        // Losing the checkpoint risks an inconsistent resume: fatal.
        self.state
            .save_checkpoint(&checkpoint)
            .map_err(|e| SyncError::CheckpointPersistence(e.to_string()))
    }

    fn set_phase(&self, to: SyncPhase) {
        let from = {
            let mut session = self.session.write();
            let from = session.phase;
            session.phase = to;
            if to != SyncPhase::Paused {
                session.paused_from = None;
            }
            from
        };
        if from != to {
            debug!(%from, %to, "phase transition");
            self.events.emit(SyncEvent::PhaseChanged { from, to });
        }
    }

    fn with_session(&self, f: impl FnOnce(&mut SyncSession)) {
        f(&mut self.session.write());
    }

    fn advance_progress(&self, current: Option<ArticleId>) {
        self.with_session(|s| s.advance(current));
        self.emit_progress();
    }

    fn emit_progress(&self) {
        let (processed, total, current) = {
            let session = self.session.read();
            (
                session.processed_items,
                session.total_items,
                session.current_item,
            )
        };
        self.events.emit(SyncEvent::Progress {
            processed,
            total,
            current,
        });
    }

    fn persist_stats(&self) -> SyncResult<()> {
        Ok(self.state.save_stats(&self.stats.read())?)
    }

    fn persist_conflicts(&self) -> SyncResult<()> {
        let conflicts: Vec<Conflict> = self.conflicts.read().values().cloned().collect();
        Ok(self.state.save_conflicts(&conflicts)?)
    }
}
