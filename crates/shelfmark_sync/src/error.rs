//! Error types for the sync engine.

use shelfmark_core::{ArticleId, ConflictId, StoreError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by the remote API client.
///
/// Every remote failure is classified at the boundary so the engine never
/// has to inspect transport internals.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// Connectivity failure (unreachable host, timeout, dropped socket).
    #[error("network error: {message}")]
    Network {
        /// Error message from the transport.
        message: String,
        /// Whether a later attempt can succeed.
        retryable: bool,
    },

    /// The service rejected our credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service rejected the payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The addressed article does not exist remotely.
    #[error("article {0} not found remotely")]
    NotFound(ArticleId),
}

impl RemoteError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Connectivity failure, retryable on the next session.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the next session can retry.
        retryable: bool,
    },

    /// Authentication failure; fatal to the session, requires re-login
    /// before any resume.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Per-item payload rejection; never aborts a batch.
    #[error("validation failed for {article_id:?}: {message}")]
    Validation {
        /// The article whose payload was rejected, when known.
        article_id: Option<ArticleId>,
        /// Rejection detail.
        message: String,
    },

    /// A session is already active.
    #[error("a sync session is already running")]
    AlreadyRunning,

    /// Resume was requested but no checkpoint is persisted.
    #[error("no checkpoint to resume from")]
    NoCheckpoint,

    /// The persisted checkpoint is unusable; discard it and start fresh.
    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// Persisting the checkpoint itself failed. Fatal: losing the
    /// checkpoint risks an inconsistent resume.
    #[error("checkpoint persistence failed: {0}")]
    CheckpointPersistence(String),

    /// Local store failure; fatal to the session.
    #[error("store error: {0}")]
    Storage(#[from] StoreError),

    /// The session was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// The session-level watchdog fired.
    #[error("sync session exceeded its watchdog timeout")]
    WatchdogTimeout,

    /// Required network condition is not met.
    #[error("network unavailable")]
    Offline,

    /// The operation is not valid in the current phase.
    #[error("cannot {operation} while {phase}")]
    InvalidState {
        /// Current phase name.
        phase: String,
        /// The rejected operation.
        operation: String,
    },

    /// Stats may only be cleared while no session is active.
    #[error("cannot clear stats while a session is active")]
    ClearWhileActive,

    /// No active conflict with that id.
    #[error("unknown conflict {0}")]
    UnknownConflict(ConflictId),

    /// The supplied options are unusable.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Returns true if a later session can retry after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::WatchdogTimeout | SyncError::Offline => true,
            _ => false,
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Network { message, retryable } => SyncError::Network { message, retryable },
            RemoteError::Auth(message) => SyncError::Auth(message),
            RemoteError::Validation(message) => SyncError::Validation {
                article_id: None,
                message,
            },
            RemoteError::NotFound(id) => SyncError::Validation {
                article_id: Some(id),
                message: "article not found remotely".into(),
            },
        }
    }
}

/// What the user should do about a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedAction {
    /// Try the sync again later.
    Retry,
    /// Re-authenticate with the service.
    ReLogin,
    /// Check the device's network connection.
    CheckNetwork,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SuggestedAction::Retry => "retry",
            SuggestedAction::ReLogin => "re-login",
            SuggestedAction::CheckNetwork => "check network",
        };
        f.write_str(s)
    }
}

/// The classified, user-facing form of a session error.
///
/// Observers receive this instead of raw internals: the verbatim message,
/// a suggested action, and whether a later session can retry.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// The error rendered verbatim.
    pub message: String,
    /// What the user should do about it.
    pub action: SuggestedAction,
    /// Whether a later session can retry.
    pub retryable: bool,
}

impl ErrorReport {
    /// Classifies a sync error for observers.
    pub fn from_error(err: &SyncError) -> Self {
        let action = match err {
            SyncError::Auth(_) => SuggestedAction::ReLogin,
            SyncError::Network { .. } | SyncError::Offline => SuggestedAction::CheckNetwork,
            _ => SuggestedAction::Retry,
        };
        Self {
            message: err.to_string(),
            action,
            retryable: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::network_retryable("connection reset").is_retryable());
        assert!(SyncError::WatchdogTimeout.is_retryable());
        assert!(SyncError::Offline.is_retryable());
        assert!(!SyncError::Auth("expired token".into()).is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::AlreadyRunning.is_retryable());
    }

    #[test]
    fn remote_error_mapping() {
        let err: SyncError = RemoteError::Auth("bad token".into()).into();
        assert!(matches!(err, SyncError::Auth(_)));

        let err: SyncError = RemoteError::network_retryable("timeout").into();
        assert!(err.is_retryable());

        let id = ArticleId::new();
        let err: SyncError = RemoteError::NotFound(id).into();
        assert!(matches!(
            err,
            SyncError::Validation {
                article_id: Some(got),
                ..
            } if got == id
        ));
    }

    #[test]
    fn report_suggests_actions() {
        let report = ErrorReport::from_error(&SyncError::Auth("expired".into()));
        assert_eq!(report.action, SuggestedAction::ReLogin);
        assert!(!report.retryable);
        assert!(report.message.contains("expired"));

        let report = ErrorReport::from_error(&SyncError::network_retryable("down"));
        assert_eq!(report.action, SuggestedAction::CheckNetwork);
        assert!(report.retryable);

        let report = ErrorReport::from_error(&SyncError::WatchdogTimeout);
        assert_eq!(report.action, SuggestedAction::Retry);
    }
}
