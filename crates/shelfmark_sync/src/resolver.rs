//! Conflict resolution strategies.

use serde::{Deserialize, Serialize};
use shelfmark_core::{Conflict, ResolutionTag, Timestamp};
use std::fmt;
use std::str::FromStr;

/// Strategy applied to detected conflicts, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStrategy {
    /// The version with the later modification timestamp wins; equal
    /// timestamps resolve to the remote version.
    LastWriteWins,
    /// The local version always wins.
    PreferLocal,
    /// The remote version always wins.
    PreferRemote,
    /// Resolution is deferred to an explicit user decision.
    Manual,
}

impl ConflictStrategy {
    /// Returns true if this strategy resolves without user input.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictStrategy::Manual)
    }

    /// The tag recorded on conflicts this strategy resolves.
    pub fn tag(&self) -> ResolutionTag {
        match self {
            ConflictStrategy::LastWriteWins => ResolutionTag::LastWriteWins,
            ConflictStrategy::PreferLocal => ResolutionTag::PreferLocal,
            ConflictStrategy::PreferRemote => ResolutionTag::PreferRemote,
            ConflictStrategy::Manual => ResolutionTag::Manual,
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictStrategy::LastWriteWins => "last-write-wins",
            ConflictStrategy::PreferLocal => "prefer-local",
            ConflictStrategy::PreferRemote => "prefer-remote",
            ConflictStrategy::Manual => "manual",
        };
        f.write_str(s)
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-write-wins" => Ok(ConflictStrategy::LastWriteWins),
            "prefer-local" => Ok(ConflictStrategy::PreferLocal),
            "prefer-remote" => Ok(ConflictStrategy::PreferRemote),
            "manual" => Ok(ConflictStrategy::Manual),
            other => Err(format!("unknown conflict strategy {other:?}")),
        }
    }
}

/// Which side a resolution keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionChoice {
    /// Keep the local version.
    UseLocal,
    /// Accept the remote version.
    UseRemote,
}

/// Outcome of running a strategy over one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The conflict resolves to one side.
    Resolved(ResolutionChoice),
    /// Manual strategy: the conflict stays active for a user decision.
    Deferred,
}

/// Resolves one conflict under `strategy`.
///
/// Deterministic: for last-write-wins, a side without a version (the
/// deletion side of a delete conflict) carries no timestamp and loses to
/// any surviving version; equal timestamps resolve to remote.
pub fn resolve(conflict: &Conflict, strategy: ConflictStrategy) -> ResolutionOutcome {
    match strategy {
        ConflictStrategy::Manual => ResolutionOutcome::Deferred,
        ConflictStrategy::PreferLocal => ResolutionOutcome::Resolved(ResolutionChoice::UseLocal),
        ConflictStrategy::PreferRemote => ResolutionOutcome::Resolved(ResolutionChoice::UseRemote),
        ConflictStrategy::LastWriteWins => {
            let local = conflict
                .local_updated_at()
                .unwrap_or(Timestamp::from_millis(0));
            let remote = conflict
                .remote_updated_at()
                .unwrap_or(Timestamp::from_millis(0));
            if local > remote {
                ResolutionOutcome::Resolved(ResolutionChoice::UseLocal)
            } else {
                ResolutionOutcome::Resolved(ResolutionChoice::UseRemote)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::{ArticleId, ArticleRecord, ConflictKind};

    fn conflict_with_timestamps(local_ms: u64, remote_ms: u64) -> Conflict {
        let id = ArticleId::new();
        let mut local = ArticleRecord::new(id, "https://example.com", "local");
        local.updated_at = Timestamp::from_millis(local_ms);
        let mut remote = ArticleRecord::new(id, "https://example.com", "remote");
        remote.updated_at = Timestamp::from_millis(remote_ms);
        Conflict::new(id, ConflictKind::ContentModified, Some(local), Some(remote))
    }

    #[test]
    fn last_write_wins_later_remote() {
        let c = conflict_with_timestamps(1000, 2000);
        assert_eq!(
            resolve(&c, ConflictStrategy::LastWriteWins),
            ResolutionOutcome::Resolved(ResolutionChoice::UseRemote)
        );
    }

    #[test]
    fn last_write_wins_later_local() {
        let c = conflict_with_timestamps(2000, 1000);
        assert_eq!(
            resolve(&c, ConflictStrategy::LastWriteWins),
            ResolutionOutcome::Resolved(ResolutionChoice::UseLocal)
        );
    }

    #[test]
    fn last_write_wins_tie_prefers_remote() {
        let c = conflict_with_timestamps(1500, 1500);
        assert_eq!(
            resolve(&c, ConflictStrategy::LastWriteWins),
            ResolutionOutcome::Resolved(ResolutionChoice::UseRemote)
        );
    }

    #[test]
    fn last_write_wins_deletion_side_loses() {
        let id = ArticleId::new();
        let mut local = ArticleRecord::new(id, "https://example.com", "local");
        local.updated_at = Timestamp::from_millis(10);
        let c = Conflict::new(id, ConflictKind::DeletedRemotely, Some(local), None);

        assert_eq!(
            resolve(&c, ConflictStrategy::LastWriteWins),
            ResolutionOutcome::Resolved(ResolutionChoice::UseLocal)
        );
    }

    #[test]
    fn fixed_preferences_ignore_timestamps() {
        let c = conflict_with_timestamps(1000, 2000);
        assert_eq!(
            resolve(&c, ConflictStrategy::PreferLocal),
            ResolutionOutcome::Resolved(ResolutionChoice::UseLocal)
        );
        assert_eq!(
            resolve(&c, ConflictStrategy::PreferRemote),
            ResolutionOutcome::Resolved(ResolutionChoice::UseRemote)
        );
    }

    #[test]
    fn manual_defers() {
        let c = conflict_with_timestamps(1000, 2000);
        assert_eq!(
            resolve(&c, ConflictStrategy::Manual),
            ResolutionOutcome::Deferred
        );
        assert!(!ConflictStrategy::Manual.auto_resolves());
        assert!(ConflictStrategy::LastWriteWins.auto_resolves());
    }

    #[test]
    fn strategy_string_roundtrip() {
        for s in [
            ConflictStrategy::LastWriteWins,
            ConflictStrategy::PreferLocal,
            ConflictStrategy::PreferRemote,
            ConflictStrategy::Manual,
        ] {
            assert_eq!(s.to_string().parse::<ConflictStrategy>().unwrap(), s);
        }
        assert!("latest".parse::<ConflictStrategy>().is_err());
    }
}
