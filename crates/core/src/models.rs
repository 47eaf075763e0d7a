//! Domain model types used throughout confsync.
//!
//! These types bridge the sync engine, database layer, and CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::FileKind;

// ---------------------------------------------------------------------------
// Tracked files and snapshots
// ---------------------------------------------------------------------------

/// A tracked file as discovered on the local machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// `/`-separated path relative to the tracked root; the file's identity
    /// across machines.
    pub name: String,
    pub kind: FileKind,
    pub content: String,
}

/// One file's entry in the base snapshot (the last-agreed version).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub content: String,
    /// Hex SHA-256 of `content`.
    pub hash: String,
}

// ---------------------------------------------------------------------------
// Sync status
// ---------------------------------------------------------------------------

/// High-level sync status summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub base_fingerprint: Option<String>,
    pub tracked_files: i64,
    pub total_syncs: i64,
}

/// Current sync state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
    Error,
    ConflictFound,
}

impl SyncState {
    /// Parse a state string into a `SyncState`.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "syncing" | "merging" | "applying" => Self::Syncing,
            "error" => Self::Error,
            "conflict_found" => Self::ConflictFound,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Error => write!(f, "error"),
            Self::ConflictFound => write!(f, "conflict_found"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync records
// ---------------------------------------------------------------------------

/// A record of a single synchronization cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: String,
    pub operation: SyncOperation,
    pub files_examined: i64,
    pub files_written: i64,
    pub conflicts_detected: i64,
    pub conflicts_resolved: i64,
    pub status: SyncRecordStatus,
    pub details: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Which operation produced a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Sync,
    Push,
    Pull,
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
        }
    }
}

impl SyncOperation {
    /// Parse an operation string.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "push" => Self::Push,
            "pull" => Self::Pull,
            _ => Self::Sync,
        }
    }
}

/// Status of a sync record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncRecordStatus {
    Completed,
    ConflictsOpen,
    Failed,
}

impl std::fmt::Display for SyncRecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::ConflictsOpen => write!(f, "conflicts_open"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl SyncRecordStatus {
    /// Parse a status string.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "conflicts_open" => Self::ConflictsOpen,
            "failed" => Self::Failed,
            _ => Self::Completed,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-cycle statistics
// ---------------------------------------------------------------------------

/// Statistics from a single sync/push/pull cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub files_examined: usize,
    pub files_clean: usize,
    pub files_auto_merged: usize,
    pub files_written: usize,
    pub uploaded: usize,
    pub downloaded: usize,
    pub conflicts_detected: usize,
    pub conflicts_resolved: usize,
    pub started_at: String,
    pub completed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state_round_trip() {
        assert_eq!(SyncState::from_str_val("idle"), SyncState::Idle);
        assert_eq!(SyncState::from_str_val("syncing"), SyncState::Syncing);
        assert_eq!(
            SyncState::from_str_val("conflict_found"),
            SyncState::ConflictFound
        );
        assert_eq!(SyncState::from_str_val("garbage"), SyncState::Idle);
        assert_eq!(SyncState::ConflictFound.to_string(), "conflict_found");
    }

    #[test]
    fn test_operation_round_trip() {
        for op in [SyncOperation::Sync, SyncOperation::Push, SyncOperation::Pull] {
            assert_eq!(SyncOperation::from_str_val(&op.to_string()), op);
        }
    }

    #[test]
    fn test_record_status_round_trip() {
        for st in [
            SyncRecordStatus::Completed,
            SyncRecordStatus::ConflictsOpen,
            SyncRecordStatus::Failed,
        ] {
            assert_eq!(SyncRecordStatus::from_str_val(&st.to_string()), st);
        }
    }
}
