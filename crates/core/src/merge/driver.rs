//! The file reconciliation driver.
//!
//! Applies the per-key rule across the union of all keys of a keyed file, or
//! once at whole-file granularity for opaque files, and assembles a
//! [`FileMergeResult`]. Per-file results are combined into a project-level
//! [`SyncResult`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rules::{resolve_key, ConflictKind, KeyOutcome, MergeAction};

/// Sentinel key used for whole-file conflicts of opaque files, which have no
/// finer decomposition.
pub const OPAQUE_KEY: &str = "(file)";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a file's content is modeled for merge purposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A set of named KEY=VALUE entries (e.g. environment files).
    Keyed,
    /// A single undivided text blob (arbitrary text, JSON, YAML).
    Opaque,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyed => write!(f, "keyed"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

/// Overall status of a single file's merge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// Nothing diverged.
    Clean,
    /// Divergences existed but were all resolvable without user input.
    AutoMerged,
    /// At least one divergence requires a choice.
    Conflicted,
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::AutoMerged => write!(f, "auto_merged"),
            Self::Conflicted => write!(f, "conflicted"),
        }
    }
}

/// An open conflict on one key (or on the whole file, for opaque files).
///
/// Carries all three original values so that any of them can be
/// reconstructed losslessly during resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictEntry {
    pub key: String,
    pub kind: ConflictKind,
    pub base_value: Option<String>,
    pub local_value: Option<String>,
    pub remote_value: Option<String>,
}

/// A divergence resolved automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoMergeEntry {
    pub key: String,
    pub action: MergeAction,
    /// `None` when `action` is `Deleted`.
    pub value: Option<String>,
}

/// The complete outcome of reconciling one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMergeResult {
    pub file_name: String,
    pub kind: FileKind,
    pub status: MergeStatus,
    /// Keyed result. For conflicted keys this holds the provisional
    /// local-preview value (or omits the key if local is absent) so that a
    /// caller inspecting `merged` before resolution sees a prefer-local
    /// preview.
    pub merged: BTreeMap<String, String>,
    /// Opaque result; same prefer-local preview convention. `None` means the
    /// file is deleted.
    pub merged_content: Option<String>,
    pub conflicts: Vec<ConflictEntry>,
    pub auto_merged: Vec<AutoMergeEntry>,
}

/// Project-level summary of a set of per-file merges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResult {
    pub files: Vec<FileMergeResult>,
    pub has_conflicts: bool,
    pub requires_user_action: bool,
}

// ---------------------------------------------------------------------------
// Keyed driver
// ---------------------------------------------------------------------------

/// Reconcile one keyed file.
///
/// `local` and `remote` are never absent: an untracked file is represented
/// as an empty mapping. Only the base may be missing (no prior sync).
#[must_use]
pub fn merge_keyed(
    file_name: &str,
    base: Option<&BTreeMap<String, String>>,
    local: &BTreeMap<String, String>,
    remote: &BTreeMap<String, String>,
) -> FileMergeResult {
    // Union of all keys, iterated lexically for deterministic output.
    let mut keys: BTreeSet<&str> = BTreeSet::new();
    if let Some(b) = base {
        keys.extend(b.keys().map(String::as_str));
    }
    keys.extend(local.keys().map(String::as_str));
    keys.extend(remote.keys().map(String::as_str));

    let mut merged = BTreeMap::new();
    let mut conflicts = Vec::new();
    let mut auto_merged = Vec::new();

    for key in keys {
        let base_val = base.and_then(|b| b.get(key)).map(String::as_str);
        let local_val = local.get(key).map(String::as_str);
        let remote_val = remote.get(key).map(String::as_str);

        match resolve_key(base_val, local_val, remote_val) {
            KeyOutcome::Unchanged(Some(value)) => {
                merged.insert(key.to_string(), value);
            }
            KeyOutcome::Unchanged(None) => {}
            KeyOutcome::AutoMerged { action, value } => {
                if let Some(ref v) = value {
                    merged.insert(key.to_string(), v.clone());
                }
                auto_merged.push(AutoMergeEntry {
                    key: key.to_string(),
                    action,
                    value,
                });
            }
            KeyOutcome::Conflict(kind) => {
                // Prefer-local preview for unresolved conflicts.
                if let Some(v) = local_val {
                    merged.insert(key.to_string(), v.to_string());
                }
                conflicts.push(ConflictEntry {
                    key: key.to_string(),
                    kind,
                    base_value: base_val.map(str::to_string),
                    local_value: local_val.map(str::to_string),
                    remote_value: remote_val.map(str::to_string),
                });
            }
        }
    }

    let status = derive_status(&conflicts, &auto_merged);
    debug!(
        file = file_name,
        status = %status,
        conflicts = conflicts.len(),
        auto_merged = auto_merged.len(),
        "keyed merge complete"
    );

    FileMergeResult {
        file_name: file_name.to_string(),
        kind: FileKind::Keyed,
        status,
        merged,
        merged_content: None,
        conflicts,
        auto_merged,
    }
}

// ---------------------------------------------------------------------------
// Opaque driver
// ---------------------------------------------------------------------------

/// Reconcile one opaque (whole-document) file.
///
/// The same three-state logic as the keyed rule, applied once with the
/// entire content as a single value. No intra-file line merging is
/// attempted: unstructured text cannot be merged safely.
#[must_use]
pub fn merge_opaque(
    file_name: &str,
    base: Option<&str>,
    local: Option<&str>,
    remote: Option<&str>,
) -> FileMergeResult {
    let mut conflicts = Vec::new();
    let mut auto_merged = Vec::new();

    let merged_content = match resolve_key(base, local, remote) {
        KeyOutcome::Unchanged(value) => value,
        KeyOutcome::AutoMerged { action, value } => {
            auto_merged.push(AutoMergeEntry {
                key: OPAQUE_KEY.to_string(),
                action,
                value: value.clone(),
            });
            value
        }
        KeyOutcome::Conflict(kind) => {
            conflicts.push(ConflictEntry {
                key: OPAQUE_KEY.to_string(),
                kind,
                base_value: base.map(str::to_string),
                local_value: local.map(str::to_string),
                remote_value: remote.map(str::to_string),
            });
            // Prefer-local preview, matching the keyed convention.
            local.map(str::to_string)
        }
    };

    let status = derive_status(&conflicts, &auto_merged);
    debug!(file = file_name, status = %status, "opaque merge complete");

    FileMergeResult {
        file_name: file_name.to_string(),
        kind: FileKind::Opaque,
        status,
        merged: BTreeMap::new(),
        merged_content,
        conflicts,
        auto_merged,
    }
}

fn derive_status(conflicts: &[ConflictEntry], auto_merged: &[AutoMergeEntry]) -> MergeStatus {
    if !conflicts.is_empty() {
        MergeStatus::Conflicted
    } else if !auto_merged.is_empty() {
        MergeStatus::AutoMerged
    } else {
        MergeStatus::Clean
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Combine per-file results into a project-level summary.
#[must_use]
pub fn create_sync_result(files: Vec<FileMergeResult>) -> SyncResult {
    let has_conflicts = files.iter().any(|f| !f.conflicts.is_empty());
    SyncResult {
        files,
        has_conflicts,
        // Auto-merges never require confirmation; only open conflicts do.
        requires_user_action: has_conflicts,
    }
}
