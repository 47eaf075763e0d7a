//! The per-key reconciliation rule.
//!
//! [`resolve_key`] is a pure, total function deciding the fate of one key
//! given its value in the base, local, and remote versions. Absence is a
//! first-class state distinct from the empty string: `None` means the key
//! does not exist in that version.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides changed the value, differently.
    DivergentEdit,
    /// One side edited, the other deleted.
    EditVsDelete,
    /// Both sides added the key with different values and there is no base.
    NewKeyCollision,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DivergentEdit => write!(f, "divergent_edit"),
            Self::EditVsDelete => write!(f, "edit_vs_delete"),
            Self::NewKeyCollision => write!(f, "new_key_collision"),
        }
    }
}

/// What an auto-merge did to a key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    AddedFromLocal,
    AddedFromRemote,
    Deleted,
    UpdatedFromLocal,
    UpdatedFromRemote,
}

impl std::fmt::Display for MergeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddedFromLocal => write!(f, "added_from_local"),
            Self::AddedFromRemote => write!(f, "added_from_remote"),
            Self::Deleted => write!(f, "deleted"),
            Self::UpdatedFromLocal => write!(f, "updated_from_local"),
            Self::UpdatedFromRemote => write!(f, "updated_from_remote"),
        }
    }
}

/// Outcome of reconciling one key across the three versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// No divergence: the key keeps this value (`None` = key stays absent).
    Unchanged(Option<String>),
    /// Resolvable without user input. `value` is `None` when the key is
    /// deleted.
    AutoMerged {
        action: MergeAction,
        value: Option<String>,
    },
    /// Local and remote disagree in a way that requires a choice.
    Conflict(ConflictKind),
}

// ---------------------------------------------------------------------------
// The decision table
// ---------------------------------------------------------------------------

/// Decide the fate of a single key.
///
/// Every reachable combination of (base presence, local presence, remote
/// presence, value equality) maps to exactly one outcome; there is no
/// fallthrough branch.
#[must_use]
pub fn resolve_key(
    base: Option<&str>,
    local: Option<&str>,
    remote: Option<&str>,
) -> KeyOutcome {
    match base {
        // First sync for this key: no agreed-upon prior value.
        None => match (local, remote) {
            (Some(l), Some(r)) if l == r => KeyOutcome::Unchanged(Some(l.to_string())),
            (Some(_), Some(_)) => KeyOutcome::Conflict(ConflictKind::NewKeyCollision),
            (Some(l), None) => KeyOutcome::AutoMerged {
                action: MergeAction::AddedFromLocal,
                value: Some(l.to_string()),
            },
            (None, Some(r)) => KeyOutcome::AutoMerged {
                action: MergeAction::AddedFromRemote,
                value: Some(r.to_string()),
            },
            // Absent everywhere. Unreachable through the driver (which only
            // visits keys in the union) but kept total.
            (None, None) => KeyOutcome::Unchanged(None),
        },

        Some(b) => match (local, remote) {
            // Both sides deleted, or one deleted while the other left the
            // value untouched: the deletion wins.
            (None, None) => KeyOutcome::AutoMerged {
                action: MergeAction::Deleted,
                value: None,
            },
            (None, Some(r)) if r == b => KeyOutcome::AutoMerged {
                action: MergeAction::Deleted,
                value: None,
            },
            (Some(l), None) if l == b => KeyOutcome::AutoMerged {
                action: MergeAction::Deleted,
                value: None,
            },

            // One side deleted while the other edited.
            (None, Some(_)) | (Some(_), None) => {
                KeyOutcome::Conflict(ConflictKind::EditVsDelete)
            }

            (Some(l), Some(r)) => {
                let local_changed = l != b;
                let remote_changed = r != b;
                match (local_changed, remote_changed) {
                    (false, false) => KeyOutcome::Unchanged(Some(b.to_string())),
                    (true, false) => KeyOutcome::AutoMerged {
                        action: MergeAction::UpdatedFromLocal,
                        value: Some(l.to_string()),
                    },
                    (false, true) => KeyOutcome::AutoMerged {
                        action: MergeAction::UpdatedFromRemote,
                        value: Some(r.to_string()),
                    },
                    // Identical convergent edit.
                    (true, true) if l == r => KeyOutcome::Unchanged(Some(l.to_string())),
                    (true, true) => KeyOutcome::Conflict(ConflictKind::DivergentEdit),
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- no base --

    #[test]
    fn test_no_base_both_added_equal() {
        let outcome = resolve_key(None, Some("v"), Some("v"));
        assert_eq!(outcome, KeyOutcome::Unchanged(Some("v".into())));
    }

    #[test]
    fn test_no_base_both_added_different() {
        let outcome = resolve_key(None, Some("a"), Some("b"));
        assert_eq!(outcome, KeyOutcome::Conflict(ConflictKind::NewKeyCollision));
    }

    #[test]
    fn test_no_base_only_local() {
        let outcome = resolve_key(None, Some("v"), None);
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::AddedFromLocal,
                value: Some("v".into()),
            }
        );
    }

    #[test]
    fn test_no_base_only_remote() {
        let outcome = resolve_key(None, None, Some("v"));
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::AddedFromRemote,
                value: Some("v".into()),
            }
        );
    }

    #[test]
    fn test_no_base_absent_everywhere() {
        assert_eq!(resolve_key(None, None, None), KeyOutcome::Unchanged(None));
    }

    // -- base present --

    #[test]
    fn test_neither_changed() {
        let outcome = resolve_key(Some("o"), Some("o"), Some("o"));
        assert_eq!(outcome, KeyOutcome::Unchanged(Some("o".into())));
    }

    #[test]
    fn test_both_deleted() {
        let outcome = resolve_key(Some("o"), None, None);
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::Deleted,
                value: None,
            }
        );
    }

    #[test]
    fn test_local_deleted_remote_unchanged() {
        let outcome = resolve_key(Some("o"), None, Some("o"));
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::Deleted,
                value: None,
            }
        );
    }

    #[test]
    fn test_remote_deleted_local_unchanged() {
        let outcome = resolve_key(Some("o"), Some("o"), None);
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::Deleted,
                value: None,
            }
        );
    }

    #[test]
    fn test_local_deleted_remote_changed() {
        let outcome = resolve_key(Some("o"), None, Some("r"));
        assert_eq!(outcome, KeyOutcome::Conflict(ConflictKind::EditVsDelete));
    }

    #[test]
    fn test_remote_deleted_local_changed() {
        let outcome = resolve_key(Some("o"), Some("l"), None);
        assert_eq!(outcome, KeyOutcome::Conflict(ConflictKind::EditVsDelete));
    }

    #[test]
    fn test_only_local_changed() {
        let outcome = resolve_key(Some("o"), Some("l"), Some("o"));
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::UpdatedFromLocal,
                value: Some("l".into()),
            }
        );
    }

    #[test]
    fn test_only_remote_changed() {
        let outcome = resolve_key(Some("o"), Some("o"), Some("r"));
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::UpdatedFromRemote,
                value: Some("r".into()),
            }
        );
    }

    #[test]
    fn test_both_changed_identically() {
        let outcome = resolve_key(Some("o"), Some("n"), Some("n"));
        assert_eq!(outcome, KeyOutcome::Unchanged(Some("n".into())));
    }

    #[test]
    fn test_both_changed_differently() {
        let outcome = resolve_key(Some("o"), Some("l"), Some("r"));
        assert_eq!(outcome, KeyOutcome::Conflict(ConflictKind::DivergentEdit));
    }

    #[test]
    fn test_empty_string_is_a_value_not_absence() {
        // Local set the value to empty; remote left it. An edit, not a delete.
        let outcome = resolve_key(Some("o"), Some(""), Some("o"));
        assert_eq!(
            outcome,
            KeyOutcome::AutoMerged {
                action: MergeAction::UpdatedFromLocal,
                value: Some(String::new()),
            }
        );

        // Both converged on the empty string.
        let outcome = resolve_key(Some("o"), Some(""), Some(""));
        assert_eq!(outcome, KeyOutcome::Unchanged(Some(String::new())));
    }
}
