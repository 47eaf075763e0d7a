//! The conflict resolution applier.
//!
//! Takes user or strategy decisions for each open conflict of a
//! [`FileMergeResult`] and folds them into final merged content. Supports
//! batch strategies (prefer local / prefer remote) and manual overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::MergeError;

use super::driver::{ConflictEntry, FileKind, FileMergeResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which version (or override) to keep for one conflicted key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    Local,
    Remote,
    Base,
    Manual,
    /// Leave the provisional local-preview value untouched.
    Skip,
}

impl std::fmt::Display for ResolutionChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Base => write!(f, "base"),
            Self::Manual => write!(f, "manual"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// A decision for one conflicted key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub key: String,
    pub choice: ResolutionChoice,
    /// Required when `choice` is `Manual`.
    pub manual_value: Option<String>,
}

impl Resolution {
    pub fn new(key: impl Into<String>, choice: ResolutionChoice) -> Self {
        Self {
            key: key.into(),
            choice,
            manual_value: None,
        }
    }

    pub fn manual(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            choice: ResolutionChoice::Manual,
            manual_value: Some(value.into()),
        }
    }
}

/// Side chosen by a batch strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchSide {
    Local,
    Remote,
}

/// Final merged content after resolutions are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedContent {
    /// Keyed result: the full key/value mapping to persist.
    Keyed(BTreeMap<String, String>),
    /// Opaque result: the document content, or `None` if the file is deleted.
    Opaque(Option<String>),
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Fold `resolutions` into the merge result, producing the final content.
///
/// Conflicts with no matching resolution, or with a `Skip` resolution, keep
/// their provisional local-preview value. A `Manual` resolution without a
/// value is a caller error and is rejected loudly.
pub fn apply_resolutions(
    result: &FileMergeResult,
    resolutions: &[Resolution],
) -> Result<ResolvedContent, MergeError> {
    match result.kind {
        FileKind::Keyed => {
            let mut merged = result.merged.clone();
            for conflict in &result.conflicts {
                let Some(resolution) = find_resolution(resolutions, &conflict.key) else {
                    continue;
                };
                let value = chosen_value(conflict, resolution)?;
                match value {
                    Applied::Set(v) => {
                        merged.insert(conflict.key.clone(), v);
                    }
                    Applied::Remove => {
                        merged.remove(&conflict.key);
                    }
                    Applied::Keep => {}
                }
            }
            Ok(ResolvedContent::Keyed(merged))
        }
        FileKind::Opaque => {
            let mut content = result.merged_content.clone();
            for conflict in &result.conflicts {
                let Some(resolution) = find_resolution(resolutions, &conflict.key) else {
                    continue;
                };
                match chosen_value(conflict, resolution)? {
                    Applied::Set(v) => content = Some(v),
                    Applied::Remove => content = None,
                    Applied::Keep => {}
                }
            }
            Ok(ResolvedContent::Opaque(content))
        }
    }
}

/// Generate one uniform resolution per open conflict.
///
/// Choosing a side that deleted the key produces a deletion in the final
/// result, never stale content.
#[must_use]
pub fn resolve_all_conflicts(result: &FileMergeResult, side: BatchSide) -> Vec<Resolution> {
    let choice = match side {
        BatchSide::Local => ResolutionChoice::Local,
        BatchSide::Remote => ResolutionChoice::Remote,
    };
    result
        .conflicts
        .iter()
        .map(|c| Resolution::new(c.key.clone(), choice))
        .collect()
}

/// True only if every open conflict has a matching resolution whose choice
/// is not `Skip`.
#[must_use]
pub fn all_conflicts_resolved(result: &FileMergeResult, resolutions: &[Resolution]) -> bool {
    result.conflicts.iter().all(|c| {
        find_resolution(resolutions, &c.key)
            .map(|r| r.choice != ResolutionChoice::Skip)
            .unwrap_or(false)
    })
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

enum Applied {
    Set(String),
    Remove,
    Keep,
}

// Conflict counts are small; a linear scan is fine.
fn find_resolution<'a>(resolutions: &'a [Resolution], key: &str) -> Option<&'a Resolution> {
    resolutions.iter().find(|r| r.key == key)
}

fn chosen_value(conflict: &ConflictEntry, resolution: &Resolution) -> Result<Applied, MergeError> {
    let applied = match resolution.choice {
        ResolutionChoice::Local => side_to_applied(conflict.local_value.clone()),
        ResolutionChoice::Remote => side_to_applied(conflict.remote_value.clone()),
        ResolutionChoice::Base => side_to_applied(conflict.base_value.clone()),
        ResolutionChoice::Manual => {
            let value = resolution
                .manual_value
                .clone()
                .ok_or_else(|| MergeError::MissingManualValue(conflict.key.clone()))?;
            Applied::Set(value)
        }
        ResolutionChoice::Skip => Applied::Keep,
    };
    debug!(key = %conflict.key, choice = %resolution.choice, "applied resolution");
    Ok(applied)
}

fn side_to_applied(value: Option<String>) -> Applied {
    match value {
        Some(v) => Applied::Set(v),
        None => Applied::Remove,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::driver::{merge_keyed, merge_opaque, OPAQUE_KEY};
    use std::collections::BTreeMap;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn divergent_result() -> crate::merge::driver::FileMergeResult {
        let base = map(&[("K", "o")]);
        merge_keyed(".env", Some(&base), &map(&[("K", "l")]), &map(&[("K", "r")]))
    }

    #[test]
    fn test_choose_local() {
        let result = divergent_result();
        let resolved = apply_resolutions(
            &result,
            &[Resolution::new("K", ResolutionChoice::Local)],
        )
        .unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(map(&[("K", "l")])));
    }

    #[test]
    fn test_choose_remote() {
        let result = divergent_result();
        let resolved = apply_resolutions(
            &result,
            &[Resolution::new("K", ResolutionChoice::Remote)],
        )
        .unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(map(&[("K", "r")])));
    }

    #[test]
    fn test_choose_base() {
        let result = divergent_result();
        let resolved = apply_resolutions(
            &result,
            &[Resolution::new("K", ResolutionChoice::Base)],
        )
        .unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(map(&[("K", "o")])));
    }

    #[test]
    fn test_manual_value() {
        let result = divergent_result();
        let resolved =
            apply_resolutions(&result, &[Resolution::manual("K", "custom")]).unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(map(&[("K", "custom")])));
    }

    #[test]
    fn test_manual_without_value_is_rejected() {
        let result = divergent_result();
        let bad = Resolution {
            key: "K".into(),
            choice: ResolutionChoice::Manual,
            manual_value: None,
        };
        let err = apply_resolutions(&result, &[bad]).unwrap_err();
        assert!(matches!(err, MergeError::MissingManualValue(ref k) if k == "K"));
    }

    #[test]
    fn test_skip_keeps_local_preview() {
        let result = divergent_result();
        let resolved = apply_resolutions(
            &result,
            &[Resolution::new("K", ResolutionChoice::Skip)],
        )
        .unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(map(&[("K", "l")])));
    }

    #[test]
    fn test_unmatched_conflict_keeps_local_preview() {
        let result = divergent_result();
        let resolved = apply_resolutions(&result, &[]).unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(map(&[("K", "l")])));
    }

    #[test]
    fn test_choosing_deleting_side_deletes() {
        // Local deleted K, remote edited it: choosing local must delete the
        // key, not leave stale content.
        let base = map(&[("K", "o")]);
        let result = merge_keyed(".env", Some(&base), &map(&[]), &map(&[("K", "r")]));
        assert_eq!(result.conflicts.len(), 1);

        let resolutions = resolve_all_conflicts(&result, BatchSide::Local);
        let resolved = apply_resolutions(&result, &resolutions).unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(map(&[])));
    }

    #[test]
    fn test_batch_local_reproduces_local() {
        let base = map(&[("A", "1"), ("B", "2"), ("C", "3")]);
        let local = map(&[("A", "a-local"), ("C", "3")]); // edited A, deleted B
        let remote = map(&[("A", "a-remote"), ("B", "b-remote"), ("C", "3")]);
        let result = merge_keyed(".env", Some(&base), &local, &remote);
        assert_eq!(result.conflicts.len(), 2); // A divergent, B edit-vs-delete

        let resolutions = resolve_all_conflicts(&result, BatchSide::Local);
        let resolved = apply_resolutions(&result, &resolutions).unwrap();
        // Every previously conflicted key now matches the local value.
        assert_eq!(resolved, ResolvedContent::Keyed(local));
    }

    #[test]
    fn test_batch_remote_reproduces_remote() {
        let base = map(&[("A", "1"), ("B", "2")]);
        let local = map(&[("A", "a-local"), ("B", "2")]);
        let remote = map(&[("A", "a-remote"), ("B", "2")]);
        let result = merge_keyed(".env", Some(&base), &local, &remote);

        let resolutions = resolve_all_conflicts(&result, BatchSide::Remote);
        let resolved = apply_resolutions(&result, &resolutions).unwrap();
        assert_eq!(resolved, ResolvedContent::Keyed(remote));
    }

    #[test]
    fn test_no_data_loss_all_three_reconstructible() {
        // From a single ConflictEntry, each of the three original values can
        // be reconstructed by choosing the corresponding side.
        let result = divergent_result();
        for (choice, expected) in [
            (ResolutionChoice::Base, "o"),
            (ResolutionChoice::Local, "l"),
            (ResolutionChoice::Remote, "r"),
        ] {
            let resolved =
                apply_resolutions(&result, &[Resolution::new("K", choice)]).unwrap();
            assert_eq!(resolved, ResolvedContent::Keyed(map(&[("K", expected)])));
        }
    }

    #[test]
    fn test_all_conflicts_resolved_flag() {
        let result = divergent_result();
        assert!(!all_conflicts_resolved(&result, &[]));
        assert!(!all_conflicts_resolved(
            &result,
            &[Resolution::new("K", ResolutionChoice::Skip)]
        ));
        assert!(all_conflicts_resolved(
            &result,
            &[Resolution::new("K", ResolutionChoice::Remote)]
        ));
    }

    // -- opaque --

    #[test]
    fn test_opaque_choose_remote() {
        let result = merge_opaque("notes.txt", Some("b"), Some("l"), Some("r"));
        let resolved = apply_resolutions(
            &result,
            &[Resolution::new(OPAQUE_KEY, ResolutionChoice::Remote)],
        )
        .unwrap();
        assert_eq!(resolved, ResolvedContent::Opaque(Some("r".into())));
    }

    #[test]
    fn test_opaque_choose_deleting_side_clears_content() {
        // Remote deleted the file, local edited it.
        let result = merge_opaque("notes.txt", Some("b"), Some("l"), None);
        assert_eq!(result.conflicts.len(), 1);

        let resolved = apply_resolutions(
            &result,
            &[Resolution::new(OPAQUE_KEY, ResolutionChoice::Remote)],
        )
        .unwrap();
        assert_eq!(resolved, ResolvedContent::Opaque(None));
    }
}
