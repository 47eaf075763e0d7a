//! Three-way reconciliation engine.
//!
//! Given the last-agreed *base*, the current *local* copy, and the current
//! *remote* copy of a file, the engine computes a merged result, classifies
//! every divergence as auto-mergeable or a true conflict, and provides a
//! deterministic protocol for folding conflict resolutions back in.

pub mod apply;
pub mod driver;
pub mod rules;

pub use apply::{
    all_conflicts_resolved, apply_resolutions, resolve_all_conflicts, BatchSide, ResolvedContent,
    Resolution, ResolutionChoice,
};
pub use driver::{
    create_sync_result, merge_keyed, merge_opaque, AutoMergeEntry, ConflictEntry, FileKind,
    FileMergeResult, MergeStatus, SyncResult, OPAQUE_KEY,
};
pub use rules::{resolve_key, ConflictKind, KeyOutcome, MergeAction};
