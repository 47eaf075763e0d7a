//! Fingerprinting for drift detection.
//!
//! A fingerprint is a stable hash over the sorted `(name, content_hash)`
//! projection of a file collection, used to decide whether the remote (or
//! local) side has moved since the last agreed base. Sort-by-name is
//! mandatory so the fingerprint is independent of discovery order.

use sha2::{Digest, Sha256};

/// Version tag mixed into every fingerprint so the format can evolve.
pub const FINGERPRINT_VERSION: &str = "v1";

/// The `(name, hash)` identity of one file in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub name: String,
    pub hash: String,
}

/// Hex SHA-256 of a file's content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compute the versioned fingerprint of a file collection.
///
/// Entries are sorted by name before hashing; names and hashes are length
/// delimited so concatenation cannot alias across entries.
#[must_use]
pub fn compute_fingerprint(files: &[FileIdentity]) -> String {
    let mut sorted: Vec<&FileIdentity> = files.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_VERSION.as_bytes());
    for file in sorted {
        hasher.update((file.name.len() as u64).to_be_bytes());
        hasher.update(file.name.as_bytes());
        hasher.update((file.hash.len() as u64).to_be_bytes());
        hasher.update(file.hash.as_bytes());
    }

    format!("{}:{}", FINGERPRINT_VERSION, hex::encode(hasher.finalize()))
}

/// Has the collection moved since `recorded`?
///
/// A missing recorded fingerprint (no prior sync) counts as drift: an
/// unconditional overwrite is never safe without an agreed base.
#[must_use]
pub fn has_drifted(recorded: Option<&str>, current: &str) -> bool {
    match recorded {
        Some(r) => r != current,
        None => true,
    }
}
