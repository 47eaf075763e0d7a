//! Remote store abstraction.
//!
//! A remote store holds one [`StoredObject`] per tracked file: the sealed
//! (encrypted) payload plus a plaintext content hash used for fingerprinting.
//! The store never sees plaintext content. Two backends are provided: an
//! HTTP API client for a hosted store, and a directory-backed store for a
//! shared filesystem (also the test double).

pub mod dir;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

pub use dir::DirStore;
pub use http::HttpStore;

/// The `(name, hash)` listing entry for one remote object.
///
/// `hash` is the hex SHA-256 of the plaintext content, so drift detection
/// works without downloading or decrypting anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub hash: String,
}

/// One stored object: the encrypted payload plus its plaintext hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// `/`-separated tracked-file name.
    pub name: String,
    /// Hex SHA-256 of the plaintext content.
    pub hash: String,
    /// Sealed payload, base64 over nonce plus ciphertext.
    pub payload: String,
}

/// Backend-agnostic interface to the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List every stored object's name and plaintext hash.
    async fn list(&self) -> Result<Vec<RemoteEntry>, StoreError>;

    /// Fetch one object by name. `Ok(None)` means the object does not exist.
    async fn get(&self, name: &str) -> Result<Option<StoredObject>, StoreError>;

    /// Create or replace one object.
    async fn put(&self, object: &StoredObject) -> Result<(), StoreError>;

    /// Delete one object. Deleting a missing object is not an error.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}
