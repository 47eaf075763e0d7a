//! Directory-backed store for a shared filesystem (NFS mount, synced
//! folder). Each object is one JSON envelope file under the store root,
//! mirroring the tracked file's relative path with a `.json` suffix.
//!
//! Also serves as the in-process store for tests.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{RemoteEntry, RemoteStore, StoredObject};
use crate::errors::StoreError;

/// Store backed by a directory tree of JSON envelope files.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (or create) a directory store at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn object_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('/') {
            path.push(segment);
        }
        path.set_extension(match path.extension() {
            Some(ext) => format!("{}.json", ext.to_string_lossy()),
            None => "json".to_string(),
        });
        path
    }

    fn collect_envelopes(dir: &Path, out: &mut Vec<StoredObject>) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_envelopes(&path, out)?;
            } else if path.extension().is_some_and(|e| e == "json") {
                out.push(Self::read_envelope(&path)?);
            }
        }
        Ok(())
    }

    fn read_envelope(path: &Path) -> Result<StoredObject, StoreError> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| StoreError::MalformedObject {
            name: path.display().to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl RemoteStore for DirStore {
    async fn list(&self) -> Result<Vec<RemoteEntry>, StoreError> {
        let mut objects = Vec::new();
        Self::collect_envelopes(&self.root, &mut objects)?;
        let mut entries: Vec<RemoteEntry> = objects
            .into_iter()
            .map(|o| RemoteEntry {
                name: o.name,
                hash: o.hash,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = entries.len(), "listed directory store");
        Ok(entries)
    }

    async fn get(&self, name: &str) -> Result<Option<StoredObject>, StoreError> {
        let path = self.object_path(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_envelope(&path)?))
    }

    async fn put(&self, object: &StoredObject) -> Result<(), StoreError> {
        let path = self.object_path(&object.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(object).map_err(|e| StoreError::MalformedObject {
            name: object.name.clone(),
            detail: e.to_string(),
        })?;
        fs::write(&path, raw)?;
        debug!(name = %object.name, path = %path.display(), "wrote envelope");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.object_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!(name, "removed envelope");
        }
        Ok(())
    }
}
