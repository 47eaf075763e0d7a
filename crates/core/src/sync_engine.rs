//! Three-way synchronization engine.
//!
//! The [`SyncEngine`] is the heart of confsync. Each sync cycle:
//!
//! 1. Discover tracked files on the local machine.
//! 2. Fetch and decrypt the remote collection.
//! 3. Load the base snapshots (the last-agreed versions).
//! 4. Reconcile every file three ways, keyed or opaque.
//! 5. If everything is clean or resolved, write merged content locally,
//!    upload sealed payloads, advance the base snapshots, and record the
//!    new fingerprint.
//!
//! A lock mechanism prevents concurrent sync cycles.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::Database;
use crate::discovery::{self, TrackRules};
use crate::envfile;
use crate::errors::SyncError;
use crate::fingerprint::{compute_fingerprint, content_hash, has_drifted, FileIdentity};
use crate::merge::{
    all_conflicts_resolved, apply_resolutions, create_sync_result, merge_keyed, merge_opaque,
    resolve_all_conflicts, BatchSide, FileKind, FileMergeResult, MergeStatus, Resolution,
    ResolvedContent, SyncResult,
};
use crate::models::{
    SyncOperation, SyncRecord, SyncRecordStatus, SyncState, SyncStats, SyncStatus, TrackedFile,
};
use crate::store::{RemoteStore, StoredObject};
use crate::vault::Vault;

/// kv_state key holding the engine's coarse state string.
const KV_SYNC_STATE: &str = "sync_state";

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// The reconciliation outcome of one cycle, before anything is written.
///
/// Produced by [`SyncEngine::plan_sync`]; the CLI inspects it, gathers
/// resolutions for any conflicts, and hands it back to
/// [`SyncEngine::commit_sync`].
#[derive(Debug)]
pub struct SyncPlan {
    /// Per-file merge outcomes plus aggregate flags.
    pub result: SyncResult,
    /// Names present in the last agreed base.
    base_present: BTreeSet<String>,
    /// Names present on the local machine at plan time.
    local_present: BTreeSet<String>,
    /// Names present on the remote store at plan time.
    remote_present: BTreeSet<String>,
}

impl SyncPlan {
    /// Whether a file existed in the last agreed base.
    #[must_use]
    pub fn in_base(&self, name: &str) -> bool {
        self.base_present.contains(name)
    }

    /// Whether a file still existed locally when the plan was built.
    #[must_use]
    pub fn is_local(&self, name: &str) -> bool {
        self.local_present.contains(name)
    }

    /// Whether a file still existed remotely when the plan was built.
    #[must_use]
    pub fn is_remote(&self, name: &str) -> bool {
        self.remote_present.contains(name)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The three-way sync engine.
pub struct SyncEngine {
    config: AppConfig,
    db: Database,
    store: Arc<dyn RemoteStore>,
    vault: Vault,
    /// Atomic flag preventing concurrent sync cycles.
    running: Arc<AtomicBool>,
    started_at: chrono::DateTime<Utc>,
}

impl SyncEngine {
    /// Create a new sync engine with all required dependencies.
    pub fn new(config: AppConfig, db: Database, store: Arc<dyn RemoteStore>, vault: Vault) -> Self {
        info!("initializing sync engine");
        Self {
            config,
            db,
            store,
            vault,
            running: Arc::new(AtomicBool::new(false)),
            started_at: Utc::now(),
        }
    }

    /// Return a reference to the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if a sync cycle is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Planning
    // -----------------------------------------------------------------------

    /// Reconcile local, remote, and base without writing anything.
    pub async fn plan_sync(&self) -> Result<SyncPlan, SyncError> {
        let _ = self.db.set_kv(KV_SYNC_STATE, "merging");

        let rules = self.config.files.track_rules();
        let local = self.discover_local(&rules)?;
        let remote = self.fetch_remote().await?;
        let base = self.load_base()?;

        let mut names: BTreeSet<String> = BTreeSet::new();
        names.extend(local.keys().cloned());
        names.extend(remote.keys().cloned());
        names.extend(base.keys().cloned());

        let mut files = Vec::new();
        for name in &names {
            let Some(kind) = rules.classify(name) else {
                warn!(name = %name, "file no longer matches any tracked pattern, skipping");
                continue;
            };

            let base_content = base.get(name).map(String::as_str);
            let local_content = local.get(name).map(|f| f.content.as_str());
            let remote_content = remote.get(name).map(String::as_str);

            let merged = match kind {
                FileKind::Keyed => {
                    let base_map = parse_opt(name, base_content)?;
                    let local_map = parse_opt(name, local_content)?.unwrap_or_default();
                    let remote_map = parse_opt(name, remote_content)?.unwrap_or_default();
                    merge_keyed(name, base_map.as_ref(), &local_map, &remote_map)
                }
                FileKind::Opaque => merge_opaque(name, base_content, local_content, remote_content),
            };
            files.push(merged);
        }

        let result = create_sync_result(files);
        if result.has_conflicts {
            let _ = self.db.set_kv(KV_SYNC_STATE, "conflict_found");
        }

        debug!(
            files = result.files.len(),
            has_conflicts = result.has_conflicts,
            "sync plan built"
        );
        Ok(SyncPlan {
            result,
            base_present: base.keys().cloned().collect(),
            local_present: local.keys().cloned().collect(),
            remote_present: remote.keys().cloned().collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Committing
    // -----------------------------------------------------------------------

    /// Apply a plan: write merged files locally, upload sealed payloads,
    /// advance base snapshots, and record the new fingerprint.
    ///
    /// `resolutions` maps file name to the resolutions for that file's
    /// conflicts. Every conflict must be resolved (skips count as
    /// unresolved) or the commit is rejected without writing anything.
    pub async fn commit_sync(
        &self,
        plan: &SyncPlan,
        resolutions: &BTreeMap<String, Vec<Resolution>>,
    ) -> Result<SyncStats, SyncError> {
        let mut stats = SyncStats {
            files_examined: plan.result.files.len(),
            started_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };

        // Reject before writing anything if conflicts remain open.
        let empty: Vec<Resolution> = Vec::new();
        let mut unresolved = 0;
        for file in &plan.result.files {
            if file.status == MergeStatus::Conflicted {
                let file_res = resolutions.get(&file.file_name).unwrap_or(&empty);
                if !all_conflicts_resolved(file, file_res) {
                    unresolved += file.conflicts.len();
                }
            }
        }
        if unresolved > 0 {
            return Err(SyncError::UnresolvedConflicts { count: unresolved });
        }

        let _ = self.db.set_kv(KV_SYNC_STATE, "applying");

        let mut identities = Vec::new();
        for file in &plan.result.files {
            let file_res = resolutions.get(&file.file_name).unwrap_or(&empty);
            let final_content = self.final_content(plan, file, file_res)?;

            match file.status {
                MergeStatus::Clean => stats.files_clean += 1,
                MergeStatus::AutoMerged => stats.files_auto_merged += 1,
                MergeStatus::Conflicted => {
                    stats.conflicts_detected += file.conflicts.len();
                    stats.conflicts_resolved += file.conflicts.len();
                }
            }

            match final_content {
                Some(content) => {
                    let hash = content_hash(&content);
                    let changed_locally = !plan.is_local(&file.file_name)
                        || file.status != MergeStatus::Clean;
                    if changed_locally {
                        self.write_local(&file.file_name, &content)?;
                        stats.files_written += 1;
                    }

                    let payload = self.vault.seal(&content)?;
                    self.store
                        .put(&StoredObject {
                            name: file.file_name.clone(),
                            hash: hash.clone(),
                            payload,
                        })
                        .await?;
                    stats.uploaded += 1;

                    self.db.upsert_base_snapshot(&file.file_name, &content)?;
                    identities.push(FileIdentity {
                        name: file.file_name.clone(),
                        hash,
                    });
                }
                None => {
                    if self.config.sync.apply_deletes {
                        self.delete_local(&file.file_name)?;
                        self.store.delete(&file.file_name).await?;
                    }
                    self.db.delete_base_snapshot(&file.file_name)?;
                }
            }
        }

        let fingerprint = compute_fingerprint(&identities);
        self.db.set_last_fingerprint(&fingerprint)?;
        self.db.set_last_sync_at(Utc::now())?;
        let _ = self.db.set_kv(KV_SYNC_STATE, "idle");

        stats.completed_at = Some(Utc::now().to_rfc3339());
        self.record_cycle(SyncOperation::Sync, &stats, SyncRecordStatus::Completed)?;

        info!(
            files = stats.files_examined,
            written = stats.files_written,
            conflicts = stats.conflicts_detected,
            "sync cycle committed"
        );
        Ok(stats)
    }

    /// Execute one full sync cycle under the sync lock.
    ///
    /// If conflicts are found and `batch` is `None`, the cycle stops without
    /// writing anything and returns [`SyncError::UnresolvedConflicts`]; with
    /// a batch side every conflict is resolved toward that side.
    pub async fn run_sync_cycle(&self, batch: Option<BatchSide>) -> Result<SyncStats, SyncError> {
        let _guard = self.acquire_lock()?;

        let plan = self.plan_sync().await?;

        let mut resolutions: BTreeMap<String, Vec<Resolution>> = BTreeMap::new();
        if plan.result.has_conflicts {
            match batch {
                Some(side) => {
                    for file in &plan.result.files {
                        if file.status == MergeStatus::Conflicted {
                            resolutions
                                .insert(file.file_name.clone(), resolve_all_conflicts(file, side));
                        }
                    }
                }
                None => {
                    let count: usize =
                        plan.result.files.iter().map(|f| f.conflicts.len()).sum();
                    let _ = self.record_open_conflicts(count);
                    return Err(SyncError::UnresolvedConflicts { count });
                }
            }
        }

        self.commit_sync(&plan, &resolutions).await
    }

    // -----------------------------------------------------------------------
    // Push / pull
    // -----------------------------------------------------------------------

    /// Overwrite the remote store with the local tree.
    ///
    /// Refused when the remote has drifted since the last sync, unless
    /// `force` is set.
    pub async fn push(&self, force: bool) -> Result<SyncStats, SyncError> {
        let _guard = self.acquire_lock()?;

        let rules = self.config.files.track_rules();
        let local = self.discover_local(&rules)?;

        if !force {
            let remote_fp = self.remote_fingerprint().await?;
            let recorded = self.db.get_last_fingerprint()?;
            if has_drifted(recorded.as_deref(), &remote_fp) {
                return Err(SyncError::RemoteDrifted {
                    recorded,
                    current: remote_fp,
                });
            }
        }

        let mut stats = SyncStats {
            files_examined: local.len(),
            started_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };

        let mut identities = Vec::new();
        for file in local.values() {
            let hash = content_hash(&file.content);
            let payload = self.vault.seal(&file.content)?;
            self.store
                .put(&StoredObject {
                    name: file.name.clone(),
                    hash: hash.clone(),
                    payload,
                })
                .await?;
            self.db.upsert_base_snapshot(&file.name, &file.content)?;
            identities.push(FileIdentity {
                name: file.name.clone(),
                hash,
            });
            stats.uploaded += 1;
        }

        // Remove remote objects with no local counterpart.
        if self.config.sync.apply_deletes {
            for entry in self.store.list().await? {
                if !local.contains_key(&entry.name) {
                    self.store.delete(&entry.name).await?;
                    self.db.delete_base_snapshot(&entry.name)?;
                }
            }
        }

        self.db.set_last_fingerprint(&compute_fingerprint(&identities))?;
        self.db.set_last_sync_at(Utc::now())?;
        stats.completed_at = Some(Utc::now().to_rfc3339());
        self.record_cycle(SyncOperation::Push, &stats, SyncRecordStatus::Completed)?;

        info!(uploaded = stats.uploaded, "push completed");
        Ok(stats)
    }

    /// Overwrite the local tree with the remote store.
    ///
    /// Refused when local files have changed since the last sync, unless
    /// `force` is set.
    pub async fn pull(&self, force: bool) -> Result<SyncStats, SyncError> {
        let _guard = self.acquire_lock()?;

        let rules = self.config.files.track_rules();
        let local = self.discover_local(&rules)?;

        if !force {
            let local_identities: Vec<FileIdentity> = local
                .values()
                .map(|f| FileIdentity {
                    name: f.name.clone(),
                    hash: content_hash(&f.content),
                })
                .collect();
            let local_fp = compute_fingerprint(&local_identities);
            let recorded = self.db.get_last_fingerprint()?;
            if has_drifted(recorded.as_deref(), &local_fp) {
                return Err(SyncError::LocalDrifted);
            }
        }

        let remote = self.fetch_remote().await?;

        let mut stats = SyncStats {
            files_examined: remote.len(),
            started_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };

        let mut identities = Vec::new();
        for (name, content) in &remote {
            self.write_local(name, content)?;
            self.db.upsert_base_snapshot(name, content)?;
            identities.push(FileIdentity {
                name: name.clone(),
                hash: content_hash(content),
            });
            stats.downloaded += 1;
            stats.files_written += 1;
        }

        // Remove local files with no remote counterpart.
        if self.config.sync.apply_deletes {
            for name in local.keys() {
                if !remote.contains_key(name) {
                    self.delete_local(name)?;
                    self.db.delete_base_snapshot(name)?;
                }
            }
        }

        self.db.set_last_fingerprint(&compute_fingerprint(&identities))?;
        self.db.set_last_sync_at(Utc::now())?;
        stats.completed_at = Some(Utc::now().to_rfc3339());
        self.record_cycle(SyncOperation::Pull, &stats, SyncRecordStatus::Completed)?;

        info!(downloaded = stats.downloaded, "pull completed");
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Get a status summary.
    pub fn get_status(&self) -> Result<SyncStatus, SyncError> {
        let state_str = self
            .db
            .get_kv(KV_SYNC_STATE)?
            .unwrap_or_else(|| "idle".to_string());

        Ok(SyncStatus {
            state: SyncState::from_str_val(&state_str),
            last_sync_at: self.db.get_last_sync_at()?,
            base_fingerprint: self.db.get_last_fingerprint()?,
            tracked_files: self.db.count_base_snapshots()?,
            total_syncs: self.db.count_sync_records()?,
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn acquire_lock(&self) -> Result<SyncLockGuard, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning {
                started_at: self.started_at.to_rfc3339(),
            });
        }
        // RAII guard that clears the running flag on drop (even on panic).
        Ok(SyncLockGuard(self.running.clone()))
    }

    fn discover_local(
        &self,
        rules: &TrackRules,
    ) -> Result<BTreeMap<String, TrackedFile>, SyncError> {
        let files = discovery::discover(&self.config.general.root_dir, rules)?;
        Ok(files.into_iter().map(|f| (f.name.clone(), f)).collect())
    }

    /// Fetch and decrypt every remote object into `name -> content`.
    async fn fetch_remote(&self) -> Result<BTreeMap<String, String>, SyncError> {
        let mut remote = BTreeMap::new();
        for entry in self.store.list().await? {
            let Some(object) = self.store.get(&entry.name).await? else {
                warn!(name = %entry.name, "object vanished between list and get");
                continue;
            };
            let content = self.vault.open(&object.payload)?;
            remote.insert(entry.name, content);
        }
        Ok(remote)
    }

    fn load_base(&self) -> Result<BTreeMap<String, String>, SyncError> {
        Ok(self
            .db
            .list_base_snapshots()?
            .into_iter()
            .map(|e| (e.name, e.content))
            .collect())
    }

    /// Fingerprint of the remote store as it is right now.
    async fn remote_fingerprint(&self) -> Result<String, SyncError> {
        let identities: Vec<FileIdentity> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|e| FileIdentity {
                name: e.name,
                hash: e.hash,
            })
            .collect();
        Ok(compute_fingerprint(&identities))
    }

    /// Compute the final content of one file after resolutions are applied.
    /// `None` means the file ends up deleted.
    fn final_content(
        &self,
        plan: &SyncPlan,
        file: &FileMergeResult,
        resolutions: &[Resolution],
    ) -> Result<Option<String>, SyncError> {
        let resolved = apply_resolutions(file, resolutions)?;
        match resolved {
            ResolvedContent::Keyed(map) => {
                // An empty merged map is a deletion only when the file
                // existed in the last agreed base and at least one side has
                // since dropped it. A new file that parses to an empty map
                // (empty or comments-only) is an addition and round-trips.
                let name = &file.file_name;
                let dropped =
                    plan.in_base(name) && (!plan.is_local(name) || !plan.is_remote(name));
                if map.is_empty() && dropped {
                    Ok(None)
                } else {
                    Ok(Some(envfile::serialize(&map)))
                }
            }
            ResolvedContent::Opaque(content) => Ok(content),
        }
    }

    fn local_path(&self, name: &str) -> PathBuf {
        let mut path = self.config.general.root_dir.clone();
        for segment in name.split('/') {
            path.push(segment);
        }
        path
    }

    fn write_local(&self, name: &str, content: &str) -> Result<(), SyncError> {
        let path = self.local_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        debug!(name, "wrote local file");
        Ok(())
    }

    fn delete_local(&self, name: &str) -> Result<(), SyncError> {
        let path = self.local_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!(name, "removed local file");
        }
        Ok(())
    }

    fn record_cycle(
        &self,
        operation: SyncOperation,
        stats: &SyncStats,
        status: SyncRecordStatus,
    ) -> Result<(), SyncError> {
        let record = SyncRecord {
            id: Uuid::new_v4().to_string(),
            operation,
            files_examined: stats.files_examined as i64,
            files_written: stats.files_written as i64,
            conflicts_detected: stats.conflicts_detected as i64,
            conflicts_resolved: stats.conflicts_resolved as i64,
            status,
            details: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        self.db.insert_sync_record(&record)?;
        Ok(())
    }

    fn record_open_conflicts(&self, count: usize) -> Result<(), SyncError> {
        let record = SyncRecord {
            id: Uuid::new_v4().to_string(),
            operation: SyncOperation::Sync,
            files_examined: 0,
            files_written: 0,
            conflicts_detected: count as i64,
            conflicts_resolved: 0,
            status: SyncRecordStatus::ConflictsOpen,
            details: Some(format!("{count} conflict(s) require resolution")),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        self.db.insert_sync_record(&record)?;
        Ok(())
    }
}

/// Parse optional keyed content, treating an absent file as an absent map.
fn parse_opt(
    name: &str,
    content: Option<&str>,
) -> Result<Option<BTreeMap<String, String>>, SyncError> {
    match content {
        Some(c) => Ok(Some(envfile::parse(name, c)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Sync lock RAII guard
// ---------------------------------------------------------------------------

/// Drop guard that resets the `running` flag to `false`.
///
/// This ensures the sync lock is always released, even if a sync cycle panics.
struct SyncLockGuard(Arc<AtomicBool>);

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
