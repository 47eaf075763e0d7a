//! Typed query helpers for every table in the confsync database.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::fingerprint::content_hash;
use crate::models::{SnapshotEntry, SyncOperation, SyncRecord, SyncRecordStatus};

/// kv_state key holding the fingerprint of the last agreed base.
pub const KV_LAST_FINGERPRINT: &str = "last_fingerprint";
/// kv_state key holding the RFC 3339 timestamp of the last completed sync.
pub const KV_LAST_SYNC_AT: &str = "last_sync_at";

impl Database {
    // -- base_snapshots -----------------------------------------------------

    /// Insert or replace the base snapshot for one file.
    pub fn upsert_base_snapshot(&self, name: &str, content: &str) -> Result<(), DatabaseError> {
        let hash = content_hash(content);
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO base_snapshots (name, content, hash, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (name) DO UPDATE SET
                 content = excluded.content,
                 hash = excluded.hash,
                 updated_at = excluded.updated_at",
            params![name, content, hash, now],
        )?;
        debug!(name, hash, "stored base snapshot");
        Ok(())
    }

    /// Look up the base snapshot for one file, if it exists.
    pub fn get_base_snapshot(&self, name: &str) -> Result<Option<SnapshotEntry>, DatabaseError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name, content, hash FROM base_snapshots WHERE name = ?1")?;
        let mut rows = stmt.query_map(params![name], |row| {
            Ok(SnapshotEntry {
                name: row.get(0)?,
                content: row.get(1)?,
                hash: row.get(2)?,
            })
        })?;
        match rows.next() {
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Return every base snapshot, ordered by name.
    pub fn list_base_snapshots(&self) -> Result<Vec<SnapshotEntry>, DatabaseError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name, content, hash FROM base_snapshots ORDER BY name")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(SnapshotEntry {
                    name: row.get(0)?,
                    content: row.get(1)?,
                    hash: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Remove the base snapshot for a file that is no longer tracked.
    pub fn delete_base_snapshot(&self, name: &str) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute("DELETE FROM base_snapshots WHERE name = ?1", params![name])?;
        debug!(name, "deleted base snapshot");
        Ok(())
    }

    /// Number of files with a stored base snapshot.
    pub fn count_base_snapshots(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM base_snapshots", [], |row| row.get(0))?;
        Ok(count)
    }

    // -- sync_records -------------------------------------------------------

    /// Insert a completed (or failed) sync record.
    pub fn insert_sync_record(&self, record: &SyncRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_records
                 (id, operation, files_examined, files_written,
                  conflicts_detected, conflicts_resolved, status, details,
                  started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.operation.to_string(),
                record.files_examined,
                record.files_written,
                record.conflicts_detected,
                record.conflicts_resolved,
                record.status.to_string(),
                record.details,
                record.started_at.to_rfc3339(),
                record.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        debug!(id = %record.id, operation = %record.operation, "inserted sync record");
        Ok(())
    }

    /// Return the most recent N sync records, newest first.
    pub fn list_sync_records(&self, limit: u32) -> Result<Vec<SyncRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, operation, files_examined, files_written,
                    conflicts_detected, conflicts_resolved, status, details,
                    started_at, completed_at
             FROM sync_records ORDER BY started_at DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map(params![limit], |row| {
                let operation: String = row.get(1)?;
                let status: String = row.get(6)?;
                let started_at: String = row.get(8)?;
                let completed_at: Option<String> = row.get(9)?;
                Ok(SyncRecord {
                    id: row.get(0)?,
                    operation: SyncOperation::from_str_val(&operation),
                    files_examined: row.get(2)?,
                    files_written: row.get(3)?,
                    conflicts_detected: row.get(4)?,
                    conflicts_resolved: row.get(5)?,
                    status: SyncRecordStatus::from_str_val(&status),
                    details: row.get(7)?,
                    started_at: parse_timestamp(&started_at),
                    completed_at: completed_at.as_deref().map(parse_timestamp),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Total number of recorded sync cycles.
    pub fn count_sync_records(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sync_records", [], |row| row.get(0))?;
        Ok(count)
    }

    // -- kv_state -----------------------------------------------------------

    /// Store a key-value state entry, replacing any previous value.
    pub fn set_kv(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO kv_state (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Read a key-value state entry.
    pub fn get_kv(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv_state WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get(0))?;
        match rows.next() {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Fingerprint of the remote collection at the last agreed base.
    pub fn get_last_fingerprint(&self) -> Result<Option<String>, DatabaseError> {
        self.get_kv(KV_LAST_FINGERPRINT)
    }

    /// Record the fingerprint of the remote collection after a sync.
    pub fn set_last_fingerprint(&self, fingerprint: &str) -> Result<(), DatabaseError> {
        self.set_kv(KV_LAST_FINGERPRINT, fingerprint)
    }

    /// Timestamp of the last completed sync, if any.
    pub fn get_last_sync_at(&self) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        Ok(self
            .get_kv(KV_LAST_SYNC_AT)?
            .as_deref()
            .map(parse_timestamp))
    }

    /// Record the completion time of a sync.
    pub fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.set_kv(KV_LAST_SYNC_AT, &at.to_rfc3339())
    }
}

/// Parse a stored RFC 3339 timestamp. A malformed value maps to the Unix
/// epoch, which reads as obviously wrong instead of plausibly current.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!(value = s, "malformed timestamp stored in database");
            DateTime::<Utc>::UNIX_EPOCH
        })
}
