//! SQLite persistence.
//!
//! One [`Database`] handle backs the whole engine: base snapshots of the
//! last agreed file contents, the per-cycle sync history, and the small
//! key-value watermarks (last fingerprint, last sync time). Schema setup
//! and upgrades live in [`schema`]; typed accessors live in [`queries`].

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// Handle to the confsync state database.
///
/// The connection sits behind a `Mutex` so one handle can be shared across
/// async tasks; WAL journaling keeps concurrent readers cheap.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the state database at `path` with the pragmas the
    /// engine relies on: WAL journaling, foreign keys, and a busy timeout
    /// for overlapping CLI invocations.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening state database");

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        debug!("state database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Bring the schema up to date.
    pub fn initialize(&self) -> Result<(), DatabaseError> {
        schema::run_migrations(&self.conn())
    }

    /// Lock the underlying connection. A poisoned lock is recovered rather
    /// than propagated.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("state database mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
