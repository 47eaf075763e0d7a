//! Comprehensive error types for the confsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    EnvFile(#[from] EnvFileError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

// ---------------------------------------------------------------------------
// Merge / resolution errors
// ---------------------------------------------------------------------------

/// Errors from the conflict resolution applier.
///
/// The reconciliation engine itself is total and never fails; these errors
/// are caller-contract violations when folding resolutions into a result.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A `manual` resolution was supplied without a value.
    #[error("manual resolution for key '{0}' is missing a value")]
    MissingManualValue(String),
}

// ---------------------------------------------------------------------------
// Keyed-file parse errors
// ---------------------------------------------------------------------------

/// Errors from parsing KEY=VALUE files.
#[derive(Debug, Error)]
pub enum EnvFileError {
    /// A non-comment line has no `=` separator.
    #[error("malformed line {line} in '{file}': no '=' separator")]
    MalformedLine {
        file: String,
        line: usize,
    },

    /// A key appears more than once in the same file.
    #[error("duplicate key '{key}' at line {line} in '{file}'")]
    DuplicateKey {
        file: String,
        key: String,
        line: usize,
    },
}

// ---------------------------------------------------------------------------
// Sync engine errors
// ---------------------------------------------------------------------------

/// Errors from the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync cycle is already running.
    #[error("sync already in progress (started at {started_at})")]
    AlreadyRunning {
        started_at: String,
    },

    /// The remote store has moved since the recorded base fingerprint, so an
    /// unconditional push/pull is unsafe.
    #[error("remote has drifted since the last sync (recorded {recorded:?}, current {current}); run a full sync or use --force")]
    RemoteDrifted {
        recorded: Option<String>,
        current: String,
    },

    /// The local tree has moved since the recorded base fingerprint, so an
    /// unconditional pull would overwrite unsynced edits.
    #[error("local files have changed since the last sync; run a full sync or use --force")]
    LocalDrifted,

    /// A commit was requested while conflicts remain open and no resolution
    /// strategy was supplied.
    #[error("{count} conflict(s) remain unresolved; supply resolutions or a batch strategy")]
    UnresolvedConflicts {
        count: usize,
    },

    /// Underlying resolution error during sync.
    #[error("sync merge error: {0}")]
    MergeError(#[from] MergeError),

    /// Underlying keyed-file parse error during sync.
    #[error("sync parse error: {0}")]
    EnvFileError(#[from] EnvFileError),

    /// Database error during sync.
    #[error("sync database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Remote store error during sync.
    #[error("sync store error: {0}")]
    StoreError(#[from] StoreError),

    /// Encryption error during sync.
    #[error("sync vault error: {0}")]
    VaultError(#[from] VaultError),

    /// File discovery error during sync.
    #[error("sync discovery error: {0}")]
    DiscoveryError(#[from] DiscoveryError),

    /// Generic I/O wrapper (writing merged files to disk).
    #[error("sync I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Remote store errors
// ---------------------------------------------------------------------------

/// Errors from the remote object store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("store HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The store returned a non-success status code.
    #[error("store API error (HTTP {status}): {body}")]
    ApiError {
        status: u16,
        body: String,
    },

    /// Authentication token is missing or invalid.
    #[error("store authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A stored object could not be decoded.
    #[error("malformed stored object '{name}': {detail}")]
    MalformedObject {
        name: String,
        detail: String,
    },

    /// Generic I/O error (directory-backed store).
    #[error("store I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Vault errors
// ---------------------------------------------------------------------------

/// Errors from the symmetric encryption layer.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Encryption failed.
    #[error("encryption failed")]
    EncryptFailed,

    /// Decryption failed: wrong passphrase or tampered payload.
    #[error("decryption failed: wrong passphrase or corrupted payload")]
    DecryptFailed,

    /// Payload is not valid base64 or is too short to hold a nonce.
    #[error("malformed encrypted payload: {0}")]
    MalformedPayload(String),

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

/// Errors from tracked-file discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The configured root directory does not exist.
    #[error("tracked-files root not found: {0}")]
    RootNotFound(String),

    /// A discovered file is not valid UTF-8 text.
    #[error("file '{0}' is not valid UTF-8 text")]
    NotText(String),

    /// Generic I/O error while walking the tree.
    #[error("discovery I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = MergeError::MissingManualValue("API_KEY".into());
        assert_eq!(
            err.to_string(),
            "manual resolution for key 'API_KEY' is missing a value"
        );

        let err = EnvFileError::MalformedLine {
            file: ".env".into(),
            line: 7,
        };
        assert!(err.to_string().contains("line 7"));

        let err = SyncError::UnresolvedConflicts { count: 3 };
        assert!(err.to_string().contains("3 conflict(s)"));

        let err = VaultError::DecryptFailed;
        assert!(err.to_string().contains("wrong passphrase"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let merge_err = MergeError::MissingManualValue("K".into());
        let core_err: CoreError = merge_err.into();
        assert!(matches!(core_err, CoreError::Merge(_)));

        let db_err = DatabaseError::NotFound {
            entity: "snapshot".into(),
            id: ".env".into(),
        };
        let core_err: CoreError = CoreError::Database(db_err);
        assert!(matches!(core_err, CoreError::Database(_)));
    }
}
