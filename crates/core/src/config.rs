//! TOML-based configuration system for confsync.
//!
//! All sensitive values (store tokens, the vault passphrase) are stored as
//! `_env` fields that reference environment variable names. The actual
//! secrets are resolved at runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::discovery::TrackRules;
use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// General settings (paths, logging, watch interval).
    #[serde(default)]
    pub general: GeneralConfig,

    /// Which files are tracked and how they merge.
    pub files: FilesConfig,

    /// Remote store settings.
    pub store: StoreConfig,

    /// Encryption settings.
    pub vault: VaultConfig,

    /// Sync behaviour settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

/// General paths, logging, and watch-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root directory under which tracked files live.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Directory for persistent data (the sync database).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between watch-mode sync cycles (default 300).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("confsync")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_poll_interval() -> u64 {
    300
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracked files
// ---------------------------------------------------------------------------

/// Glob patterns selecting tracked files.
///
/// Keyed files merge key by key; opaque files merge as whole documents.
/// Ignore patterns win over both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Patterns for KEY=VALUE files merged key by key.
    #[serde(default)]
    pub keyed: Vec<String>,

    /// Patterns for files merged as whole documents.
    #[serde(default)]
    pub opaque: Vec<String>,

    /// Patterns excluded from tracking entirely.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_ignore() -> Vec<String> {
    vec![".git/**".into(), "**/*.local".into()]
}

impl FilesConfig {
    /// Convert into the discovery layer's rule set.
    #[must_use]
    pub fn track_rules(&self) -> TrackRules {
        TrackRules {
            keyed: self.keyed.clone(),
            opaque: self.opaque.clone(),
            ignore: self.ignore.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote store
// ---------------------------------------------------------------------------

/// Which store backend to use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Hosted HTTP store.
    #[default]
    Http,
    /// Directory on a shared filesystem.
    Dir,
}

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Base URL of the hosted store (required for the `http` backend).
    #[serde(default)]
    pub url: Option<String>,

    /// Environment variable holding the store API token.
    #[serde(default)]
    pub token_env: Option<String>,

    /// Store directory (required for the `dir` backend).
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Encryption settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Environment variable holding the vault passphrase.
    pub passphrase_env: String,

    /// Resolved passphrase (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub passphrase: Option<String>,
}

// ---------------------------------------------------------------------------
// Sync behaviour
// ---------------------------------------------------------------------------

/// Sync behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Write auto-merged files without prompting.
    #[serde(default = "default_true")]
    pub auto_write: bool,

    /// Delete local files whose remote counterpart was deleted.
    #[serde(default = "default_true")]
    pub apply_deletes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_write: true,
            apply_deletes: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `_env` fields from environment variables and populate the
    /// corresponding resolved fields.
    ///
    /// Fields that reference a missing variable will log a warning but will
    /// **not** fail -- callers can check the `Option` fields and decide what
    /// is required for their execution mode.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");

        self.vault.passphrase =
            resolve_optional_env(&self.vault.passphrase_env, "vault.passphrase_env");

        if let Some(ref env_name) = self.store.token_env {
            self.store.token = resolve_optional_env(env_name, "store.token_env");
        }

        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.keyed.is_empty() && self.files.opaque.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "files".into(),
                detail: "at least one keyed or opaque pattern is required".into(),
            });
        }
        match self.store.backend {
            StoreBackend::Http => {
                if self.store.url.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "store.url".into(),
                        detail: "http backend requires a store URL".into(),
                    });
                }
            }
            StoreBackend::Dir => {
                if self.store.dir.is_none() {
                    return Err(ConfigError::InvalidValue {
                        field: "store.dir".into(),
                        detail: "dir backend requires a store directory".into(),
                    });
                }
            }
        }
        if self.vault.passphrase_env.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "vault.passphrase_env".into(),
                detail: "passphrase env var name must not be empty".into(),
            });
        }
        if self.general.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "general.poll_interval_secs".into(),
                detail: "poll interval must be > 0".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[general]
root_dir = "/home/user/dotfiles"
data_dir = "/home/user/.local/share/confsync"
log_level = "debug"
poll_interval_secs = 120

[files]
keyed = ["**/.env", "**/*.env"]
opaque = ["**/*.json", "**/*.toml"]
ignore = [".git/**", "**/*.local"]

[store]
backend = "http"
url = "https://sync.example.com/api"
token_env = "CONFSYNC_TOKEN"

[vault]
passphrase_env = "CONFSYNC_PASSPHRASE"

[sync]
auto_write = true
apply_deletes = false
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.general.poll_interval_secs, 120);
        assert_eq!(config.files.keyed, vec!["**/.env", "**/*.env"]);
        assert_eq!(config.store.backend, StoreBackend::Http);
        assert_eq!(
            config.store.url.as_deref(),
            Some("https://sync.example.com/api")
        );
        assert!(!config.sync.apply_deletes);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_no_patterns() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.files.keyed.clear();
        config.files.opaque.clear();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "files"
        ));
    }

    #[test]
    fn test_validate_http_backend_requires_url() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.store.url = None;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "store.url"
        ));
    }

    #[test]
    fn test_validate_dir_backend_requires_dir() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.store.backend = StoreBackend::Dir;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "store.dir"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_CONFSYNC_PASS", "hunter2");
        std::env::set_var("TEST_CONFSYNC_TOKEN", "tok_abc");

        let toml_str = r#"
[files]
keyed = ["**/.env"]
[store]
backend = "http"
url = "https://sync.example.com"
token_env = "TEST_CONFSYNC_TOKEN"
[vault]
passphrase_env = "TEST_CONFSYNC_PASS"
"#;
        let mut config: AppConfig = toml::from_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();

        assert_eq!(config.vault.passphrase.as_deref(), Some("hunter2"));
        assert_eq!(config.store.token.as_deref(), Some("tok_abc"));

        // Clean up
        std::env::remove_var("TEST_CONFSYNC_PASS");
        std::env::remove_var("TEST_CONFSYNC_TOKEN");
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[files]
keyed = ["**/.env"]
[store]
backend = "dir"
dir = "/mnt/shared/confsync"
[vault]
passphrase_env = "CONFSYNC_PASSPHRASE"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.poll_interval_secs, 300);
        assert_eq!(config.files.ignore, default_ignore());
        assert!(config.sync.auto_write);
        assert!(config.sync.apply_deletes);
    }
}
