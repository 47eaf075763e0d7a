//! confsync core library.
//!
//! This crate provides the foundational components for synchronizing small
//! configuration files across machines via a shared encrypted store:
//! configuration, base-snapshot persistence, the three-way reconciliation
//! engine, drift detection, remote store clients, and the sync engine.

pub mod config;
pub mod db;
pub mod discovery;
pub mod envfile;
pub mod errors;
pub mod fingerprint;
pub mod merge;
pub mod models;
pub mod store;
pub mod sync_engine;
pub mod vault;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::Database;
pub use sync_engine::SyncEngine;
pub use vault::Vault;
