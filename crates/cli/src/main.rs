//! confsync command-line tool.
//!
//! Provides subcommands for initializing and validating configuration,
//! running sync cycles (interactive or batch), forcing one-way push/pull,
//! inspecting status and history, and a watch mode that syncs periodically.

mod render;
mod resolve;
mod style;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use confsync_core::config::{AppConfig, StoreBackend};
use confsync_core::db::Database;
use confsync_core::errors::SyncError;
use confsync_core::merge::{resolve_all_conflicts, BatchSide, MergeStatus, Resolution};
use confsync_core::store::{DirStore, HttpStore, RemoteStore};
use confsync_core::sync_engine::SyncEngine;
use confsync_core::vault::Vault;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// confsync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "confsync",
    version,
    about = "Synchronize configuration files across machines through an encrypted store"
)]
struct Cli {
    /// Path to the TOML configuration file.
    /// Defaults to `<config dir>/confsync/config.toml`.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./confsync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Show current synchronization status.
    Status,

    /// Run one three-way sync cycle.
    Sync {
        /// Resolve every conflict toward one side instead of prompting.
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        /// Never prompt; fail if conflicts are found and no strategy is set.
        #[arg(long)]
        non_interactive: bool,

        /// Plan only; show what would happen without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Overwrite the remote store with the local tree.
    Push {
        /// Push even if the remote has drifted since the last sync.
        #[arg(long)]
        force: bool,
    },

    /// Overwrite the local tree with the remote store.
    Pull {
        /// Pull even if local files have changed since the last sync.
        #[arg(long)]
        force: bool,
    },

    /// Show recent sync history.
    Log {
        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Sync periodically until interrupted.
    Watch {
        /// Resolve conflicts toward one side automatically; without this,
        /// cycles with conflicts are reported and left unwritten.
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
    },
}

/// Batch resolution strategy for `sync --strategy`.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    /// Keep the local value for every conflict.
    Local,
    /// Take the remote value for every conflict.
    Remote,
}

impl From<Strategy> for BatchSide {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Local => BatchSide::Local,
            Strategy::Remote => BatchSide::Remote,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = config_path(cli.config.as_deref());

    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&config_path),
        _ => {
            let config = load_config(&config_path)?;
            let engine = build_engine(config)?;

            match cli.command {
                Commands::Status => cmd_status(&engine),
                Commands::Sync {
                    strategy,
                    non_interactive,
                    dry_run,
                } => cmd_sync(&engine, strategy, non_interactive, dry_run).await,
                Commands::Push { force } => cmd_push(&engine, force).await,
                Commands::Pull { force } => cmd_pull(&engine, force).await,
                Commands::Log { limit } => cmd_log(&engine, limit),
                Commands::Watch { strategy } => cmd_watch(&engine, strategy).await,
                _ => unreachable!(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn config_path(explicit: Option<&std::path::Path>) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("confsync")
            .join("config.toml"),
    }
}

fn load_config(path: &PathBuf) -> Result<AppConfig> {
    let mut config =
        AppConfig::load_from_file(path).context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_engine(config: AppConfig) -> Result<SyncEngine> {
    let db_path = config.general.data_dir.join("confsync.db");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    let db = Database::new(&db_path).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;

    let store: Arc<dyn RemoteStore> = match config.store.backend {
        StoreBackend::Http => {
            let url = config
                .store
                .url
                .as_deref()
                .context("store.url is required for the http backend")?;
            let token = config
                .store
                .token
                .as_deref()
                .context("store token is not set; check store.token_env")?;
            Arc::new(HttpStore::new(url, token))
        }
        StoreBackend::Dir => {
            let dir = config
                .store
                .dir
                .as_deref()
                .context("store.dir is required for the dir backend")?;
            Arc::new(DirStore::new(dir).context("failed to open store directory")?)
        }
    };

    let passphrase = config
        .vault
        .passphrase
        .as_deref()
        .context("vault passphrase is not set; check vault.passphrase_env")?;
    let vault = Vault::new(passphrase);

    Ok(SyncEngine::new(config, db, store, vault))
}

fn spinner(msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template is valid"),
    );
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &PathBuf) -> Result<()> {
    let default_config = r#"# confsync configuration
# See documentation for all available options.

[general]
# Root directory under which tracked files live.
root_dir = "~/dotfiles"
# log_level = "info"
# poll_interval_secs = 300

[files]
# Keyed files are merged key by key (KEY=VALUE lines).
keyed = ["**/.env", "**/*.env"]
# Opaque files are merged as whole documents.
opaque = ["**/*.json", "**/*.toml"]
ignore = [".git/**", "**/*.local"]

[store]
backend = "http"
url = "https://sync.example.com/api"
token_env = "CONFSYNC_TOKEN"
# Or use a shared directory instead:
# backend = "dir"
# dir = "/mnt/shared/confsync"

[vault]
passphrase_env = "CONFSYNC_PASSPHRASE"

[sync]
auto_write = true
apply_deletes = true
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your store details and tracked patterns");
    println!("  2. Set the referenced environment variables (CONFSYNC_TOKEN, CONFSYNC_PASSPHRASE)");
    println!(
        "  3. Validate with: confsync validate --config {}",
        output.display()
    );
    println!("  4. Run a first sync: confsync sync");

    Ok(())
}

fn cmd_validate(config_path: &PathBuf) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    let _ = config.resolve_env_vars();
    println!(
        "  {}",
        style::success("Environment variable references processed")
    );

    match config.validate() {
        Ok(()) => {
            println!("  {}", style::success("All required fields are valid"));
        }
        Err(e) => {
            println!("  {}", style::error(&format!("Validation error: {e}")));
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Root dir      : {}", config.general.root_dir.display());
    println!("  Data dir      : {}", config.general.data_dir.display());
    println!("  Keyed patterns: {}", config.files.keyed.join(", "));
    println!("  Opaque patterns: {}", config.files.opaque.join(", "));
    println!(
        "  Store backend : {}",
        match config.store.backend {
            StoreBackend::Http => "http",
            StoreBackend::Dir => "dir",
        }
    );
    println!(
        "  Store token   : {}",
        if config.store.token.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!(
        "  Passphrase    : {}",
        if config.vault.passphrase.is_some() {
            "set"
        } else {
            "NOT SET"
        }
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_status(engine: &SyncEngine) -> Result<()> {
    let status = engine.get_status().context("failed to read status")?;
    render::print_status(&status);
    Ok(())
}

async fn cmd_sync(
    engine: &SyncEngine,
    strategy: Option<Strategy>,
    non_interactive: bool,
    dry_run: bool,
) -> Result<()> {
    let bar = spinner("Reconciling local, remote, and base...");
    let plan = engine.plan_sync().await.context("sync planning failed")?;
    bar.finish_and_clear();

    render::print_plan(&plan.result);

    if dry_run {
        println!();
        println!("{}", style::dim("Dry run: nothing was written."));
        return Ok(());
    }

    let resolutions: BTreeMap<String, Vec<Resolution>> = if !plan.result.has_conflicts {
        BTreeMap::new()
    } else if let Some(strategy) = strategy {
        let side: BatchSide = strategy.into();
        plan.result
            .files
            .iter()
            .filter(|f| f.status == MergeStatus::Conflicted)
            .map(|f| (f.file_name.clone(), resolve_all_conflicts(f, side)))
            .collect()
    } else if non_interactive {
        let count: usize = plan.result.files.iter().map(|f| f.conflicts.len()).sum();
        anyhow::bail!(
            "{count} conflict(s) found; re-run interactively or pass --strategy local|remote"
        );
    } else {
        let answers = resolve::prompt_resolutions(&plan.result)?;
        let skipped = resolve::count_skipped(&answers);
        if skipped > 0 {
            println!();
            println!(
                "{}",
                style::warn(&format!(
                    "{skipped} conflict(s) skipped; nothing was written. Re-run `confsync sync` to finish."
                ))
            );
            return Ok(());
        }
        answers
    };

    let bar = spinner("Writing merged files and uploading...");
    let stats = engine
        .commit_sync(&plan, &resolutions)
        .await
        .context("sync commit failed")?;
    bar.finish_and_clear();

    render::print_stats(&stats);
    println!();
    println!("{}", style::success("Sync completed"));
    Ok(())
}

async fn cmd_push(engine: &SyncEngine, force: bool) -> Result<()> {
    let bar = spinner("Uploading local files...");
    let result = engine.push(force).await;
    bar.finish_and_clear();

    match result {
        Ok(stats) => {
            render::print_stats(&stats);
            println!();
            println!("{}", style::success("Push completed"));
            Ok(())
        }
        Err(SyncError::RemoteDrifted { .. }) => {
            println!(
                "{}",
                style::warn("Remote has changed since your last sync.")
            );
            println!("Run `confsync sync` to merge, or `confsync push --force` to overwrite.");
            anyhow::bail!("push refused: remote drifted");
        }
        Err(e) => Err(e).context("push failed"),
    }
}

async fn cmd_pull(engine: &SyncEngine, force: bool) -> Result<()> {
    let bar = spinner("Downloading remote files...");
    let result = engine.pull(force).await;
    bar.finish_and_clear();

    match result {
        Ok(stats) => {
            render::print_stats(&stats);
            println!();
            println!("{}", style::success("Pull completed"));
            Ok(())
        }
        Err(SyncError::LocalDrifted) => {
            println!(
                "{}",
                style::warn("Local files have changed since your last sync.")
            );
            println!("Run `confsync sync` to merge, or `confsync pull --force` to overwrite.");
            anyhow::bail!("pull refused: local files drifted");
        }
        Err(e) => Err(e).context("pull failed"),
    }
}

fn cmd_log(engine: &SyncEngine, limit: u32) -> Result<()> {
    let records = engine
        .db()
        .list_sync_records(limit)
        .context("failed to list sync records")?;
    render::print_log(&records);
    Ok(())
}

async fn cmd_watch(engine: &SyncEngine, strategy: Option<Strategy>) -> Result<()> {
    let interval = Duration::from_secs(engine.config().general.poll_interval_secs);
    let batch = strategy.map(BatchSide::from);
    println!(
        "Watching; syncing every {}s. Press Ctrl-C to stop.",
        interval.as_secs()
    );

    loop {
        match engine.run_sync_cycle(batch).await {
            Ok(stats) => {
                if stats.files_written > 0 || stats.uploaded > 0 {
                    println!(
                        "{}",
                        style::success(&format!(
                            "synced: {} written, {} uploaded",
                            stats.files_written, stats.uploaded
                        ))
                    );
                }
            }
            Err(SyncError::UnresolvedConflicts { count }) => {
                println!(
                    "{}",
                    style::warn(&format!(
                        "{count} conflict(s) need attention; run `confsync sync` to resolve"
                    ))
                );
            }
            Err(e) => {
                println!("{}", style::error(&format!("sync cycle failed: {e}")));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopping watch mode.");
                return Ok(());
            }
        }
    }
}
