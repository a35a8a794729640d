//! taskmill - periodic-task automation for a Redmine-style tracker.
//!
//! One pass per invocation; the periodic trigger (cron or similar) lives
//! outside this binary.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskmill_catalog::load_catalog;
use taskmill_scheduler::config::Config;
use taskmill_scheduler::db::Database;
use taskmill_scheduler::engine::{run_initial_seed, run_rollover_check, RunResult};
use taskmill_scheduler::export;
use taskmill_scheduler::redmine::RedmineClient;

/// Pause between seeding creation calls (tracker API rate limiting).
const SEED_PAUSE: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "taskmill")]
#[command(author, version, about = "Periodic-task automation for a Redmine-style tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one rollover pass: spawn successors for completed recurring tasks.
    Check,

    /// Seed the first instance of every catalog template.
    Init,

    /// Snapshot reference data to timestamped CSV files.
    Export {
        #[arg(value_enum)]
        target: ExportTarget,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportTarget {
    Projects,
    Trackers,
    Users,
    Statuses,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(&config)?;

    if let Err(e) = run(cli, config).await {
        error!(error = %e, "Run failed");
        std::process::exit(1);
    }

    Ok(())
}

/// Log to stdout, and to the configured log file when one is set.
fn init_tracing(config: &Config) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => registry.init(),
    }

    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let client = RedmineClient::new(&config)?;

    match cli.command {
        Command::Check => {
            let catalog = load_catalog(&config.catalog_path)?;
            let db = Database::connect(&config.database).await?;

            let Some(lock) = db.try_lock_run().await? else {
                info!("Another run holds the lock; nothing to do");
                return Ok(());
            };

            let store = db.issue_store(config.done_status_ids.clone());
            let result = run_rollover_check(&catalog, &store, &client, Utc::now()).await;
            lock.release().await?;

            report(result?);
        }
        Command::Init => {
            let catalog = load_catalog(&config.catalog_path)?;
            let db = Database::connect(&config.database).await?;

            let Some(lock) = db.try_lock_run().await? else {
                info!("Another run holds the lock; nothing to do");
                return Ok(());
            };

            let store = db.issue_store(config.done_status_ids.clone());
            let result = run_initial_seed(&catalog, &store, &client, SEED_PAUSE).await;
            lock.release().await?;

            report(result?);
        }
        Command::Export { target } => {
            let data_dir = &config.data_dir;
            match target {
                ExportTarget::Projects => {
                    export::export_projects(&client, data_dir).await?;
                }
                ExportTarget::Trackers => {
                    export::export_trackers(&client, data_dir).await?;
                }
                ExportTarget::Users => {
                    export::export_users(&client, data_dir).await?;
                }
                ExportTarget::Statuses => {
                    export::export_statuses(&client, data_dir).await?;
                }
                ExportTarget::All => {
                    export::export_all(&client, data_dir).await?;
                }
            }
        }
    }

    Ok(())
}

/// Per-row failures were already logged with their subjects; they do not
/// affect exit status.
fn report(result: RunResult) {
    if !result.errors.is_empty() {
        info!(
            failed = result.errors.len(),
            "Run finished with per-row failures; see log lines above"
        );
    }
}
