//! CLI entry point for autosend.
//!
//! This binary provides the `autosend` command. It owns the process-level
//! setup (`.env`, tracing, config), opens the user database once, runs the
//! idempotent schema initialization and dispatches a single subcommand.

mod cli;
mod commands;

use anyhow::{Context, Result};
use autosend_store::{Database, StoreConfig, UserStore};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing("warn");

    let mut config = StoreConfig::load(&cli.config);
    if let Some(db) = cli.db {
        config.path = db;
    }
    let display_path = config.path.display().to_string();

    let db = Database::open_and_initialize(config)
        .await
        .with_context(|| format!("failed to open database at {display_path}"))?;
    let store = UserStore::new(db);
    info!(path = %display_path, "store initialized");

    match cli.command {
        Commands::Init => {
            println!("  [+] Database initialized at {display_path}");
            Ok(())
        }
        Commands::Users { action } => commands::users(&store, action).await,
        Commands::Config { action } => commands::config(&store, action).await,
        Commands::Automation { action } => commands::automation(&store, action).await,
        Commands::AdminThread { action } => commands::admin_thread(&store, action).await,
    }
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
