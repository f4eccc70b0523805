//! CLI argument definitions for autosend.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// autosend -- per-user automation config store.
#[derive(Parser)]
#[command(
    name = "autosend",
    version,
    about = "autosend -- per-user automation config store",
    long_about = "Manage the user database behind the autosend automation service: \
                  accounts, session cookies, message targets and automation state."
)]
pub struct Cli {
    /// Path to the TOML config file (reads the `[store]` section).
    #[arg(long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Database file; overrides the config file and AUTOSEND_DB_PATH.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema if it does not exist yet.
    Init,

    /// Manage user accounts.
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Show or change a user's automation config.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Record whether a user's automation loop is running.
    Automation {
        #[command(subcommand)]
        action: AutomationAction,
    },

    /// Store or read a user's admin end-to-end-encrypted thread id.
    AdminThread {
        #[command(subcommand)]
        action: AdminThreadAction,
    },
}

/// Actions for managing user accounts.
#[derive(Subcommand)]
pub enum UserAction {
    /// Create a new user.
    Create {
        /// The username for the new account.
        username: String,
        /// The password, stored as given.
        #[arg(long, short)]
        password: String,
        /// Optional unique access key.
        #[arg(long, short)]
        key: Option<String>,
    },
    /// Show a user by username (password omitted).
    Show {
        /// The username to look up.
        username: String,
    },
    /// Print the number of users.
    Count,
}

/// Actions on a user's automation config.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the resolved config.
    Show {
        /// User id.
        id: i64,
    },
    /// Update only the given fields.
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// User id.
    pub id: i64,
    /// Serialized session cookies.
    #[arg(long)]
    pub cookies: Option<String>,
    /// Messaging target.
    #[arg(long)]
    pub chat_id: Option<String>,
    /// Message text.
    #[arg(long)]
    pub messages: Option<String>,
    /// Seconds between messages.
    #[arg(long)]
    pub delay: Option<u32>,
    /// Prefix added to sender names.
    #[arg(long)]
    pub name_prefix: Option<String>,
}

/// Actions on the automation flag.
#[derive(Subcommand)]
pub enum AutomationAction {
    /// Mark the automation as running.
    Start { id: i64 },
    /// Mark the automation as stopped.
    Stop { id: i64 },
    /// Print whether the automation is marked as running.
    Status { id: i64 },
}

/// Actions on the admin thread id.
#[derive(Subcommand)]
pub enum AdminThreadAction {
    /// Overwrite the thread id.
    Set { id: i64, thread_id: String },
    /// Print the thread id, if any.
    Get { id: i64 },
}

// ── tests ────────────────────────────────────────────────────────────
