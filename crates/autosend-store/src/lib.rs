//! # autosend-store
//!
//! Per-user configuration store for autosend.
//!
//! Persists account credentials, session cookies, messaging targets, the
//! automation running flag and the message delay/prefix settings in a
//! single SQLite `users` table.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  UserStore   (users CRUD, defaults)     │
//! ├─────────────────────────────────────────┤
//! │  Database    (rusqlite, spawn_blocking) │
//! │  schema      (versioned, idempotent)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use autosend_store::{ConfigUpdate, Database, StoreConfig, UserStore};
//!
//! let db = Database::open(&StoreConfig::load("config/default.toml"))?;
//! let users = UserStore::new(db);
//! users.initialize_schema().await?;
//!
//! let id = users.create_user("alice", "pw1", Some("KEY-1")).await?;
//! users.update_user_config(id, &ConfigUpdate::new().cookies("c1").delay(30)).await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod user_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::StoreConfig;
pub use db::Database;
pub use error::{OptionExt, StoreError, StoreResult};
pub use user_store::{
    ConfigUpdate, DEFAULT_DELAY_SECS, DEFAULT_MESSAGES, User, UserConfig, UserStore,
};
