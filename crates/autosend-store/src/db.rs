//! SQLite database handle.
//!
//! The [`Database`] struct wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>` and exposes async methods that use
//! `tokio::task::spawn_blocking` to avoid blocking the async runtime.
//! Each call holds the connection only for the duration of its closure.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema;

/// Thread-safe handle to the user database.
///
/// Cloning is cheap; clones share the same connection. Construct one per
/// process and pass it to every component that needs persistence.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database described by `config`.
    ///
    /// This does not create the schema; call [`Database::initialize_schema`]
    /// once at startup.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        Self::open_path(&config.path, config.busy_timeout())
    }

    /// Open (or create) a database file at `path`.
    pub fn open_path(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn, busy_timeout)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database, useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn, StoreConfig::default().busy_timeout())?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database on the blocking pool and initialize the schema.
    pub async fn open_and_initialize(config: StoreConfig) -> StoreResult<Self> {
        let db = tokio::task::spawn_blocking(move || Self::open(&config)).await??;
        db.initialize_schema().await?;
        Ok(db)
    }

    /// Create or upgrade the schema. Idempotent.
    pub async fn initialize_schema(&self) -> StoreResult<()> {
        self.execute(schema::run_all).await
    }

    /// Execute a closure against the connection on the blocking pool.
    ///
    /// The mutex guard is dropped when the closure returns, on both the
    /// success and the error path.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     let count = conn.query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
    ///     Ok(count)
    /// }).await?;
    /// ```
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        // Set before anything that may need a lock, including the WAL switch.
        conn.busy_timeout(busy_timeout)?;

        // WAL mode: readers do not block the single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // A created user must survive power loss once create returns.
        conn.pragma_update(None, "synchronous", "FULL")?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        info!(
            busy_timeout_ms = busy_timeout.as_millis() as u64,
            "database pragmas applied"
        );
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
