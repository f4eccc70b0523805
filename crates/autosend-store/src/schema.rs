//! Schema migrations.
//!
//! Migrations are static SQL strings keyed by version number. The applied
//! version is tracked in a `_migrations` table, so running them again is a
//! no-op. Each migration is applied under `BEGIN IMMEDIATE` and the applied
//! version is re-read while holding the write lock: two initializers racing
//! on the same file (two handles, or two processes) serialize on the lock
//! and the loser finds nothing left to do.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    /// May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "users table with credentials, session and automation config",
    sql: r#"
        CREATE TABLE IF NOT EXISTS users (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            username             TEXT NOT NULL UNIQUE,
            password             TEXT NOT NULL,
            user_key             TEXT UNIQUE,
            cookies              TEXT,
            chat_id              TEXT,
            messages             TEXT,
            delay                INTEGER DEFAULT 10,
            name_prefix          TEXT DEFAULT '',
            automation_running   BOOLEAN NOT NULL DEFAULT 0,
            admin_e2ee_thread_id TEXT,
            created_at           INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER))
        );
    "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// This is a **synchronous** function; call it from `spawn_blocking`.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    info!(new_version = latest_version(), "all migrations applied");
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| migration_error(0, "failed to read current version", e))
}

/// The version the schema reaches once every migration is applied.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| migration_error(0, "failed to create _migrations table", e))
}

/// Apply a single migration inside a write transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    // `conn.transaction()` needs `&mut Connection`, so the transaction is
    // managed by hand.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| migration_error(migration.version, "failed to begin transaction", e))?;

    let result = (|| -> StoreResult<bool> {
        if current_version(conn)? >= migration.version {
            return Ok(false);
        }

        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| migration_error(migration.version, "SQL execution failed", e))?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![migration.version, migration.description, now],
        )
        .map_err(|e| migration_error(migration.version, "failed to record migration", e))?;

        Ok(true)
    })();

    match result {
        Ok(applied) => {
            if let Err(e) = conn.execute_batch("COMMIT;") {
                let err = migration_error(migration.version, "failed to commit", e);
                warn!(version = migration.version, %err, "commit failed, rolling back");
                rollback(conn, migration.version);
                return Err(err);
            }
            if applied {
                info!(version = migration.version, "migration applied");
            } else {
                debug!(version = migration.version, "migration already applied by another initializer");
            }
            Ok(())
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            rollback(conn, migration.version);
            Err(err)
        }
    }
}

/// Leave the shared connection outside any transaction.
fn rollback(conn: &Connection, version: u32) {
    if conn.is_autocommit() {
        return;
    }
    if let Err(e) = conn.execute_batch("ROLLBACK;") {
        warn!(version, error = %e, "rollback failed");
    }
}

/// Wrap a SQLite failure as a migration error, unless the storage itself
/// is unreachable.
fn migration_error(version: u32, context: &str, err: rusqlite::Error) -> StoreError {
    match StoreError::from(err) {
        unavailable @ StoreError::StorageUnavailable(_) => unavailable,
        other => StoreError::Migration {
            version,
            message: format!("{context}: {other}"),
        },
    }
}

// ── tests ────────────────────────────────────────────────────────────
