//! Error types for the autosend-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! Low-level SQLite failures are sorted into "storage is unreachable"
//! ([`StoreError::StorageUnavailable`]) and everything else
//! ([`StoreError::Sqlite`]) when they cross the crate boundary.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the user store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated while creating a record.
    #[error("{field} already exists: {value}")]
    Conflict { field: &'static str, value: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The database file cannot be opened, is locked past the busy
    /// timeout, or the underlying I/O failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Returns `true` for [`StoreError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` for [`StoreError::StorageUnavailable`].
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let unavailable = matches!(
            &err,
            rusqlite::Error::SqliteFailure(failure, _) if is_unavailable_code(failure.code)
        );
        if unavailable {
            Self::StorageUnavailable(err.to_string())
        } else {
            Self::Sqlite(err)
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// SQLite result codes that mean the database itself cannot be used.
fn is_unavailable_code(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly
            | ErrorCode::DiskFull
            | ErrorCode::FileLockingProtocolFailed
    )
}

/// Turn an expected-absence `Option` into [`StoreError::NotFound`].
///
/// Store lookups return `Ok(None)` when nothing matches; callers that treat
/// a missing record as a failure use this to get a typed error instead.
pub trait OptionExt<T> {
    fn or_not_found(self, entity: &'static str, id: impl ToString) -> StoreResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, entity: &'static str, id: impl ToString) -> StoreResult<T> {
        self.ok_or_else(|| StoreError::NotFound {
            entity,
            id: id.to_string(),
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
