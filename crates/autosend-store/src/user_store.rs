//! Per-user account and automation configuration.
//!
//! One row per user in the `users` table. Credentials are fixed at
//! creation; the automation config (cookies, chat target, message text,
//! delay, name prefix), the running flag and the admin thread id are
//! changed afterwards through targeted updates.
//!
//! Unset config fields resolve to fixed defaults on read, so callers never
//! see a missing value for them. Writes report the number of rows they
//! touched; an update against an unknown id returns `0` instead of failing.

use chrono::{NaiveDateTime, Utc};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Message text used when none has been configured.
pub const DEFAULT_MESSAGES: &str = "Hello!";

/// Delay between messages, in seconds, when none has been configured.
pub const DEFAULT_DELAY_SECS: u32 = 10;

/// Text layout of `created_at` in tables created with `CURRENT_TIMESTAMP`.
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A user record with defaults resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned identifier, never reused.
    pub id: i64,
    /// Unique, case-sensitive login name.
    pub username: String,
    /// Stored exactly as given at creation.
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Unique access key, if one was given at creation.
    pub user_key: Option<String>,
    pub cookies: String,
    pub chat_id: String,
    pub messages: String,
    /// Seconds between messages.
    pub delay: u32,
    pub name_prefix: String,
    /// Advisory flag recording that an automation loop is active. Not a lock.
    pub automation_running: bool,
    pub admin_e2ee_thread_id: Option<String>,
    /// Unix timestamp when the user was created.
    pub created_at: i64,
}

/// The automation settings of one user, defaults resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub cookies: String,
    pub chat_id: String,
    pub messages: String,
    pub delay: u32,
    pub name_prefix: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            cookies: String::new(),
            chat_id: String::new(),
            messages: DEFAULT_MESSAGES.to_string(),
            delay: DEFAULT_DELAY_SECS,
            name_prefix: String::new(),
        }
    }
}

/// A sparse update of [`UserConfig`] fields.
///
/// `None` leaves the column untouched; `Some(String::new())` writes an
/// empty string.
///
/// ```ignore
/// let update = ConfigUpdate::new().cookies("c1").delay(30);
/// store.update_user_config(id, &update).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub cookies: Option<String>,
    pub chat_id: Option<String>,
    pub messages: Option<String>,
    pub delay: Option<u32>,
    pub name_prefix: Option<String>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    pub fn chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn messages(mut self, messages: impl Into<String>) -> Self {
        self.messages = Some(messages.into());
        self
    }

    pub fn delay(mut self, delay: u32) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn name_prefix(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(name_prefix.into());
        self
    }

    /// `true` when no field is supplied.
    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    /// The supplied fields as `(column, value)` pairs, in column order.
    fn assignments(&self) -> Vec<(&'static str, Value)> {
        let text = |v: &Option<String>| v.clone().map(Value::Text);
        [
            ("cookies", text(&self.cookies)),
            ("chat_id", text(&self.chat_id)),
            ("messages", text(&self.messages)),
            ("delay", self.delay.map(|d| Value::Integer(i64::from(d)))),
            ("name_prefix", text(&self.name_prefix)),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  UserStore
// ═══════════════════════════════════════════════════════════════════════

const USER_COLUMNS: &str = "id, username, password, user_key, cookies, chat_id, messages, \
                            delay, name_prefix, automation_running, admin_e2ee_thread_id, created_at";

/// Reads and writes user records.
///
/// Holds no state besides the [`Database`] handle; every read goes to
/// SQLite and sees the latest committed write.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    /// Create a new user store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create the `users` table if needed. Safe to call on every start and
    /// concurrently with itself.
    #[instrument(skip(self))]
    pub async fn initialize_schema(&self) -> StoreResult<()> {
        self.db.initialize_schema().await
    }

    /// Insert a new user and return its id.
    ///
    /// An empty `user_key` is stored as NULL, so keyless users never
    /// collide. A duplicate username or key yields
    /// [`StoreError::Conflict`] and writes nothing.
    #[instrument(skip(self, password, user_key))]
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        user_key: Option<&str>,
    ) -> StoreResult<i64> {
        let username = username.to_string();
        let password = password.to_string();
        let user_key = user_key.filter(|k| !k.is_empty()).map(str::to_string);
        let now = Utc::now().timestamp();

        let id = self
            .db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO users (username, password, user_key, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![username, password, user_key, now],
                )
                .map_err(|e| classify_insert_error(e, &username, user_key.as_deref()))?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(user_id = id, "user created");
        Ok(id)
    }

    /// Fetch a user by exact username. `None` when no row matches.
    #[instrument(skip(self))]
    pub async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let username = username.to_string();
        self.db
            .execute(move |conn| {
                let user = conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                        rusqlite::params![username],
                        UserRow::from_row,
                    )
                    .optional()?;
                Ok(user.map(UserRow::into_user))
            })
            .await
    }

    /// Fetch a user by id. `None` when no row matches.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.db
            .execute(move |conn| {
                let user = conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                        rusqlite::params![id],
                        UserRow::from_row,
                    )
                    .optional()?;
                Ok(user.map(UserRow::into_user))
            })
            .await
    }

    /// Write the supplied config fields and return the number of rows
    /// changed.
    ///
    /// An empty update returns `0` without touching the database.
    #[instrument(skip(self, update))]
    pub async fn update_user_config(&self, id: i64, update: &ConfigUpdate) -> StoreResult<usize> {
        let assignments = update.assignments();
        if assignments.is_empty() {
            debug!(user_id = id, "empty config update, nothing written");
            return Ok(0);
        }

        let set_clause = assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE users SET {set_clause} WHERE id = ?");
        let fields = assignments.len();
        let mut params: Vec<Value> = assignments.into_iter().map(|(_, value)| value).collect();
        params.push(Value::Integer(id));

        let updated = self
            .db
            .execute(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?))
            .await?;

        debug!(user_id = id, fields, updated, "user config updated");
        Ok(updated)
    }

    /// Overwrite the automation flag and return the number of rows changed.
    #[instrument(skip(self))]
    pub async fn set_automation_running(&self, id: i64, running: bool) -> StoreResult<usize> {
        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET automation_running = ?2 WHERE id = ?1",
                    rusqlite::params![id, running],
                )?;
                Ok(updated)
            })
            .await
    }

    /// Read the automation flag. An unknown id reads as `false`.
    #[instrument(skip(self))]
    pub async fn get_automation_running(&self, id: i64) -> StoreResult<bool> {
        self.db
            .execute(move |conn| {
                let running: Option<Option<bool>> = conn
                    .query_row(
                        "SELECT automation_running FROM users WHERE id = ?1",
                        rusqlite::params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(running.flatten().unwrap_or(false))
            })
            .await
    }

    /// Overwrite the admin end-to-end-encrypted thread id and return the
    /// number of rows changed.
    #[instrument(skip(self, thread_id))]
    pub async fn save_admin_e2ee_thread_id(&self, id: i64, thread_id: &str) -> StoreResult<usize> {
        let thread_id = thread_id.to_string();
        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET admin_e2ee_thread_id = ?2 WHERE id = ?1",
                    rusqlite::params![id, thread_id],
                )?;
                Ok(updated)
            })
            .await
    }

    /// Read the admin thread id. `None` for an unknown id and for an
    /// unset or empty value alike.
    #[instrument(skip(self))]
    pub async fn get_admin_e2ee_thread_id(&self, id: i64) -> StoreResult<Option<String>> {
        self.db
            .execute(move |conn| {
                let thread_id: Option<Option<String>> = conn
                    .query_row(
                        "SELECT admin_e2ee_thread_id FROM users WHERE id = ?1",
                        rusqlite::params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(non_empty(thread_id.flatten()))
            })
            .await
    }

    /// Read the automation config with defaults applied. `None` for an
    /// unknown id.
    #[instrument(skip(self))]
    pub async fn get_user_config(&self, id: i64) -> StoreResult<Option<UserConfig>> {
        self.db
            .execute(move |conn| {
                let config = conn
                    .query_row(
                        "SELECT cookies, chat_id, messages, delay, name_prefix \
                         FROM users WHERE id = ?1",
                        rusqlite::params![id],
                        |row| {
                            Ok(resolve_config(
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(config)
            })
            .await
    }

    /// Return the total number of users.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

/// Raw row data from SQLite before defaults are resolved.
struct UserRow {
    id: i64,
    username: String,
    password: String,
    user_key: Option<String>,
    cookies: Option<String>,
    chat_id: Option<String>,
    messages: Option<String>,
    delay: Option<i64>,
    name_prefix: Option<String>,
    automation_running: bool,
    admin_e2ee_thread_id: Option<String>,
    created_at: i64,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            user_key: row.get(3)?,
            cookies: row.get(4)?,
            chat_id: row.get(5)?,
            messages: row.get(6)?,
            delay: row.get(7)?,
            name_prefix: row.get(8)?,
            automation_running: row.get::<_, Option<bool>>(9)?.unwrap_or(false),
            admin_e2ee_thread_id: row.get(10)?,
            created_at: unix_timestamp(row, 11)?,
        })
    }

    fn into_user(self) -> User {
        let config = resolve_config(
            self.cookies,
            self.chat_id,
            self.messages,
            self.delay,
            self.name_prefix,
        );
        User {
            id: self.id,
            username: self.username,
            password: self.password,
            user_key: non_empty(self.user_key),
            cookies: config.cookies,
            chat_id: config.chat_id,
            messages: config.messages,
            delay: config.delay,
            name_prefix: config.name_prefix,
            automation_running: self.automation_running,
            admin_e2ee_thread_id: non_empty(self.admin_e2ee_thread_id),
            created_at: self.created_at,
        }
    }
}

/// Apply read defaults. Empty `messages` and a non-positive `delay` count
/// as unset.
fn resolve_config(
    cookies: Option<String>,
    chat_id: Option<String>,
    messages: Option<String>,
    delay: Option<i64>,
    name_prefix: Option<String>,
) -> UserConfig {
    UserConfig {
        cookies: cookies.unwrap_or_default(),
        chat_id: chat_id.unwrap_or_default(),
        messages: non_empty(messages).unwrap_or_else(|| DEFAULT_MESSAGES.to_string()),
        delay: delay
            .and_then(|d| u32::try_from(d).ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_DELAY_SECS),
        name_prefix: name_prefix.unwrap_or_default(),
    }
}

/// Read a timestamp stored either as unix seconds or as SQLite's
/// `CURRENT_TIMESTAMP` text (`YYYY-MM-DD HH:MM:SS`, UTC).
fn unix_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<i64> {
    let conversion = |e: Box<dyn std::error::Error + Send + Sync>| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e)
    };
    match row.get_ref(idx)? {
        ValueRef::Integer(secs) => Ok(secs),
        value @ ValueRef::Text(_) => {
            let text = value.as_str().map_err(|e| conversion(Box::new(e)))?;
            NaiveDateTime::parse_from_str(text, LEGACY_TIMESTAMP_FORMAT)
                .map(|dt| dt.and_utc().timestamp())
                .map_err(|e| conversion(Box::new(e)))
        }
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "created_at".into(),
            other.data_type(),
        )),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Map a UNIQUE violation on insert to [`StoreError::Conflict`].
fn classify_insert_error(err: rusqlite::Error, username: &str, user_key: Option<&str>) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err
        && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    {
        let on_key = message
            .as_deref()
            .is_some_and(|m| m.contains("users.user_key"));
        return if on_key {
            StoreError::Conflict {
                field: "user_key",
                value: user_key.unwrap_or_default().to_string(),
            }
        } else {
            StoreError::Conflict {
                field: "username",
                value: username.to_string(),
            }
        };
    }
    err.into()
}

// ── tests ────────────────────────────────────────────────────────────
