//! Integration tests for the autosend-store crate.
//!
//! These run the full lifecycle against a real SQLite file on disk
//! (via tempfile): schema initialization, user creation, config updates
//! and reads through separate handles.

use std::path::Path;
use std::time::Duration;

use autosend_store::{
    ConfigUpdate, Database, StoreConfig, StoreError, UserConfig, UserStore,
};

fn open_store(path: &Path) -> UserStore {
    UserStore::new(Database::open_path(path, Duration::from_secs(5)).unwrap())
}

// ═══════════════════════════════════════════════════════════════════════
//  Schema lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn open_and_initialize_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("users.db");

    let config = StoreConfig {
        path: db_path.clone(),
        ..StoreConfig::default()
    };
    let db = Database::open_and_initialize(config).await.unwrap();
    let store = UserStore::new(db);

    assert_eq!(store.count().await.unwrap(), 0);
    assert!(db_path.exists());
}

#[tokio::test]
async fn initialize_schema_is_idempotent_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("users.db");

    let first = open_store(&db_path);
    first.initialize_schema().await.unwrap();
    first.create_user("alice", "pw", None).await.unwrap();
    drop(first);

    let second = open_store(&db_path);
    second.initialize_schema().await.unwrap();
    second.initialize_schema().await.unwrap();

    assert_eq!(second.count().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_initializers_on_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("users.db");

    let stores: Vec<UserStore> = (0..4).map(|_| open_store(&db_path)).collect();
    let handles: Vec<_> = stores
        .iter()
        .cloned()
        .map(|store| tokio::spawn(async move { store.initialize_schema().await }))
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let id = stores[0].create_user("alice", "pw", None).await.unwrap();
    assert_eq!(stores[3].get_user(id).await.unwrap().unwrap().username, "alice");
}

// ═══════════════════════════════════════════════════════════════════════
//  User lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn user_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("users.db"));
    store.initialize_schema().await.unwrap();

    let id = store
        .create_user("alice", "pw1", Some("KEY-1"))
        .await
        .unwrap();
    assert_eq!(id, 1);

    assert_eq!(
        store.get_user_config(id).await.unwrap().unwrap(),
        UserConfig::default()
    );

    store
        .update_user_config(id, &ConfigUpdate::new().cookies("c1").delay(30))
        .await
        .unwrap();
    assert_eq!(
        store.get_user_config(id).await.unwrap().unwrap(),
        UserConfig {
            cookies: "c1".into(),
            chat_id: String::new(),
            messages: "Hello!".into(),
            delay: 30,
            name_prefix: String::new(),
        }
    );

    store.set_automation_running(id, true).await.unwrap();
    store.save_admin_e2ee_thread_id(id, "e2ee-77").await.unwrap();

    let user = store.get_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.user_key.as_deref(), Some("KEY-1"));
    assert_eq!(user.cookies, "c1");
    assert_eq!(user.delay, 30);
    assert!(user.automation_running);
    assert_eq!(user.admin_e2ee_thread_id.as_deref(), Some("e2ee-77"));
}

#[tokio::test]
async fn writes_are_visible_through_another_handle() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("users.db");

    let writer = open_store(&db_path);
    writer.initialize_schema().await.unwrap();
    let reader = open_store(&db_path);

    let id = writer.create_user("bob", "pw", None).await.unwrap();
    writer
        .update_user_config(id, &ConfigUpdate::new().chat_id("chat-1"))
        .await
        .unwrap();
    writer.set_automation_running(id, true).await.unwrap();

    assert_eq!(
        reader.get_user_config(id).await.unwrap().unwrap().chat_id,
        "chat-1"
    );
    assert!(reader.get_automation_running(id).await.unwrap());
}

#[tokio::test]
async fn conflict_leaves_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("users.db"));
    store.initialize_schema().await.unwrap();

    store.create_user("alice", "pw1", Some("K1")).await.unwrap();
    let err = store
        .create_user("alice", "pw2", None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = store.create_user("carol", "pw", Some("K1")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { field: "user_key", .. }));

    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn ids_are_never_reused() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("users.db"));
    store.initialize_schema().await.unwrap();

    let first = store.create_user("a", "pw", None).await.unwrap();
    // A failed insert must not hand its id to the next user either.
    store.create_user("a", "pw", None).await.unwrap_err();
    let second = store.create_user("b", "pw", None).await.unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn concurrent_creates_for_different_users() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("users.db"));
    store.initialize_schema().await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let username = format!("user{i}");
                let key = format!("KEY-{i}");
                store.create_user(&username, "pw", Some(&key)).await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(store.count().await.unwrap(), 8);
}

#[tokio::test]
async fn missing_records_are_expected_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir.path().join("users.db"));
    store.initialize_schema().await.unwrap();

    assert!(store.get_user_by_username("nope").await.unwrap().is_none());
    assert!(store.get_user_config(7).await.unwrap().is_none());
    assert!(!store.get_automation_running(7).await.unwrap());
    assert_eq!(
        store
            .update_user_config(7, &ConfigUpdate::new().messages("hi"))
            .await
            .unwrap(),
        0
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Existing databases and locked storage
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn initialize_adopts_pre_migration_users_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("users.db");

    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                user_key TEXT UNIQUE,
                cookies TEXT,
                chat_id TEXT,
                messages TEXT,
                delay INTEGER DEFAULT 10,
                name_prefix TEXT DEFAULT '',
                automation_running INTEGER DEFAULT 0,
                admin_e2ee_thread_id TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO users (username, password, user_key, cookies, delay)
            VALUES ('old', 'pw', 'KEY-OLD', 'c0', 20);",
        )
        .unwrap();
    }

    let store = open_store(&db_path);
    store.initialize_schema().await.unwrap();
    store.initialize_schema().await.unwrap();

    let old = store.get_user_by_username("old").await.unwrap().unwrap();
    assert_eq!(old.user_key.as_deref(), Some("KEY-OLD"));
    assert_eq!(old.cookies, "c0");
    assert_eq!(old.delay, 20);
    assert!(old.created_at > 0);

    let err = store
        .create_user("old", "pw", None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let id = store.create_user("new", "pw", None).await.unwrap();
    assert!(id > old.id);
}

#[tokio::test]
async fn write_while_locked_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("users.db");

    let store = UserStore::new(Database::open_path(&db_path, Duration::from_millis(100)).unwrap());
    store.initialize_schema().await.unwrap();

    let locker = rusqlite::Connection::open(&db_path).unwrap();
    locker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let err = store.create_user("alice", "pw", None).await.unwrap_err();
    assert!(err.is_unavailable(), "unexpected error: {err}");

    let err = store.set_automation_running(1, true).await.unwrap_err();
    assert!(err.is_unavailable(), "unexpected error: {err}");

    locker.execute_batch("ROLLBACK;").unwrap();

    // Nothing was written, and the store works again once the lock is gone.
    assert_eq!(store.count().await.unwrap(), 0);
    store.create_user("alice", "pw", None).await.unwrap();
}
