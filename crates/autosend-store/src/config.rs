//! Storage configuration.
//!
//! Reads the `[store]` section of a TOML config file (by default
//! `config/default.toml`). A missing file, a missing section or a missing
//! key falls back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "users.db";

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Environment variable that overrides [`StoreConfig::path`].
pub const DB_PATH_ENV: &str = "AUTOSEND_DB_PATH";

/// Settings for opening the user database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    store: StoreConfig,
}

impl StoreConfig {
    /// Busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Parse the `[store]` section out of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.store)
    }

    /// Load configuration from `path`, then apply the environment override.
    ///
    /// Falls back to defaults if the file is missing or unparseable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
        };

        if let Ok(db_path) = std::env::var(DB_PATH_ENV)
            && !db_path.is_empty()
        {
            config.path = PathBuf::from(db_path);
        }

        config
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.path, PathBuf::from("users.db"));
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parses_store_section() {
        let config = StoreConfig::from_toml_str(
            r#"
            [store]
            path = "data/autosend.db"
            busy_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.path, PathBuf::from("data/autosend.db"));
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn missing_section_uses_defaults() {
        let config = StoreConfig::from_toml_str("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = StoreConfig::from_toml_str("[store]\nbusy_timeout_ms = 10\n").unwrap();
        assert_eq!(config.path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.busy_timeout_ms, 10);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[store\npath = ").unwrap();

        let config = StoreConfig::load(&path);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }
}
